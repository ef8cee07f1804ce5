//! The opaque per-family variant bitfield.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// A 32-bit variant selector whose bit layout is family-specific.
///
/// The same value means different things for different families; only the
/// define generator interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VariantDescriptor(pub u32);

impl VariantDescriptor {
    /// Returns the raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `mask` is set.
    pub fn has(self, mask: u32) -> bool {
        mask != 0 && self.0 & mask == mask
    }

    /// Extracts `(bits >> shift) & mask`.
    pub fn field(self, shift: u32, mask: u32) -> u32 {
        (self.0 >> shift) & mask
    }
}

impl From<u32> for VariantDescriptor {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Upper-case hexadecimal without prefix, as used in disk file names.
impl fmt::Display for VariantDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl FromStr for VariantDescriptor {
    type Err = ParseIntError;

    /// Accepts `0x1F`, `1F` style hex or a `#31` decimal form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(dec) = s.strip_prefix('#') {
            return dec.parse().map(Self);
        }
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u32::from_str_radix(hex, 16).map(Self)
    }
}
