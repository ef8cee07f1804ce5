//! Canonical cache key construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use kiln_common::{ShaderStage, VariantDescriptor};

use crate::define::Define;

/// Canonical identity of a compiled variant:
/// `"{source}:{Stage}:{sorted defines}"`.
///
/// Two descriptors that enable the same define set produce the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already formatted key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The source identifier, i.e. everything before the first `:`.
    pub fn source_id(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Renders defines, sorts them lexicographically, drops duplicates and joins
/// them with single spaces.
pub fn merge_defines<'a>(defines: impl IntoIterator<Item = &'a Define>) -> String {
    let mut rendered: Vec<String> = defines.into_iter().map(|d| d.to_string()).collect();
    rendered.sort();
    rendered.dedup();
    rendered.join(" ")
}

/// Builds a cache key.
///
/// With `include_descriptor` the descriptor hex is inserted after the stage;
/// that form is only used for diagnostics and disk naming.
pub fn build_cache_key(
    source_id: &str,
    stage: ShaderStage,
    descriptor: VariantDescriptor,
    defines: &[Define],
    include_descriptor: bool,
) -> CacheKey {
    let merged = merge_defines(defines);
    let raw = if include_descriptor {
        format!("{source_id}:{stage}:{descriptor}:{merged}")
    } else {
        format!("{source_id}:{stage}:{merged}")
    };
    CacheKey(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_format() {
        let defines = [Define::flag("SKINNED"), Define::flag("VC")];
        let key = build_cache_key("Lighting", ShaderStage::Pixel, VariantDescriptor(3), &defines, false);
        assert_eq!(key.as_str(), "Lighting:Pixel:SKINNED VC");
        assert_eq!(key.source_id(), "Lighting");

        let diag = build_cache_key("Lighting", ShaderStage::Pixel, VariantDescriptor(0x1A), &defines, true);
        assert_eq!(diag.as_str(), "Lighting:Pixel:1A:SKINNED VC");
    }

    #[test]
    fn empty_define_set() {
        let key = build_cache_key("Sky", ShaderStage::Vertex, VariantDescriptor(99), &[], false);
        assert_eq!(key.as_str(), "Sky:Vertex:");
    }

    #[test]
    fn merge_sorts_and_dedups() {
        let defines = [
            Define::flag("VC"),
            Define::valued("NUM_LIGHTS", "2"),
            Define::flag("VC"),
            Define::flag("ANISO_LIGHTING"),
        ];
        assert_eq!(merge_defines(&defines), "ANISO_LIGHTING NUM_LIGHTS=2 VC");
    }

    #[test]
    fn descriptor_is_not_identity() {
        let defines = [Define::flag("RENDER_DEPTH")];
        let a = build_cache_key("Grass", ShaderStage::Vertex, VariantDescriptor(8), &defines, false);
        let b = build_cache_key("Grass", ShaderStage::Vertex, VariantDescriptor(0x18), &defines, false);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn key_is_order_independent(names in proptest::collection::vec("[A-Z_]{1,12}", 0..12)) {
            let forward: Vec<Define> = names.iter().map(Define::flag).collect();
            let reversed: Vec<Define> = forward.iter().rev().cloned().collect();
            let a = build_cache_key("Effect", ShaderStage::Pixel, VariantDescriptor(1), &forward, false);
            let b = build_cache_key("Effect", ShaderStage::Pixel, VariantDescriptor(2), &reversed, false);
            prop_assert_eq!(a, b);
        }
    }
}
