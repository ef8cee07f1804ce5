//! Defines contributed by loaded renderer features.

use kiln_common::ShaderFamily;

use crate::define::Define;

/// Per-family lists of feature defines.
///
/// Features only contribute symbols; the registry knows nothing about what a
/// feature renders. Registration order is preserved per family.
#[derive(Debug, Clone, Default)]
pub struct FeatureRegistry {
    by_family: [Vec<Define>; ShaderFamily::ALL.len()],
}

impl FeatureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `define` for each of `families`. Registering the same symbol
    /// twice for a family is a no-op.
    pub fn register(&mut self, define: Define, families: &[ShaderFamily]) {
        for family in families {
            let slot = &mut self.by_family[family.index()];
            if !slot.iter().any(|d| d.name == define.name) {
                slot.push(define.clone());
            }
        }
    }

    /// The feature defines for a family, in registration order.
    pub fn defines_for(&self, family: ShaderFamily) -> &[Define] {
        &self.by_family[family.index()]
    }

    /// Every distinct feature symbol, sorted. Feeds the disk cache fingerprint.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .by_family
            .iter()
            .flatten()
            .map(|d| d.to_string())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Returns `true` if no feature has been registered.
    pub fn is_empty(&self) -> bool {
        self.by_family.iter().all(Vec::is_empty)
    }
}
