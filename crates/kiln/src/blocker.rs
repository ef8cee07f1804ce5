//! Debug aid: refuse to serve one cache key.
//!
//! Stepping through the populated keys one at a time and blocking each lets
//! an operator find the variant responsible for a rendering glitch.

use kiln_common::VariantDescriptor;
use kiln_defines::CacheKey;

/// The currently blocked key and the descriptors that hit it.
#[derive(Debug, Default)]
pub struct VariantBlocker {
    index: Option<usize>,
    key: Option<CacheKey>,
    descriptors: Vec<VariantDescriptor>,
}

impl VariantBlocker {
    /// Moves the block to the next (or previous) key of `keys`, wrapping at
    /// either end. Starts at the first (or last) key when nothing is blocked.
    pub fn step(&mut self, keys: &[CacheKey], forward: bool) -> Option<&CacheKey> {
        if keys.is_empty() {
            return None;
        }
        let len = keys.len();
        let target = match self.index {
            Some(i) if i < len && forward => (i + 1) % len,
            Some(i) if i < len => (i + len - 1) % len,
            _ if forward => 0,
            _ => len - 1,
        };
        self.index = Some(target);
        self.key = Some(keys[target].clone());
        self.descriptors.clear();
        log::debug!("blocking shader ({}/{}) {}", target + 1, len, keys[target]);
        self.key.as_ref()
    }

    /// Stops blocking.
    pub fn disable(&mut self) {
        if self.key.take().is_some() {
            log::debug!("stopped blocking shaders");
        }
        self.index = None;
        self.descriptors.clear();
    }

    /// Returns `true` if `key` is blocked, recording `descriptor` the first
    /// time it is seen.
    pub fn check(&mut self, key: &CacheKey, descriptor: VariantDescriptor) -> bool {
        if self.key.as_ref() != Some(key) {
            return false;
        }
        if !self.descriptors.contains(&descriptor) {
            self.descriptors.push(descriptor);
            log::debug!(
                "skipping blocked shader {descriptor}:{key} total: {}",
                self.descriptors.len()
            );
        }
        true
    }

    /// The blocked key.
    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    /// Distinct descriptors rejected under the blocked key, in arrival order.
    pub fn descriptors(&self) -> &[VariantDescriptor] {
        &self.descriptors
    }
}
