//! One unit of background compilation.

use std::hash::{Hash, Hasher};

use kiln_common::{ShaderFamily, ShaderStage, VariantDescriptor};
use kiln_defines::CacheKey;

/// A request to compile one variant.
///
/// Identity is `(stage, family, descriptor)`; the key is carried along so
/// workers and the dedup check do not have to regenerate defines.
#[derive(Debug, Clone)]
pub struct CompilationTask {
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Shader family.
    pub family: ShaderFamily,
    /// Variant descriptor.
    pub descriptor: VariantDescriptor,
    /// Cache key of the variant.
    pub key: CacheKey,
}

impl CompilationTask {
    /// Creates a task.
    pub fn new(
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
        key: CacheKey,
    ) -> Self {
        Self {
            stage,
            family,
            descriptor,
            key,
        }
    }

    /// The source the task compiles.
    pub fn source_id(&self) -> &'static str {
        self.family.name()
    }

    fn identity(&self) -> (ShaderStage, ShaderFamily, VariantDescriptor) {
        (self.stage, self.family, self.descriptor)
    }
}

impl PartialEq for CompilationTask {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for CompilationTask {}

impl Hash for CompilationTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_ignores_key() {
        let a = CompilationTask::new(
            ShaderStage::Pixel,
            ShaderFamily::Sky,
            VariantDescriptor(1),
            CacheKey::from_raw("Sky:Pixel:TEX DITHER"),
        );
        let b = CompilationTask {
            key: CacheKey::from_raw("other"),
            ..a.clone()
        };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(!set.insert(b));

        let vertex = CompilationTask {
            stage: ShaderStage::Vertex,
            ..a
        };
        assert!(set.insert(vertex));
    }
}
