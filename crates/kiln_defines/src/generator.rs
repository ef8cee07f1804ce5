//! Combines family, feature and global defines.

use std::collections::BTreeMap;

use kiln_common::{ShaderFamily, ShaderStage, VariantDescriptor};

use crate::define::Define;
use crate::families::resolve_defines;
use crate::features::FeatureRegistry;
use crate::globals::GlobalDefines;
use crate::key::{build_cache_key, merge_defines, CacheKey};

/// Produces define lists and cache keys for `(stage, family, descriptor)`.
#[derive(Debug, Clone, Default)]
pub struct DefineGenerator {
    features: FeatureRegistry,
    globals: GlobalDefines,
}

impl DefineGenerator {
    /// Creates a generator from registered features and build-wide defines.
    pub fn new(features: FeatureRegistry, globals: GlobalDefines) -> Self {
        Self { features, globals }
    }

    /// The build-wide defines.
    pub fn globals(&self) -> &GlobalDefines {
        &self.globals
    }

    /// The registered features.
    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    /// Family defines followed by feature defines. These form the cache key.
    pub fn family_defines(&self, family: ShaderFamily, descriptor: VariantDescriptor) -> Vec<Define> {
        let mut defines = resolve_defines(family, descriptor);
        defines.extend(self.features.defines_for(family).iter().cloned());
        defines
    }

    /// The complete ordered list handed to the compiler.
    pub fn compile_defines(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
    ) -> Vec<Define> {
        let mut defines = self.family_defines(family, descriptor);
        self.globals.append_to(stage, &mut defines);
        defines
    }

    /// The canonical cache key.
    pub fn cache_key(&self, stage: ShaderStage, family: ShaderFamily, descriptor: VariantDescriptor) -> CacheKey {
        let defines = self.family_defines(family, descriptor);
        build_cache_key(family.name(), stage, descriptor, &defines, false)
    }

    /// The descriptor-inclusive key, used in log output.
    pub fn diagnostic_key(
        &self,
        stage: ShaderStage,
        family: ShaderFamily,
        descriptor: VariantDescriptor,
    ) -> CacheKey {
        let defines = self.family_defines(family, descriptor);
        build_cache_key(family.name(), stage, descriptor, &defines, true)
    }

    /// Sorted, space separated family and feature defines.
    pub fn defines_string(&self, family: ShaderFamily, descriptor: VariantDescriptor) -> String {
        merge_defines(&self.family_defines(family, descriptor))
    }

    /// Environment values that must match for persisted artifacts to be reused.
    pub fn fingerprint(&self) -> BTreeMap<String, String> {
        let mut map = self.globals.fingerprint();
        map.insert("features".to_string(), self.features.all_symbols().join(" "));
        map
    }
}
