//! Defines shared by every variant the cache compiles.

use std::collections::BTreeMap;

use kiln_common::ShaderStage;

use crate::define::Define;

/// Build-wide defines appended after family and feature defines.
///
/// These are identical for every entry of a cache instance, so they stay out
/// of the cache key and are tracked by the disk cache fingerprint instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalDefines {
    /// Adds `D3DCOMPILE_SKIP_OPTIMIZATION` and `D3DCOMPILE_DEBUG`.
    pub developer_mode: bool,
    /// Adds `VR`.
    pub vr: bool,
    /// Host-supplied symbols, in order.
    pub extra: Vec<Define>,
}

impl GlobalDefines {
    /// Appends the global defines for `stage` to `out`.
    pub fn append_to(&self, stage: ShaderStage, out: &mut Vec<Define>) {
        if let Some(symbol) = stage.stage_define() {
            out.push(Define::flag(symbol));
        }
        if self.developer_mode {
            out.push(Define::flag("D3DCOMPILE_SKIP_OPTIMIZATION"));
            out.push(Define::flag("D3DCOMPILE_DEBUG"));
        }
        if self.vr {
            out.push(Define::flag("VR"));
        }
        out.extend(self.extra.iter().cloned());
    }

    /// The values whose change makes previously persisted artifacts unusable.
    pub fn fingerprint(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("developer_mode".to_string(), self.developer_mode.to_string());
        map.insert("vr".to_string(), self.vr.to_string());
        let extra: Vec<String> = self.extra.iter().map(|d| d.to_string()).collect();
        map.insert("defines".to_string(), extra.join(" "));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(globals: &GlobalDefines, stage: ShaderStage) -> Vec<String> {
        let mut out = Vec::new();
        globals.append_to(stage, &mut out);
        out.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn stage_define_only_by_default() {
        let globals = GlobalDefines::default();
        assert_eq!(rendered(&globals, ShaderStage::Vertex), vec!["VSHADER"]);
        assert_eq!(rendered(&globals, ShaderStage::Pixel), vec!["PSHADER"]);
        assert!(rendered(&globals, ShaderStage::Compute).is_empty());
    }

    #[test]
    fn ordering_of_global_defines() {
        let globals = GlobalDefines {
            developer_mode: true,
            vr: true,
            extra: vec![Define::valued("MAX_LIGHTS", "16"), Define::flag("EXTRA_FOG")],
        };
        assert_eq!(
            rendered(&globals, ShaderStage::Pixel),
            vec![
                "PSHADER",
                "D3DCOMPILE_SKIP_OPTIMIZATION",
                "D3DCOMPILE_DEBUG",
                "VR",
                "MAX_LIGHTS=16",
                "EXTRA_FOG",
            ]
        );
    }

    #[test]
    fn fingerprint_tracks_settings() {
        let a = GlobalDefines::default();
        let b = GlobalDefines {
            vr: true,
            ..GlobalDefines::default()
        };
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint()["defines"], "");
    }
}
