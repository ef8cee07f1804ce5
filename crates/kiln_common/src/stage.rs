//! Pipeline stages a shader variant is compiled for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The pipeline stage of a compiled program. Orthogonal to the family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Pixel (fragment) shader.
    Pixel,
    /// Compute shader.
    Compute,
}

impl ShaderStage {
    /// Human-readable stage name, used inside cache keys.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::Pixel => "Pixel",
            ShaderStage::Compute => "Compute",
        }
    }

    /// Compiler target profile.
    pub fn profile(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_5_0",
            ShaderStage::Pixel => "ps_5_0",
            ShaderStage::Compute => "cs_5_0",
        }
    }

    /// Extension of the on-disk artifact for this stage.
    pub fn disk_extension(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vso",
            ShaderStage::Pixel => "pso",
            ShaderStage::Compute => "cso",
        }
    }

    /// Preprocessor symbol identifying the stage, if any.
    pub fn stage_define(self) -> Option<&'static str> {
        match self {
            ShaderStage::Vertex => Some("VSHADER"),
            ShaderStage::Pixel => Some("PSHADER"),
            ShaderStage::Compute => None,
        }
    }

    /// Whether the renderer requests this stage through the regular lookup path.
    pub fn is_render_stage(self) -> bool {
        matches!(self, ShaderStage::Vertex | ShaderStage::Pixel)
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a shader stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shader stage '{0}'")]
pub struct ParseStageError(pub String);

impl FromStr for ShaderStage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertex" | "vs" => Ok(ShaderStage::Vertex),
            "pixel" | "ps" | "fragment" => Ok(ShaderStage::Pixel),
            "compute" | "cs" => Ok(ShaderStage::Compute),
            _ => Err(ParseStageError(s.to_string())),
        }
    }
}
