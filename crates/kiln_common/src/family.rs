//! Shader families: the program categories the cache compiles for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of shader program.
///
/// The family decides which define-decoding rules apply to a variant
/// descriptor and which source file (`<Name>.hlsl`) is compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderFamily {
    /// Lit geometry: actors, statics, landscape.
    Lighting,
    /// Screen-space blood splatter.
    BloodSplatter,
    /// Billboarded distant trees.
    DistantTree,
    /// Sky dome, sun, moons, stars and clouds.
    Sky,
    /// Instanced grass.
    Grass,
    /// Particle systems and precipitation.
    Particle,
    /// Water surfaces.
    Water,
    /// Effect meshes (magic, membranes, decals).
    Effect,
}

impl ShaderFamily {
    /// Every family, in declaration order.
    pub const ALL: [ShaderFamily; 8] = [
        ShaderFamily::Lighting,
        ShaderFamily::BloodSplatter,
        ShaderFamily::DistantTree,
        ShaderFamily::Sky,
        ShaderFamily::Grass,
        ShaderFamily::Particle,
        ShaderFamily::Water,
        ShaderFamily::Effect,
    ];

    /// The family name, which is also the stem of its source file.
    pub fn name(self) -> &'static str {
        match self {
            ShaderFamily::Lighting => "Lighting",
            ShaderFamily::BloodSplatter => "BloodSplatter",
            ShaderFamily::DistantTree => "DistantTree",
            ShaderFamily::Sky => "Sky",
            ShaderFamily::Grass => "Grass",
            ShaderFamily::Particle => "Particle",
            ShaderFamily::Water => "Water",
            ShaderFamily::Effect => "Effect",
        }
    }

    /// The source file name, e.g. `Lighting.hlsl`.
    pub fn source_file(self) -> String {
        format!("{}.hlsl", self.name())
    }

    /// Dense index, usable for per-family tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ShaderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a shader family.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shader family '{0}'")]
pub struct ParseFamilyError(pub String);

impl FromStr for ShaderFamily {
    type Err = ParseFamilyError;

    /// Parses a family name case-insensitively (`water`, `Water`, `WATER`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShaderFamily::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseFamilyError(s.to_string()))
    }
}
