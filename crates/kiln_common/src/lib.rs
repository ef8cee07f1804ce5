//! Shared foundational types used across the Kiln shader cache.
//!
//! This crate provides the shader family and stage enumerations, the opaque
//! variant descriptor, and the content hash used to validate cached artifacts.

#![warn(missing_docs)]

pub mod descriptor;
pub mod family;
pub mod hash;
pub mod stage;

pub use descriptor::VariantDescriptor;
pub use family::{ParseFamilyError, ShaderFamily};
pub use hash::ContentHash;
pub use stage::{ParseStageError, ShaderStage};
