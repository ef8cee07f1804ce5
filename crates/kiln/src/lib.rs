//! Shader compilation cache.
//!
//! [`ShaderCache`] is the single entry point for a renderer: ask it for a
//! `(stage, family, descriptor)` variant and it returns the compiled artifact
//! from memory, from the disk cache, from an inline compile, or nothing while
//! a background worker compiles it. Source edits picked up by the file
//! watcher invalidate exactly the affected families.
//!
//! The compiler itself is supplied by the host through [`ShaderCompiler`].

#![warn(missing_docs)]

pub mod blocker;
pub mod cache;
pub mod compiler;
pub mod error;

pub use blocker::VariantBlocker;
pub use cache::{define_generator, ShaderCache};
pub use compiler::{CompileRequest, ShaderCompiler, ENTRY_POINT};
pub use error::ShaderError;

pub use kiln_cache::{Artifact, CompileStatus, Lookup};
pub use kiln_common::{ShaderFamily, ShaderStage, VariantDescriptor};
pub use kiln_config::KilnConfig;
pub use kiln_defines::{CacheKey, Define, DefineGenerator};
pub use kiln_scheduler::CompilationStats;
