//! Preprocessor define generation and cache key construction.
//!
//! Turns a `(family, descriptor)` pair into the ordered list of preprocessor
//! symbols the compiler needs, and derives the canonical [`CacheKey`] that
//! identifies the compiled variant. Everything here is pure: no I/O, no
//! shared state.

#![warn(missing_docs)]

pub mod define;
pub mod families;
pub mod features;
pub mod generator;
pub mod globals;
pub mod key;

pub use define::Define;
pub use families::resolve_defines;
pub use features::FeatureRegistry;
pub use generator::DefineGenerator;
pub use globals::GlobalDefines;
pub use key::{build_cache_key, merge_defines, CacheKey};
