//! Parsing and validation of `kiln.toml` shader cache configuration.
//!
//! The configuration controls where shader sources and the disk cache live,
//! the compilation thread budgets, extra global defines, feature defines,
//! file watching, and the external compiler command used by the CLI.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use types::*;
