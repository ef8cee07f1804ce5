//! Errors from reading and checking `kiln.toml`.

use std::path::PathBuf;

/// Why a configuration could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("malformed kiln.toml: {0}")]
    Parse(String),

    /// A required value is absent or empty.
    #[error("kiln.toml is missing `{0}`")]
    MissingField(String),

    /// A value is present but unusable.
    #[error("invalid kiln.toml: {0}")]
    Invalid(String),
}
