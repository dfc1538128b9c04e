//! Error types for ptemplate-renderer.
//!
//! Rendering itself never fails; these cover building a configuration.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or validating render options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field delimiter was empty.
    #[error("{which} delimiter must not be empty")]
    EmptyDelimiter { which: &'static str },

    /// YAML parse error in an options document.
    #[error("invalid render options: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error in an options document.
    #[error("invalid render options: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while reading an options file.
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
