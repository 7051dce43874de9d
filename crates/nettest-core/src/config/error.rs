//! Errors raised while loading marker and API definition files.

use crate::error::MockError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Extension is none of `json`, `jsonc`, `yaml`, `yml`
    #[error("unsupported config file {0}: expected .json, .jsonc, .yaml or .yml")]
    UnknownFileType(String),
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("bad API file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    /// Marker name with no blocker settings
    #[error("no blocker settings for marker '{0}'")]
    UnknownMarker(String),
    /// API definition that cannot be turned into a mock
    #[error("invalid API definition: {0}")]
    Api(#[from] MockError),
}
