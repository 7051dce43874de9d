//! Reading marker and API definition files.
//!
//! The format follows the extension: `.json`, `.jsonc` (JSON with `//` and `/* */`
//! comments) or `.yaml`/`.yml`.

use crate::api::ApiSpec;
use crate::config::error::ConfigError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Jsonc,
    Yaml,
}

impl ConfigFormat {
    /// Format named by the extension of `path`, case-insensitive.
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "jsonc" => Some(Self::Jsonc),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, ConfigError> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Jsonc => serde_json::from_str(&strip_json_comments(content))?,
            Self::Yaml => serde_yaml::from_str(content)?,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Str,
    Escape,
    LineComment,
    BlockComment,
}

/// Remove JSONC comments. String contents and line breaks are left alone, so
/// parse errors still point at the right line.
pub fn strip_json_comments(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut scan = Scan::Code;

    while let Some(c) = chars.next() {
        scan = match (scan, c) {
            (Scan::Code, '/') if chars.peek() == Some(&'/') => {
                chars.next();
                Scan::LineComment
            }
            (Scan::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                Scan::BlockComment
            }
            (Scan::Code, '"') => {
                result.push(c);
                Scan::Str
            }
            (Scan::Str, '\\') => {
                result.push(c);
                Scan::Escape
            }
            (Scan::Str, '"') => {
                result.push(c);
                Scan::Code
            }
            (Scan::Escape, _) => {
                result.push(c);
                Scan::Str
            }
            (Scan::LineComment, '\n' | '\r') => {
                result.push(c);
                Scan::Code
            }
            (Scan::LineComment, _) => Scan::LineComment,
            (Scan::BlockComment, '*') if chars.peek() == Some(&'/') => {
                chars.next();
                Scan::Code
            }
            (Scan::BlockComment, '\n') => {
                result.push(c);
                Scan::BlockComment
            }
            (Scan::BlockComment, _) => Scan::BlockComment,
            (state, _) => {
                result.push(c);
                state
            }
        };
    }

    result
}

/// Read and parse a config file in the format named by its extension
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let format = ConfigFormat::of(path).ok_or_else(|| ConfigError::UnknownFileType(display.clone()))?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display,
        source,
    })?;
    format.parse(&content)
}

/// Load every API definition file matching a glob pattern, in path order
pub fn load_api_specs(pattern: &str) -> Result<Vec<ApiSpec>, ConfigError> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry.map_err(|err| ConfigError::Io {
            path: err.path().display().to_string(),
            source: err.into_error(),
        })?;
        paths.push(path);
    }
    paths.sort();

    let mut specs = Vec::with_capacity(paths.len());
    for path in &paths {
        debug!(path = %path.display(), "loading API definition");
        specs.push(load_config(path)?);
    }
    Ok(specs)
}
