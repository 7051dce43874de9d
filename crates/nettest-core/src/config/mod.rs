//! Configuration files: marker presets and declarative API definitions.

pub mod error;
pub mod markers;
pub mod parser;

pub use error::ConfigError;
pub use markers::{BlockerSettings, MarkerConfig, BLOCKED_MARKER, LIMITED_MARKER};
pub use parser::{load_api_specs, load_config, strip_json_comments, ConfigFormat};
