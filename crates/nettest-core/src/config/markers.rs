//! Test markers and the blocker presets they select.

use crate::blocker::{BlockMode, NetworkBlocker, NetworkBlockerBuilder, DATASTORE_PACKAGES};
use crate::config::error::ConfigError;
use crate::config::parser::load_config;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Marker of tests that must not touch the network at all.
pub const BLOCKED_MARKER: &str = "networkblocked";
/// Marker of tests that may only reach datastores.
pub const LIMITED_MARKER: &str = "networklimited";

/// Settings of the [`NetworkBlocker`] created for a marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerSettings {
    #[serde(default)]
    pub mode: BlockMode,
    #[serde(default)]
    pub allowed_packages: Vec<String>,
    #[serde(default = "default_filter_stack")]
    pub filter_stack: bool,
}

fn default_filter_stack() -> bool {
    true
}

impl Default for BlockerSettings {
    fn default() -> Self {
        Self {
            mode: BlockMode::default(),
            allowed_packages: Vec::new(),
            filter_stack: default_filter_stack(),
        }
    }
}

impl BlockerSettings {
    /// Strict, no exceptions
    pub fn blocked() -> Self {
        Self::default()
    }

    /// Strict, datastore clients allowed
    pub fn limited() -> Self {
        Self {
            allowed_packages: DATASTORE_PACKAGES.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Builder preloaded with these settings.
    pub fn builder(&self) -> NetworkBlockerBuilder {
        NetworkBlocker::builder()
            .mode(self.mode)
            .allowed_packages(self.allowed_packages.iter().cloned())
            .filter_stack(self.filter_stack)
    }

    pub fn build(&self) -> NetworkBlocker {
        self.builder().build()
    }
}

/// Marker name to blocker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default)]
    pub markers: BTreeMap<String, BlockerSettings>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        let mut markers = BTreeMap::new();
        markers.insert(BLOCKED_MARKER.to_string(), BlockerSettings::blocked());
        markers.insert(LIMITED_MARKER.to_string(), BlockerSettings::limited());
        Self { markers }
    }
}

impl MarkerConfig {
    /// Built-in markers overridden and extended by the file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let loaded: MarkerConfig = load_config(path)?;
        let mut config = Self::default();
        config.merge(loaded);
        Ok(config)
    }

    /// Add the markers of `other`, replacing those with the same name
    pub fn merge(&mut self, other: MarkerConfig) {
        self.markers.extend(other.markers);
    }

    pub fn insert(&mut self, marker: impl Into<String>, settings: BlockerSettings) {
        self.markers.insert(marker.into(), settings);
    }

    pub fn get(&self, marker: &str) -> Result<&BlockerSettings, ConfigError> {
        self.markers
            .get(marker)
            .ok_or_else(|| ConfigError::UnknownMarker(marker.to_string()))
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.markers.contains_key(marker)
    }

    /// Settings for a test carrying `markers`, outermost first.
    ///
    /// [`BLOCKED_MARKER`] takes precedence over [`LIMITED_MARKER`] wherever they
    /// appear. Otherwise the innermost marker with settings wins.
    pub fn resolve<S: AsRef<str>>(&self, markers: &[S]) -> Option<&BlockerSettings> {
        let carries = |name: &str| markers.iter().any(|marker| marker.as_ref() == name);
        [BLOCKED_MARKER, LIMITED_MARKER]
            .into_iter()
            .filter(|name| carries(*name))
            .find_map(|name| self.markers.get(name))
            .or_else(|| {
                markers
                    .iter()
                    .rev()
                    .find_map(|marker| self.markers.get(marker.as_ref()))
            })
    }
}
