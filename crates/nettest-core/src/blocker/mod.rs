//! Guarding socket construction against unexpected network use.

pub mod guard;
pub mod stack;

pub use guard::{BlockerGuard, Diagnostics, NetworkBlocker, NetworkBlockerBuilder};
pub use stack::{capture_stack, filter_stack, frame_in_package, is_library_frame, stack_allowed, StackFrame};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reaction of a [`NetworkBlocker`] to a disallowed socket construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockMode {
    /// Fail the construction with [`NetworkBlocked`](crate::NetworkBlocked)
    #[default]
    Strict,
    /// Print where it happened and let it proceed
    Warning,
    /// Do nothing; the blocker never installs itself
    Disabled,
}

/// Datastore clients a functional test is usually allowed to reach.
pub const DATASTORE_PACKAGES: &[&str] = &[
    "redis",
    "diesel",
    "sqlx",
    "postgres",
    "tokio-postgres",
    "mongodb",
];

/// Output capturing of the test runner, suspended while a warning is printed.
pub trait CaptureControl: Send + Sync {
    fn is_capturing(&self) -> bool;
    fn suspend(&self);
    fn resume(&self);
}

static CAPTURE_CONTROL: Lazy<RwLock<Option<Arc<dyn CaptureControl>>>> = Lazy::new(|| RwLock::new(None));

/// Register the process-wide capture control, returning the previous one.
pub fn set_capture_control(control: Option<Arc<dyn CaptureControl>>) -> Option<Arc<dyn CaptureControl>> {
    std::mem::replace(&mut *CAPTURE_CONTROL.write(), control)
}

/// Process-wide capture control, if one is registered.
pub fn capture_control() -> Option<Arc<dyn CaptureControl>> {
    CAPTURE_CONTROL.read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("\"STRICT\"", BlockMode::Strict)]
    #[case("\"WARNING\"", BlockMode::Warning)]
    #[case("\"DISABLED\"", BlockMode::Disabled)]
    fn test_block_mode_deserialize(#[case] json: &str, #[case] expected: BlockMode) {
        let mode: BlockMode = serde_json::from_str(json).unwrap();
        assert_eq!(mode, expected);
    }

    #[rstest]
    fn test_block_mode_default_is_strict() {
        assert_eq!(BlockMode::default(), BlockMode::Strict);
    }
}
