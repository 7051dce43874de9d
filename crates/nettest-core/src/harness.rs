//! Per-test setup and teardown of network blockers from test markers.

use crate::blocker::NetworkBlocker;
use crate::config::{BlockerSettings, MarkerConfig};
use crate::hook::{HookPoint, SocketFactory};
use std::sync::Arc;
use tracing::debug;

/// Brackets each test with the blocker its markers ask for.
///
/// ```no_run
/// use nettest_core::TestHarness;
///
/// let mut harness = TestHarness::default();
/// harness.setup(&["networkblocked"]);
/// // test body
/// harness.teardown();
/// ```
#[derive(Debug, Default)]
pub struct TestHarness {
    config: MarkerConfig,
    socket_point: Option<Arc<HookPoint<SocketFactory>>>,
    blocker: Option<NetworkBlocker>,
}

impl TestHarness {
    pub fn new(config: MarkerConfig) -> Self {
        Self {
            config,
            socket_point: None,
            blocker: None,
        }
    }

    /// Guard `point` instead of the global socket entry point.
    pub fn with_socket_point(mut self, point: Arc<HookPoint<SocketFactory>>) -> Self {
        self.socket_point = Some(point);
        self
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    /// Install the blocker selected by `markers`, outermost first.
    ///
    /// Returns false when no marker selects a blocker.
    pub fn setup<S: AsRef<str>>(&mut self, markers: &[S]) -> bool {
        self.teardown();
        let Some(settings) = self.config.resolve(markers).cloned() else {
            return false;
        };
        self.setup_with(&settings);
        true
    }

    /// Install a blocker with explicit settings.
    pub fn setup_with(&mut self, settings: &BlockerSettings) {
        self.teardown();
        let mut builder = settings.builder();
        if let Some(point) = &self.socket_point {
            builder = builder.socket_point(point.clone());
        }
        let blocker = builder.build();
        blocker.activate();
        debug!(mode = ?settings.mode, "test harness set up");
        self.blocker = Some(blocker);
    }

    /// Remove the blocker installed by the last setup.
    pub fn teardown(&mut self) {
        if let Some(blocker) = self.blocker.take() {
            blocker.exit();
            debug!("test harness torn down");
        }
    }

    pub fn blocker(&self) -> Option<&NetworkBlocker> {
        self.blocker.as_ref()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.teardown();
    }
}
