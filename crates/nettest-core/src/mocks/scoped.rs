//! Scoped mocks: units of activation that take part in send interception.

use crate::api::SyntheticResponse;
use crate::error::MockError;
use crate::log::CallLog;
use crate::mocks::mode::Mode;
use crate::mocks::registry::InterceptionRegistry;
use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decision of a mock about one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Not handled; later mocks and the real send get their turn
    Pass,
    /// Handled; the real send should not happen, optionally with a response to read instead
    Cancel(Option<SyntheticResponse>),
}

/// Key deciding which mocks override each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(Cow<'static, str>);

impl IdentityKey {
    /// Key derived from a concrete type.
    pub fn of<T: ?Sized>() -> Self {
        Self(Cow::Borrowed(type_name::<T>()))
    }

    /// Key with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of one mock instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockId(u64);

impl MockId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-send hook of a user-defined mock.
pub trait SendInterceptor: Send + Sync + 'static {
    /// Inspect raw outbound bytes and decide whether to handle them.
    fn on_send(&self, data: &[u8]) -> Result<SendOutcome, MockError>;

    /// Mocks with equal keys override each other while nested.
    fn identity(&self) -> IdentityKey {
        IdentityKey::of::<Self>()
    }
}

/// Mock as seen by the [`InterceptionRegistry`].
pub trait ScopedMock: Send + Sync {
    fn id(&self) -> MockId;
    fn identity(&self) -> IdentityKey;
    fn mode(&self) -> Mode;
    fn handle_send(&self, data: &[u8]) -> Result<SendOutcome, MockError>;
    /// Record a send this mock claimed.
    fn record_send(&self, data: &[u8]);
}

struct MockState<I> {
    id: MockId,
    mode: Mode,
    interceptor: I,
    sends: CallLog<Vec<u8>>,
}

impl<I: SendInterceptor> ScopedMock for MockState<I> {
    fn id(&self) -> MockId {
        self.id
    }

    fn identity(&self) -> IdentityKey {
        self.interceptor.identity()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn handle_send(&self, data: &[u8]) -> Result<SendOutcome, MockError> {
        self.interceptor.on_send(data)
    }

    fn record_send(&self, data: &[u8]) {
        self.sends.record(data.to_vec());
    }
}

/// Scoped mock driven by a [`SendInterceptor`].
///
/// Entering registers it with its registry; exiting (or dropping the guard)
/// unregisters it. A mock in [`Mode::Disabled`] never registers.
pub struct HttpMock<I: SendInterceptor> {
    state: Arc<MockState<I>>,
    registry: Arc<InterceptionRegistry>,
}

impl<I: SendInterceptor> HttpMock<I> {
    /// Intercepting mock registered with the global registry.
    pub fn new(interceptor: I) -> Self {
        Self::builder(interceptor).build()
    }

    pub fn builder(interceptor: I) -> HttpMockBuilder<I> {
        HttpMockBuilder {
            interceptor,
            mode: Mode::default(),
            registry: None,
        }
    }

    pub fn id(&self) -> MockId {
        self.state.id
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn identity(&self) -> IdentityKey {
        self.state.interceptor.identity()
    }

    pub fn interceptor(&self) -> &I {
        &self.state.interceptor
    }

    /// Every send this mock claimed, in order.
    pub fn sends(&self) -> &CallLog<Vec<u8>> {
        &self.state.sends
    }

    /// Register without a guard; pair with [`exit`](Self::exit).
    pub fn activate(&self) {
        if self.state.mode == Mode::Disabled {
            return;
        }
        self.registry.register(self.state.clone());
    }

    /// Register and return a guard that exits on drop.
    pub fn enter(&self) -> MockGuard<'_, I> {
        self.activate();
        MockGuard { mock: self }
    }

    /// Unregister; a no-op if the mock is not tracked.
    pub fn exit(&self) {
        self.registry.unregister(self.state.as_ref());
    }

    /// True while this instance receives sends.
    pub fn is_active(&self) -> bool {
        self.registry.is_active(self.state.id)
    }
}

impl<I: SendInterceptor> fmt::Debug for HttpMock<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMock")
            .field("id", &self.state.id)
            .field("identity", &self.identity())
            .field("mode", &self.state.mode)
            .finish()
    }
}

/// Builder for [`HttpMock`].
pub struct HttpMockBuilder<I> {
    interceptor: I,
    mode: Mode,
    registry: Option<Arc<InterceptionRegistry>>,
}

impl<I: SendInterceptor> HttpMockBuilder<I> {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Register with `registry` instead of the global one.
    pub fn registry(mut self, registry: Arc<InterceptionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> HttpMock<I> {
        HttpMock {
            state: Arc::new(MockState {
                id: MockId::next(),
                mode: self.mode,
                interceptor: self.interceptor,
                sends: CallLog::new(),
            }),
            registry: self.registry.unwrap_or_else(InterceptionRegistry::global),
        }
    }
}

/// Active scope of an [`HttpMock`]; exits the mock when dropped.
#[must_use = "the mock exits as soon as the guard is dropped"]
pub struct MockGuard<'a, I: SendInterceptor> {
    mock: &'a HttpMock<I>,
}

impl<I: SendInterceptor> Deref for MockGuard<'_, I> {
    type Target = HttpMock<I>;

    fn deref(&self) -> &Self::Target {
        self.mock
    }
}

impl<I: SendInterceptor> Drop for MockGuard<'_, I> {
    fn drop(&mut self) {
        self.mock.exit();
    }
}
