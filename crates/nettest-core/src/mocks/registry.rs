//! Registry of active mocks.
//!
//! The registry is the only component that patches the send entry point. It keeps
//! mocks of the same identity on a save/restore stack so that exiting an inner mock
//! reactivates the outer one, while mocks of different identities are all consulted,
//! most recently entered first.

use crate::hook::{send_fn, send_point, Connection, HookPoint, SendFn};
use crate::mocks::mode::Mode;
use crate::mocks::scoped::{IdentityKey, MockId, ScopedMock, SendOutcome};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::{debug, trace};

/// What a state transition requires from the send hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTransition {
    /// First mock became active
    Install,
    /// Last mock became inactive
    Uninstall,
    Unchanged,
}

/// Active and overridden mocks, without any side effects.
#[derive(Default)]
pub struct RegistryState {
    /// Activation order, most recent last
    active: Vec<Arc<dyn ScopedMock>>,
    /// Mocks pushed aside by a newer mock of the same identity, oldest first
    overridden: HashMap<IdentityKey, Vec<Arc<dyn ScopedMock>>>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mock` active, pushing aside an active mock of the same identity.
    pub fn register(&mut self, mock: Arc<dyn ScopedMock>) -> HookTransition {
        let id = mock.id();
        if self.is_active(id) {
            return HookTransition::Unchanged;
        }

        let identity = mock.identity();
        // A mock re-entered while overridden moves back to the top.
        self.remove_overridden(&identity, id);

        let was_empty = self.active.is_empty();
        if let Some(pos) = self.active.iter().position(|m| m.identity() == identity) {
            let previous = self.active.remove(pos);
            debug!(%identity, "overriding active mock");
            self.overridden.entry(identity).or_default().push(previous);
        }
        self.active.push(mock);

        if was_empty {
            HookTransition::Install
        } else {
            HookTransition::Unchanged
        }
    }

    /// Make `mock` inactive, restoring the mock it overrode, if any.
    pub fn unregister(&mut self, mock: &dyn ScopedMock) -> HookTransition {
        let id = mock.id();
        let identity = mock.identity();
        let was_empty = self.active.is_empty();

        if let Some(pos) = self.active.iter().position(|m| m.id() == id) {
            self.active.remove(pos);
            if let Some(stack) = self.overridden.get_mut(&identity) {
                if let Some(restored) = stack.pop() {
                    debug!(%identity, "restoring overridden mock");
                    self.active.push(restored);
                }
                if stack.is_empty() {
                    self.overridden.remove(&identity);
                }
            }
        } else {
            self.remove_overridden(&identity, id);
        }

        if !was_empty && self.active.is_empty() {
            HookTransition::Uninstall
        } else {
            HookTransition::Unchanged
        }
    }

    fn remove_overridden(&mut self, identity: &IdentityKey, id: MockId) {
        if let Some(stack) = self.overridden.get_mut(identity) {
            stack.retain(|m| m.id() != id);
            if stack.is_empty() {
                self.overridden.remove(identity);
            }
        }
    }

    pub fn is_active(&self, id: MockId) -> bool {
        self.active.iter().any(|m| m.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active mock ids in activation order.
    pub fn active_ids(&self) -> Vec<MockId> {
        self.active.iter().map(|m| m.id()).collect()
    }

    /// Overridden mock ids of one identity, oldest first.
    pub fn overridden_ids(&self, identity: &IdentityKey) -> Vec<MockId> {
        self.overridden
            .get(identity)
            .map(|stack| stack.iter().map(|m| m.id()).collect())
            .unwrap_or_default()
    }

    /// Copy of the active mocks, safe to iterate while the state changes.
    pub fn snapshot(&self) -> Vec<Arc<dyn ScopedMock>> {
        self.active.clone()
    }
}

impl fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryState")
            .field("active", &self.active_ids())
            .field(
                "overridden",
                &self
                    .overridden
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.len()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

struct RegistryInner {
    state: RegistryState,
    /// Send function in place before the hook was installed
    original: Option<Arc<SendFn>>,
}

/// Tracks active mocks and installs the send hook while any are active.
pub struct InterceptionRegistry {
    send_point: Arc<HookPoint<SendFn>>,
    inner: Mutex<RegistryInner>,
}

static GLOBAL: Lazy<Arc<InterceptionRegistry>> =
    Lazy::new(|| InterceptionRegistry::new(send_point().clone()));

impl InterceptionRegistry {
    /// Registry patching `send_point`.
    pub fn new(send_point: Arc<HookPoint<SendFn>>) -> Arc<Self> {
        Arc::new(Self {
            send_point,
            inner: Mutex::new(RegistryInner {
                state: RegistryState::new(),
                original: None,
            }),
        })
    }

    /// Registry patching the process-wide send entry point.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    pub fn register(self: &Arc<Self>, mock: Arc<dyn ScopedMock>) {
        let identity = mock.identity();
        let mut inner = self.inner.lock();
        let transition = inner.state.register(mock);
        debug!(%identity, ?transition, "registered mock");

        if transition == HookTransition::Install && inner.original.is_none() {
            let registry = Arc::downgrade(self);
            let hook = send_fn(move |connection, data| match registry.upgrade() {
                Some(registry) => registry.dispatch(connection, data),
                None => connection.transmit(data),
            });
            inner.original = Some(self.send_point.replace(hook));
            debug!("installed send hook");
        }
    }

    pub fn unregister(&self, mock: &dyn ScopedMock) {
        let mut inner = self.inner.lock();
        let transition = inner.state.unregister(mock);
        debug!(identity = %mock.identity(), ?transition, "unregistered mock");

        if transition == HookTransition::Uninstall {
            if let Some(original) = inner.original.take() {
                self.send_point.replace(original);
                debug!("restored original send function");
            }
        }
    }

    /// Route one send attempt through the active mocks, most recent first.
    pub fn dispatch(&self, connection: &mut dyn Connection, data: &[u8]) -> io::Result<()> {
        let (mocks, original) = {
            let inner = self.inner.lock();
            (inner.state.snapshot(), inner.original.clone())
        };

        for mock in mocks.iter().rev() {
            let SendOutcome::Cancel(response) = mock.handle_send(data)? else {
                continue;
            };
            mock.record_send(data);
            if mock.mode() == Mode::Intercept {
                trace!(identity = %mock.identity(), bytes = data.len(), "send intercepted");
                if let Some(response) = response {
                    connection.install_response(response);
                }
                return Ok(());
            }
            trace!(identity = %mock.identity(), bytes = data.len(), "send observed");
        }

        match original {
            Some(send) => send(connection, data),
            None => connection.transmit(data),
        }
    }

    pub fn is_active(&self, id: MockId) -> bool {
        self.inner.lock().state.is_active(id)
    }

    /// True while the send hook is installed.
    pub fn is_hooked(&self) -> bool {
        self.inner.lock().original.is_some()
    }

    pub fn active_ids(&self) -> Vec<MockId> {
        self.inner.lock().state.active_ids()
    }
}

impl Drop for InterceptionRegistry {
    fn drop(&mut self) {
        if let Some(original) = self.inner.get_mut().original.take() {
            self.send_point.replace(original);
        }
    }
}

impl fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InterceptionRegistry")
            .field("state", &inner.state)
            .field("hooked", &inner.original.is_some())
            .finish()
    }
}
