//! The [`NetworkBlocker`] scoped guard around socket construction.

use crate::blocker::stack::{self, StackFrame};
use crate::blocker::{capture_control, BlockMode, CaptureControl, DATASTORE_PACKAGES};
use crate::error::NetworkBlocked;
use crate::hook::{self, HookPoint, SocketFactory, SocketRequest};
use crate::log::CallLog;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sink for the warnings printed in [`BlockMode::Warning`].
pub type Diagnostics = Arc<Mutex<dyn Write + Send>>;

type StackCapture = dyn Fn() -> Vec<StackFrame> + Send + Sync;

struct Policy {
    mode: BlockMode,
    allowed_packages: Vec<String>,
    filter_stack: bool,
    capture_stack: Arc<StackCapture>,
    diagnostics: Diagnostics,
    capture: Option<Arc<dyn CaptureControl>>,
    violations: CallLog<Vec<StackFrame>>,
}

impl Policy {
    fn check(&self, request: &SocketRequest) -> io::Result<()> {
        let stack = (self.capture_stack)();
        if stack::stack_allowed(&stack, &self.allowed_packages) {
            debug!(addr = %request.addr, "socket allowed by package allowlist");
            return Ok(());
        }

        match self.mode {
            BlockMode::Strict => {
                warn!(addr = %request.addr, kind = ?request.kind, "network connection blocked");
                self.violations.record(stack);
                Err(NetworkBlocked.into())
            }
            BlockMode::Warning => {
                warn!(addr = %request.addr, kind = ?request.kind, "unexpected network connection");
                self.report(&stack);
                self.violations.record(stack);
                Ok(())
            }
            BlockMode::Disabled => Ok(()),
        }
    }

    fn report(&self, stack: &[StackFrame]) {
        let control = self.capture.clone().or_else(capture_control);
        let suspended = control.filter(|c| c.is_capturing());
        if let Some(control) = &suspended {
            control.suspend();
        }

        let frames = if self.filter_stack {
            stack::filter_stack(stack)
        } else {
            stack.to_vec()
        };
        if let Err(err) = self.write_report(&frames) {
            warn!(%err, "failed to write network warning");
        }

        if let Some(control) = &suspended {
            control.resume();
        }
    }

    fn write_report(&self, frames: &[StackFrame]) -> io::Result<()> {
        let mut out = self.diagnostics.lock();
        writeln!(out)?;
        writeln!(out, "{}", NetworkBlocked)?;
        writeln!(out, "This was most likely an API request.")?;
        writeln!(out, "It happened here:")?;
        for frame in frames {
            write!(out, "{}", frame)?;
        }
        out.flush()
    }
}

/// Wrapper a blocker put on a socket point, and the factory it forwards to.
struct Installed {
    wrapper: Arc<SocketFactory>,
    next: Arc<SocketFactory>,
    enforcing: Arc<AtomicBool>,
}

/// Wrappers of blockers that exited while another wrapper sat above them.
///
/// They stay in the chain as pass-throughs until the wrapper above is removed.
static RETIRED: Lazy<Mutex<Vec<(Arc<SocketFactory>, Arc<SocketFactory>)>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// First factory below `factory` that is not a retired wrapper.
fn skip_retired(mut factory: Arc<SocketFactory>) -> Arc<SocketFactory> {
    let mut retired = RETIRED.lock();
    while let Some(pos) = retired
        .iter()
        .position(|(wrapper, _)| Arc::ptr_eq(wrapper, &factory))
    {
        factory = retired.swap_remove(pos).1;
    }
    factory
}

/// Scoped guard that intercepts socket construction.
///
/// While active, every socket opened through its hook point is checked against the
/// allowed packages. Disallowed constructions fail, print a warning or pass, depending
/// on the [`BlockMode`]. A blocker in [`BlockMode::Disabled`] never installs itself.
pub struct NetworkBlocker {
    policy: Arc<Policy>,
    socket_point: Arc<HookPoint<SocketFactory>>,
    installed: Mutex<Option<Installed>>,
}

impl NetworkBlocker {
    pub fn new(mode: BlockMode) -> Self {
        Self::builder().mode(mode).build()
    }

    pub fn builder() -> NetworkBlockerBuilder {
        NetworkBlockerBuilder::default()
    }

    /// Strict blocker without exceptions.
    pub fn blocked() -> Self {
        Self::new(BlockMode::Strict)
    }

    /// Strict blocker that lets datastore clients through.
    pub fn limited() -> Self {
        Self::builder()
            .allowed_packages(DATASTORE_PACKAGES.iter().copied())
            .build()
    }

    pub fn mode(&self) -> BlockMode {
        self.policy.mode
    }

    pub fn allowed_packages(&self) -> &[String] {
        &self.policy.allowed_packages
    }

    pub fn filters_stack(&self) -> bool {
        self.policy.filter_stack
    }

    /// Stacks of every disallowed construction seen so far.
    pub fn violations(&self) -> &CallLog<Vec<StackFrame>> {
        &self.policy.violations
    }

    /// Whether a stack would be allowed to open sockets.
    pub fn stack_allowed(&self, stack: &[StackFrame]) -> bool {
        stack::stack_allowed(stack, &self.policy.allowed_packages)
    }

    /// Install without a guard; pair with [`exit`](Self::exit).
    pub fn activate(&self) {
        if self.policy.mode == BlockMode::Disabled {
            return;
        }
        let mut installed = self.installed.lock();
        if installed.is_some() {
            return;
        }

        let policy = self.policy.clone();
        let enforcing = Arc::new(AtomicBool::new(true));
        let next = self.socket_point.current();
        let wrapper = {
            let enforcing = enforcing.clone();
            let next = next.clone();
            hook::socket_factory(move |request| {
                if enforcing.load(Ordering::SeqCst) {
                    policy.check(request)?;
                }
                next(request)
            })
        };
        self.socket_point.replace(wrapper.clone());
        *installed = Some(Installed {
            wrapper,
            next,
            enforcing,
        });
        debug!(mode = ?self.policy.mode, allowed = ?self.policy.allowed_packages, "network blocker active");
    }

    /// Install and return a guard that exits on drop.
    pub fn enter(&self) -> BlockerGuard<'_> {
        self.activate();
        BlockerGuard { blocker: self }
    }

    /// Stop checking sockets; a no-op if not active.
    ///
    /// If this blocker's wrapper is still the installed factory, the factory below it
    /// is put back, skipping wrappers of blockers that already exited. Otherwise the
    /// wrapper stays in place as a pass-through until the one above it is removed.
    pub fn exit(&self) {
        let Some(installed) = self.installed.lock().take() else {
            return;
        };
        installed.enforcing.store(false, Ordering::SeqCst);

        if Arc::ptr_eq(&self.socket_point.current(), &installed.wrapper) {
            self.socket_point.replace(skip_retired(installed.next));
            debug!("network blocker removed");
        } else {
            RETIRED.lock().push((installed.wrapper, installed.next));
            debug!("network blocker exited below another wrapper");
        }
    }

    pub fn is_active(&self) -> bool {
        self.installed.lock().is_some()
    }
}

impl Default for NetworkBlocker {
    fn default() -> Self {
        Self::blocked()
    }
}

impl Drop for NetworkBlocker {
    fn drop(&mut self) {
        self.exit();
    }
}

impl fmt::Debug for NetworkBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkBlocker")
            .field("mode", &self.policy.mode)
            .field("allowed_packages", &self.policy.allowed_packages)
            .field("filter_stack", &self.policy.filter_stack)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Builder for [`NetworkBlocker`].
pub struct NetworkBlockerBuilder {
    mode: BlockMode,
    allowed_packages: Vec<String>,
    filter_stack: bool,
    socket_point: Option<Arc<HookPoint<SocketFactory>>>,
    capture_stack: Option<Arc<StackCapture>>,
    diagnostics: Option<Diagnostics>,
    capture: Option<Arc<dyn CaptureControl>>,
}

impl Default for NetworkBlockerBuilder {
    fn default() -> Self {
        Self {
            mode: BlockMode::default(),
            allowed_packages: Vec::new(),
            filter_stack: true,
            socket_point: None,
            capture_stack: None,
            diagnostics: None,
            capture: None,
        }
    }
}

impl NetworkBlockerBuilder {
    pub fn mode(mut self, mode: BlockMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn allowed_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Strip toolchain and dependency frames from printed stacks (on by default).
    pub fn filter_stack(mut self, filter: bool) -> Self {
        self.filter_stack = filter;
        self
    }

    /// Guard `point` instead of the global socket entry point.
    pub fn socket_point(mut self, point: Arc<HookPoint<SocketFactory>>) -> Self {
        self.socket_point = Some(point);
        self
    }

    /// Replace how the call stack of a construction attempt is captured.
    pub fn stack_capture<F>(mut self, capture: F) -> Self
    where
        F: Fn() -> Vec<StackFrame> + Send + Sync + 'static,
    {
        self.capture_stack = Some(Arc::new(capture));
        self
    }

    /// Write warnings to `sink` instead of stderr.
    pub fn diagnostics(mut self, sink: Diagnostics) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn capture_control(mut self, control: Arc<dyn CaptureControl>) -> Self {
        self.capture = Some(control);
        self
    }

    pub fn build(self) -> NetworkBlocker {
        let capture_stack: Arc<StackCapture> = match self.capture_stack {
            Some(capture) => capture,
            None => Arc::new(stack::capture_stack),
        };
        let diagnostics: Diagnostics = match self.diagnostics {
            Some(sink) => sink,
            None => Arc::new(Mutex::new(io::stderr())),
        };

        NetworkBlocker {
            policy: Arc::new(Policy {
                mode: self.mode,
                allowed_packages: self.allowed_packages,
                filter_stack: self.filter_stack,
                capture_stack,
                diagnostics,
                capture: self.capture,
                violations: CallLog::new(),
            }),
            socket_point: self.socket_point.unwrap_or_else(|| hook::socket_point().clone()),
            installed: Mutex::new(None),
        }
    }
}

/// Active scope of a [`NetworkBlocker`]; exits it when dropped.
#[must_use = "the blocker exits as soon as the guard is dropped"]
pub struct BlockerGuard<'a> {
    blocker: &'a NetworkBlocker,
}

impl Deref for BlockerGuard<'_> {
    type Target = NetworkBlocker;

    fn deref(&self) -> &Self::Target {
        self.blocker
    }
}

impl Drop for BlockerGuard<'_> {
    fn drop(&mut self) {
        self.blocker.exit();
    }
}
