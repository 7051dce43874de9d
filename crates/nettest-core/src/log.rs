//! Ordered record of calls, used for assertions in tests.

use parking_lot::Mutex;

/// Thread-safe, append-only record of the arguments of every call.
#[derive(Debug)]
pub struct CallLog<T> {
    calls: Mutex<Vec<T>>,
}

impl<T> CallLog<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, call: T) {
        self.calls.lock().push(call);
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn was_called(&self) -> bool {
        self.count() > 0
    }

    pub fn called_once(&self) -> bool {
        self.count() == 1
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl<T: Clone> CallLog<T> {
    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.calls.lock().last().cloned()
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self::new()
    }
}
