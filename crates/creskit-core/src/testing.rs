// ── In-memory link ──
//
// A `FrameSink` that records what would have gone on the wire. Used by
// the test suites and by `Bridge::attach` callers that drive the bridge
// without a controller. Built only with the `testing` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use creskit_proto::FrameSink;

/// Recording link. Clones share the same log and connection flag.
#[derive(Clone, Default)]
pub struct RecordingLink {
    sent: Arc<Mutex<Vec<String>>>,
    connected: Arc<AtomicBool>,
}

impl RecordingLink {
    pub fn connected() -> Self {
        let link = Self::default();
        link.set_connected(true);
        link
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Flip the simulated link state. While down, sends are dropped.
    pub fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.log().clone()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSink for RecordingLink {
    fn send(&self, wire: &str) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.log().push(wire.to_owned());
        true
    }
}
