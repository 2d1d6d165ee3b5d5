//! Process-wide diagnostic counters.
//!
//! A [`Diagnostics`] is created once by the host and passed by reference to
//! every flatten call. It never influences output content; the sequence
//! number only correlates log records for one message.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared message counters.
#[derive(Debug, Default)]
pub struct Diagnostics {
    sequence: AtomicU64,
    flattened: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Last issued sequence number (equals messages received).
    pub received: u64,
    pub flattened: u64,
    pub failed: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence number. The first call returns 1.
    ///
    /// Unique and increasing across threads; numbering between concurrent
    /// callers is unspecified.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_flattened(&self) {
        self.flattened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            received: self.sequence.load(Ordering::Relaxed),
            flattened: self.flattened.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
