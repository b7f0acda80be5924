//! Metrics observer interface
//!
//! The broker does not ship a metrics backend; it reports counter events
//! through this trait and an external collaborator wires them to whatever
//! registry it runs. [`AtomicMetrics`] is the in-process default, enough for
//! the status log and the tests.

use std::sync::atomic::{AtomicU64, Ordering};

use pixelsig_core::Role;

/// Observer for broker counter events. All hooks default to no-ops.
pub trait MetricsSink: Send + Sync {
    fn connection_opened(&self, _role: Role) {}
    fn connection_closed(&self, _role: Role) {}
    /// A frame was forwarded between peers.
    fn frame_forwarded(&self) {}
    /// A frame was lost to outbound backpressure.
    fn frame_dropped(&self) {}
    /// An inbound frame failed to parse.
    fn malformed_frame(&self) {}
}

/// Atomic-counter sink.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    frames_forwarded: AtomicU64,
    frames_dropped: AtomicU64,
    malformed_frames: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    pub fn connections_closed(&self) -> u64 {
        self.connections_closed.load(Ordering::Relaxed)
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames.load(Ordering::Relaxed)
    }
}

impl MetricsSink for AtomicMetrics {
    fn connection_opened(&self, _role: Role) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self, _role: Role) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_forwarded(&self) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }
}
