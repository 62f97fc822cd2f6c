// ── Host-facing update sink ──
//
// The bridge pushes peer-originated values out through `PointSink`.
// The host model (characteristic objects, a UI, a log) implements it.

use tokio::sync::mpsc;

use crate::model::PointUpdate;

/// Receiver of values the controller reported on its own.
///
/// Called from the dispatcher task; implementations must not block.
pub trait PointSink: Send + Sync {
    fn push(&self, update: PointUpdate);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PointSink for NullSink {
    fn push(&self, _update: PointUpdate) {}
}

/// Logs every update at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl PointSink for TracingSink {
    fn push(&self, update: PointUpdate) {
        tracing::info!(
            kind = %update.kind,
            id = %update.id,
            name = %update.name,
            characteristic = %update.characteristic,
            value = ?update.value,
            "point updated"
        );
    }
}

impl PointSink for mpsc::UnboundedSender<PointUpdate> {
    fn push(&self, update: PointUpdate) {
        // Receiver gone means nobody is listening any more.
        let _ = self.send(update);
    }
}
