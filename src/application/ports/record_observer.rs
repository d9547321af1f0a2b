use crate::domain::entities::RecordSnapshot;

/// Receives a snapshot after every record transition: state changes, dirty
/// flags, save begin/end, errors. Fire-and-forget; the engine never waits on
/// an observer and a slow one must shed work itself.
pub trait RecordObserver: Send + Sync {
    fn record_changed(&self, snapshot: &RecordSnapshot);
}

/// Observer that drops everything. Default wiring for callers that only poll
/// snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RecordObserver for NoopObserver {
    fn record_changed(&self, _snapshot: &RecordSnapshot) {}
}
