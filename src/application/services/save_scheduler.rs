use crate::domain::value_objects::FieldName;
use crate::shared::metrics::EngineMetrics;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Fields whose debounce window closed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveBatch {
    pub fields: BTreeSet<FieldName>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    /// Field -> generation of the countdown currently armed for it.
    armed: HashMap<FieldName, u64>,
    next_generation: u64,
}

/// Per-field debounce. Arming a field that already has a countdown replaces
/// it, so a burst of edits produces one batch carrying the final value. Due
/// batches are emitted on an unbounded channel; the receiver decides what a
/// save actually means.
pub struct SaveScheduler {
    state: Arc<Mutex<SchedulerState>>,
    batches: mpsc::UnboundedSender<SaveBatch>,
    metrics: Arc<EngineMetrics>,
}

impl SaveScheduler {
    pub fn new(metrics: Arc<EngineMetrics>) -> (Self, mpsc::UnboundedReceiver<SaveBatch>) {
        let (batches, receiver) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(SchedulerState::default())),
                batches,
                metrics,
            },
            receiver,
        )
    }

    /// Arms (or re-arms) a countdown for each field. Must be called from
    /// within a Tokio runtime.
    pub fn schedule(&self, fields: BTreeSet<FieldName>, delay: Duration) {
        if fields.is_empty() {
            return;
        }

        let mut armed = Vec::with_capacity(fields.len());
        {
            let mut state = self.lock();
            for field in fields {
                state.next_generation += 1;
                let generation = state.next_generation;
                if state.armed.insert(field.clone(), generation).is_some() {
                    self.metrics.record_coalesced();
                }
                self.metrics.record_scheduled();
                armed.push((field, generation));
            }
        }

        let state = Arc::clone(&self.state);
        let batches = self.batches.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut due = BTreeSet::new();
            {
                let mut state = state.lock().expect("scheduler state poisoned");
                for (field, generation) in armed {
                    // Only fire if nothing re-armed this field meanwhile.
                    if state.armed.get(&field) == Some(&generation) {
                        state.armed.remove(&field);
                        due.insert(field);
                    }
                }
            }

            if !due.is_empty() && batches.send(SaveBatch { fields: due }).is_err() {
                tracing::debug!("save batch receiver dropped");
            }
        });
    }

    /// Disarms countdowns for the given fields and returns the ones that were
    /// pending. The caller persists them right away.
    pub fn flush_now(&self, fields: &BTreeSet<FieldName>) -> BTreeSet<FieldName> {
        self.disarm(fields)
    }

    /// Disarms countdowns without persisting anything.
    pub fn cancel(&self, fields: &BTreeSet<FieldName>) {
        let canceled = self.disarm(fields);
        if !canceled.is_empty() {
            tracing::debug!(count = canceled.len(), "canceled pending saves");
        }
    }

    /// Disarms every countdown. Returns how many were pending.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.lock();
        let count = state.armed.len();
        state.armed.clear();
        count
    }

    pub fn has_pending(&self, field: &FieldName) -> bool {
        self.lock().armed.contains_key(field)
    }

    pub fn pending_fields(&self) -> BTreeSet<FieldName> {
        self.lock().armed.keys().cloned().collect()
    }

    fn disarm(&self, fields: &BTreeSet<FieldName>) -> BTreeSet<FieldName> {
        let mut state = self.lock();
        let mut removed = BTreeSet::new();
        for field in fields {
            if state.armed.remove(field).is_some() {
                removed.insert(field.clone());
            }
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().expect("scheduler state poisoned")
    }
}
