use crate::application::ports::{RecordObserver, RemotePatch, RemotePersistence};
use crate::application::services::save_scheduler::{SaveBatch, SaveScheduler};
use crate::domain::entities::{
    EntityRecord, InitializationState, RecordSnapshot, SaveTask, SaveTrigger, TaskLog,
};
use crate::domain::schema::{FieldSchema, SavePolicy};
use crate::domain::value_objects::{FieldName, FieldValue, PrincipalId, RecordId};
use crate::shared::config::SyncConfig;
use crate::shared::error::{SaveErrorKind, SyncError};
use crate::shared::metrics::{EngineMetrics, MetricsSnapshot};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;

/// Keeps one record reconciled against its backend: edits mark fields dirty,
/// dirty fields are persisted after a debounce window (or inline for
/// immediate-policy fields and explicit saves), fetches hydrate the local
/// state, and a principal change tears everything down.
///
/// Must be created inside a Tokio runtime; construction spawns the worker
/// that drains due save batches.
pub struct RecordReconciler {
    inner: Arc<ReconcilerInner>,
    worker: JoinHandle<()>,
}

struct ReconcilerInner {
    schema: Arc<FieldSchema>,
    remote: Arc<dyn RemotePersistence>,
    observer: Arc<dyn RecordObserver>,
    config: SyncConfig,
    record: RwLock<EntityRecord>,
    scheduler: SaveScheduler,
    /// Serializes every persist. Guarantees at most one request in flight per
    /// record and exactly one insert for a record that does not exist yet.
    save_permit: Mutex<()>,
    /// Bumped on reset. Completions carrying an older epoch are discarded.
    epoch: AtomicU64,
    tasks: Mutex<TaskLog>,
    metrics: Arc<EngineMetrics>,
}

/// Everything captured under the record lock before a persist goes out.
struct PreparedSave {
    owner: PrincipalId,
    record_id: Option<RecordId>,
    patch: RemotePatch,
    sent: Vec<(FieldName, FieldValue)>,
    fields: BTreeSet<FieldName>,
    snapshot: RecordSnapshot,
}

impl RecordReconciler {
    pub fn new(
        schema: Arc<FieldSchema>,
        remote: Arc<dyn RemotePersistence>,
        observer: Arc<dyn RecordObserver>,
        config: SyncConfig,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let (scheduler, batches) = SaveScheduler::new(Arc::clone(&metrics));
        let inner = Arc::new(ReconcilerInner {
            record: RwLock::new(EntityRecord::new(Arc::clone(&schema))),
            schema,
            remote,
            observer,
            scheduler,
            save_permit: Mutex::new(()),
            epoch: AtomicU64::new(0),
            tasks: Mutex::new(TaskLog::new(config.tasks.capacity)),
            metrics,
            config,
        });
        let worker = Self::spawn_save_worker(Arc::clone(&inner), batches);
        Self { inner, worker }
    }

    fn spawn_save_worker(
        inner: Arc<ReconcilerInner>,
        mut batches: mpsc::UnboundedReceiver<SaveBatch>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                if let Err(e) = inner.run_save(batch.fields, SaveTrigger::Debounced).await {
                    // Failure is already recorded on the record itself; the
                    // next edit or an explicit save is the retry.
                    tracing::warn!(error = %e, "debounced save failed");
                }
            }
        })
    }

    /// Loads the record for `principal`. `None` tears the engine down
    /// instead. Connectivity failures surface as errors and leave the engine
    /// uninitialized so the caller can retry; any other fetch failure is
    /// absorbed as "nothing saved yet".
    pub async fn initialize(&self, principal: Option<PrincipalId>) -> Result<(), SyncError> {
        self.inner.initialize(principal).await
    }

    /// Applies one edit. Returns `Ok(false)` when the value matched the
    /// current one. For immediate-policy fields the persist runs inline and
    /// its failure is returned here, with the edit itself still applied.
    pub async fn set_field(&self, name: &FieldName, value: FieldValue) -> Result<bool, SyncError> {
        self.inner.set_field(name, value).await
    }

    /// Persists one field right away if it is dirty, canceling its countdown.
    pub async fn save_field(&self, name: &FieldName) -> Result<(), SyncError> {
        self.inner.save_field(name).await
    }

    /// Persists every dirty field right away.
    pub async fn save_all_dirty(&self) -> Result<(), SyncError> {
        self.inner.save_all_dirty().await
    }

    /// Cancels pending work and returns the engine to its initial state.
    /// A no-op on a pristine engine.
    pub async fn reset(&self) {
        self.inner.reset().await;
    }

    /// Sign-in, account switch or sign-out, as reported by the auth
    /// collaborator. `None` means signed out.
    pub async fn on_principal_changed(
        &self,
        principal: Option<PrincipalId>,
    ) -> Result<(), SyncError> {
        self.inner.on_principal_changed(principal).await
    }

    pub async fn snapshot(&self) -> RecordSnapshot {
        self.inner.record.read().await.snapshot()
    }

    /// Bounded history of persist attempts for the current session, oldest
    /// first. Cleared on reset along with the record itself.
    pub async fn save_tasks(&self) -> Vec<SaveTask> {
        self.inner.tasks.lock().await.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Forwards a `watch` stream of principal ids into
    /// [`Self::on_principal_changed`], starting with the current value.
    pub fn spawn_principal_watch(
        &self,
        mut principals: watch::Receiver<Option<PrincipalId>>,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let principal = principals.borrow_and_update().clone();
                if let Err(e) = inner.on_principal_changed(principal).await {
                    tracing::warn!(error = %e, "principal change handling failed");
                }
                if principals.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

impl Drop for RecordReconciler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

enum EditOutcome {
    Unchanged,
    Silent,
    Reverted,
    Dirty { has_owner: bool },
}

impl ReconcilerInner {
    async fn initialize(&self, principal: Option<PrincipalId>) -> Result<(), SyncError> {
        let Some(principal) = principal else {
            self.reset().await;
            return Ok(());
        };

        // A record held for someone else is torn down first.
        let owner_differs = {
            let record = self.record.read().await;
            matches!(record.owner(), Some(owner) if *owner != principal)
        };
        if owner_differs {
            self.reset().await;
        }

        // Claim the load, or bail if this principal is already active.
        let loading_snapshot = {
            let mut record = self.record.write().await;
            if record.owner() == Some(&principal)
                && matches!(
                    record.state(),
                    InitializationState::Loading | InitializationState::Ready
                )
            {
                return Ok(());
            }
            record.set_owner(Some(principal.clone()));
            record.set_state(InitializationState::Loading);
            record.set_last_error(None);
            record.snapshot()
        };
        self.observer.record_changed(&loading_snapshot);
        tracing::debug!(owner = %principal, "loading record");

        let epoch = self.epoch.load(Ordering::Acquire);
        let fetched = self
            .with_timeout(self.remote.fetch_record(&principal))
            .await;

        match fetched {
            Ok(remote_record) => {
                let ready_snapshot = {
                    let mut record = self.record.write().await;
                    if self.epoch.load(Ordering::Acquire) != epoch {
                        return Ok(());
                    }
                    if let Some(remote) = remote_record {
                        for spec in self.schema.fields() {
                            if let Some(value) = remote.values.get(spec.column()) {
                                record.store_mut().hydrate(spec.name(), value.clone());
                            }
                        }
                        record.set_record_id(Some(remote.record_id));
                    }
                    record.set_state(InitializationState::Ready);
                    record.snapshot()
                };
                self.metrics.loads.record_success();
                self.observer.record_changed(&ready_snapshot);
                tracing::info!(owner = %principal, "record ready");

                // Edits made before sign-in survived as dirty fields; put
                // them back on the clock now that persisting is possible.
                let leftover: BTreeSet<FieldName> = ready_snapshot
                    .fields
                    .iter()
                    .filter(|field| field.is_dirty)
                    .map(|field| field.name.clone())
                    .collect();
                if !leftover.is_empty() {
                    self.scheduler.schedule(leftover, self.debounce_delay());
                }
                Ok(())
            }
            Err(err) if err.is_connectivity() => {
                let snapshot = {
                    let mut record = self.record.write().await;
                    if self.epoch.load(Ordering::Acquire) != epoch {
                        return Ok(());
                    }
                    record.set_state(InitializationState::Uninitialized);
                    record.set_owner(None);
                    record.record_error(err.kind(), err.to_string());
                    record.snapshot()
                };
                self.metrics.loads.record_failure();
                self.observer.record_changed(&snapshot);
                tracing::warn!(error = %err, "record load failed");
                Err(err)
            }
            Err(err) => {
                // The backend answered but had nothing usable for us; treat
                // it as a record that does not exist yet.
                let snapshot = {
                    let mut record = self.record.write().await;
                    if self.epoch.load(Ordering::Acquire) != epoch {
                        return Ok(());
                    }
                    record.record_error(err.kind(), err.to_string());
                    record.set_state(InitializationState::Ready);
                    record.snapshot()
                };
                self.metrics.loads.record_failure();
                self.observer.record_changed(&snapshot);
                tracing::warn!(error = %err, "record load absorbed as empty");
                Ok(())
            }
        }
    }

    async fn set_field(&self, name: &FieldName, value: FieldValue) -> Result<bool, SyncError> {
        let spec = self
            .schema
            .get(name)
            .ok_or_else(|| SyncError::UnknownField(name.as_str().to_string()))?;
        spec.validate_value(&value)?;
        let policy = spec.policy();

        let (outcome, snapshot) = {
            let mut record = self.record.write().await;
            if record.state() == InitializationState::Loading {
                // A load is hydrating this record; apply the edit but do not
                // queue a save for it.
                let changed = record.store_mut().set_value_silent(name, value)?;
                if changed {
                    (EditOutcome::Silent, Some(record.snapshot()))
                } else {
                    (EditOutcome::Unchanged, None)
                }
            } else {
                let changed = record.store_mut().set_value(name, value)?;
                if !changed {
                    (EditOutcome::Unchanged, None)
                } else if record.store().is_dirty(name) {
                    (
                        EditOutcome::Dirty {
                            has_owner: record.owner().is_some(),
                        },
                        Some(record.snapshot()),
                    )
                } else {
                    (EditOutcome::Reverted, Some(record.snapshot()))
                }
            }
        };
        if let Some(snapshot) = &snapshot {
            self.observer.record_changed(snapshot);
        }

        match outcome {
            EditOutcome::Unchanged => Ok(false),
            EditOutcome::Silent => Ok(true),
            EditOutcome::Reverted => {
                // Back on the persisted value: nothing left to save.
                self.scheduler.cancel(&single(name));
                Ok(true)
            }
            EditOutcome::Dirty { has_owner } => {
                match policy {
                    SavePolicy::Immediate if has_owner => {
                        self.run_save(single(name), SaveTrigger::Immediate).await?;
                    }
                    SavePolicy::Debounced if has_owner => {
                        tracing::debug!(field = %name, "edit queued");
                        self.scheduler.schedule(single(name), self.debounce_delay());
                    }
                    _ => {
                        // No principal yet; the field stays dirty and gets
                        // scheduled once a load completes.
                        tracing::debug!(field = %name, "edit kept local; no principal");
                    }
                }
                Ok(true)
            }
        }
    }

    async fn save_field(&self, name: &FieldName) -> Result<(), SyncError> {
        if !self.schema.contains(name) {
            return Err(SyncError::UnknownField(name.as_str().to_string()));
        }
        let target = single(name);
        self.scheduler.flush_now(&target);
        self.run_save(target, SaveTrigger::Immediate).await
    }

    async fn save_all_dirty(&self) -> Result<(), SyncError> {
        let dirty: BTreeSet<FieldName> = {
            let record = self.record.read().await;
            record.store().dirty_fields().into_iter().collect()
        };
        if dirty.is_empty() {
            return Ok(());
        }
        self.scheduler.flush_now(&dirty);
        self.run_save(dirty, SaveTrigger::Immediate).await
    }

    async fn reset(&self) {
        let snapshots = {
            let mut record = self.record.write().await;
            if record.is_pristine() {
                None
            } else {
                record.set_state(InitializationState::Resetting);
                let resetting = record.snapshot();
                self.scheduler.cancel_all();
                // In-flight completions carrying the old epoch get discarded.
                self.epoch.fetch_add(1, Ordering::AcqRel);
                record.reset();
                Some((resetting, record.snapshot()))
            }
        };
        if let Some((resetting, done)) = snapshots {
            // The task log is per-session bookkeeping; the next principal
            // starts with no history.
            self.tasks.lock().await.clear();
            self.observer.record_changed(&resetting);
            self.observer.record_changed(&done);
            tracing::info!("record reset");
        }
    }

    async fn on_principal_changed(&self, principal: Option<PrincipalId>) -> Result<(), SyncError> {
        match &principal {
            Some(principal) => tracing::debug!(principal = %principal, "principal changed"),
            None => tracing::debug!("principal cleared"),
        }
        self.initialize(principal).await
    }

    async fn run_save(
        &self,
        requested: BTreeSet<FieldName>,
        trigger: SaveTrigger,
    ) -> Result<(), SyncError> {
        if requested.is_empty() {
            return Ok(());
        }

        // One persist at a time; whoever queues up behind an in-flight save
        // runs after it completes and re-reads the store.
        let permit = self.save_permit.lock().await;
        let epoch = self.epoch.load(Ordering::Acquire);

        let Some(prepared) = self.prepare_save(&requested).await else {
            return Ok(());
        };

        // A follow-up opened at commit time already sits in the log as a
        // pending task; pick it up rather than recording the attempt twice.
        let task_id = {
            let mut log = self.tasks.lock().await;
            match log.adoptable(&prepared.fields) {
                Some(id) => {
                    log.update(id, |task| task.mark_in_flight());
                    id
                }
                None => {
                    let mut task = SaveTask::new(prepared.fields.clone(), trigger);
                    task.mark_in_flight();
                    let id = task.id;
                    let overtaken = log.supersede_open(&task.target_fields, id);
                    for _ in 0..overtaken {
                        self.metrics.record_superseded();
                    }
                    log.push(task);
                    id
                }
            }
        };
        self.observer.record_changed(&prepared.snapshot);
        tracing::debug!(
            fields = prepared.fields.len(),
            trigger = trigger.as_str(),
            "saving"
        );

        let result = match &prepared.record_id {
            Some(record_id) => self
                .with_timeout(self.remote.update_record(record_id, &prepared.patch))
                .await
                .map(|_| None),
            None => self
                .with_timeout(self.remote.insert_record(&prepared.owner, &prepared.patch))
                .await
                .map(Some),
        };

        match result {
            Ok(assigned_id) => {
                let Some((snapshot, followup)) =
                    self.commit_save(epoch, assigned_id, &prepared).await
                else {
                    // Record was torn down while the request was in flight.
                    self.abandon_task(task_id).await;
                    return Ok(());
                };
                {
                    let mut log = self.tasks.lock().await;
                    log.update(task_id, |task| task.mark_committed());
                    if !followup.is_empty() {
                        // Values moved on mid-flight: the save landed but did
                        // not clean those fields. Open their follow-up now and
                        // link the overtaken task to it.
                        let follow = SaveTask::new(followup.clone(), SaveTrigger::Debounced);
                        let follow_id = follow.id;
                        log.update(task_id, |task| task.superseded_by = Some(follow_id));
                        log.push(follow);
                        self.metrics.record_superseded();
                    }
                }
                self.metrics.saves.record_success();
                self.observer.record_changed(&snapshot);
                if !followup.is_empty() {
                    self.scheduler.schedule(followup, self.debounce_delay());
                }
                tracing::debug!(task = %task_id, "save committed");
                Ok(())
            }
            Err(err) => {
                let kind = err.kind();
                let Some(snapshot) = self.record_save_failure(epoch, kind, &err, &prepared).await
                else {
                    self.abandon_task(task_id).await;
                    return Ok(());
                };
                self.tasks
                    .lock()
                    .await
                    .update(task_id, |task| task.mark_failed(kind));
                self.metrics.saves.record_failure();
                self.observer.record_changed(&snapshot);
                tracing::warn!(error = %err, "save failed");

                if matches!(err, SyncError::Auth(_)) {
                    // The session is gone; treat it like a sign-out.
                    drop(permit);
                    self.reset().await;
                }
                Err(err)
            }
        }
    }

    /// Re-reads the store under the lock: only fields still dirty are sent,
    /// and the values captured here are the ones confirmation is checked
    /// against. Returns `None` when there is nothing to persist.
    async fn prepare_save(&self, requested: &BTreeSet<FieldName>) -> Option<PreparedSave> {
        let mut record = self.record.write().await;
        if record.state() != InitializationState::Ready {
            tracing::debug!(state = record.state().as_str(), "save skipped");
            return None;
        }
        let owner = record.owner().cloned()?;

        let mut fields = BTreeSet::new();
        for field in requested {
            if record.store().is_dirty(field) {
                fields.insert(field.clone());
            }
        }
        if fields.is_empty() {
            return None;
        }

        let mut patch = RemotePatch::new();
        let mut sent = Vec::with_capacity(fields.len());
        for field in &fields {
            let Some(spec) = self.schema.get(field) else {
                continue;
            };
            let Some(value) = record.store().current(field) else {
                continue;
            };
            patch.insert(spec.column(), value.clone());
            sent.push((field.clone(), value.clone()));
        }

        record.begin_saving(&fields);
        Some(PreparedSave {
            owner,
            record_id: record.record_id().cloned(),
            patch,
            sent,
            fields,
            snapshot: record.snapshot(),
        })
    }

    /// Applies a successful completion. Returns `None` when the record was
    /// reset while the request was in flight; nothing may be resurrected in
    /// that case. Otherwise returns the post-commit snapshot and the fields
    /// that moved on mid-flight and need another save.
    async fn commit_save(
        &self,
        epoch: u64,
        assigned_id: Option<RecordId>,
        prepared: &PreparedSave,
    ) -> Option<(RecordSnapshot, BTreeSet<FieldName>)> {
        let mut record = self.record.write().await;
        if self.epoch.load(Ordering::Acquire) != epoch {
            return None;
        }
        if let Some(record_id) = assigned_id {
            record.set_record_id(Some(record_id));
        }
        let mut followup = BTreeSet::new();
        for (field, value) in &prepared.sent {
            if !record.store_mut().mark_clean(field, value) {
                followup.insert(field.clone());
            }
        }
        record.end_saving(&prepared.fields);
        record.set_last_error(None);
        Some((record.snapshot(), followup))
    }

    /// Applies a failed completion: fields stay dirty, the error lands on
    /// each sent field and on the record. Returns `None` when the record was
    /// reset mid-flight.
    async fn record_save_failure(
        &self,
        epoch: u64,
        kind: SaveErrorKind,
        err: &SyncError,
        prepared: &PreparedSave,
    ) -> Option<RecordSnapshot> {
        let mut record = self.record.write().await;
        if self.epoch.load(Ordering::Acquire) != epoch {
            return None;
        }
        for (field, _) in &prepared.sent {
            record.store_mut().mark_error(field, kind);
        }
        record.end_saving(&prepared.fields);
        record.record_error(kind, err.to_string());
        Some(record.snapshot())
    }

    async fn abandon_task(&self, task_id: crate::domain::entities::SaveTaskId) {
        self.tasks
            .lock()
            .await
            .update(task_id, |task| task.mark_failed(SaveErrorKind::Internal));
        tracing::debug!(task = %task_id, "save discarded; record torn down mid-flight");
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        let timeout_ms = self.config.remote.timeout_ms;
        if timeout_ms == 0 {
            return operation.await;
        }
        match tokio::time::timeout(Duration::from_millis(timeout_ms), operation).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout_ms)),
        }
    }

    fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.config.debounce.delay_ms)
    }
}

fn single(name: &FieldName) -> BTreeSet<FieldName> {
    BTreeSet::from([name.clone()])
}
