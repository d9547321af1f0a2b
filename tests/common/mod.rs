use async_trait::async_trait;
use fieldsync::{
    FieldName, FieldSchema, FieldSpec, FieldValidator, FieldValue, InitializationState,
    MemoryRemotePersistence, NoopObserver, PrincipalId, RecordId, RecordObserver,
    RecordReconciler, RecordSnapshot, RemotePatch, RemotePersistence, RemoteRecord, SavePolicy,
    SyncConfig, SyncError,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::oneshot;

/// Debounce window used by every test engine. Long enough to observe a field
/// staying dirty before the window closes, short enough to keep the suite
/// fast.
pub const DEBOUNCE_MS: u64 = 40;

static INIT_TRACING: Once = Once::new();

#[allow(dead_code)]
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fieldsync=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .compact()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub fn field(name: &str) -> FieldName {
    FieldName::new(name.to_string()).expect("field name")
}

pub fn principal(id: &str) -> PrincipalId {
    PrincipalId::new(id.to_string()).expect("principal id")
}

/// The startup-profile shape this engine was distilled from: free-text
/// fields, a bounded percentage, and an upload URL that saves immediately.
pub fn profile_schema() -> Arc<FieldSchema> {
    Arc::new(
        FieldSchema::new(vec![
            FieldSpec::new(field("company_name"))
                .with_default(FieldValue::from(""))
                .with_validator(FieldValidator::MaxLength(120)),
            FieldSpec::new(field("pitch")).with_validator(FieldValidator::MaxLength(500)),
            FieldSpec::new(field("funding_stage")),
            FieldSpec::new(field("completion_pct"))
                .with_default(FieldValue::from(0.0))
                .with_validator(FieldValidator::NumberRange {
                    min: 0.0,
                    max: 100.0,
                }),
            FieldSpec::new(field("logo_url")).with_policy(SavePolicy::Immediate),
        ])
        .expect("profile schema"),
    )
}

pub fn quick_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.debounce.delay_ms = DEBOUNCE_MS;
    config.remote.timeout_ms = 2_000;
    config.tasks.capacity = 32;
    config
}

#[allow(dead_code)]
pub fn engine(remote: Arc<dyn RemotePersistence>) -> RecordReconciler {
    engine_with(remote, Arc::new(NoopObserver))
}

pub fn engine_with(
    remote: Arc<dyn RemotePersistence>,
    observer: Arc<dyn RecordObserver>,
) -> RecordReconciler {
    RecordReconciler::new(profile_schema(), remote, observer, quick_config())
}

#[allow(dead_code)]
pub async fn seeded_remote(
    owner: &PrincipalId,
    pairs: &[(&str, FieldValue)],
) -> (Arc<MemoryRemotePersistence>, RecordId) {
    let remote = Arc::new(MemoryRemotePersistence::new());
    let values: BTreeMap<String, FieldValue> = pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect();
    let record_id = remote.seed(owner, values).await;
    (remote, record_id)
}

/// Sleeps long enough for an armed debounce countdown to fire and the save
/// worker to drain it.
#[allow(dead_code)]
pub async fn past_debounce() {
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 3)).await;
}

/// Polls until every field is clean and no save is in flight, or the
/// deadline passes. Returns whether the record settled.
#[allow(dead_code)]
pub async fn settled(engine: &RecordReconciler, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = engine.snapshot().await;
        if snapshot.dirty_count() == 0 && !snapshot.is_saving {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Observer that keeps every snapshot it was handed, in order.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    snapshots: Mutex<Vec<RecordSnapshot>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshots(&self) -> Vec<RecordSnapshot> {
        self.snapshots.lock().expect("observer lock").clone()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().expect("observer lock").len()
    }

    /// `(state, is_saving, dirty_count)` per notification, the shape most
    /// assertions care about.
    pub fn transitions(&self) -> Vec<(InitializationState, bool, usize)> {
        self.snapshots()
            .iter()
            .map(|snapshot| (snapshot.state, snapshot.is_saving, snapshot.dirty_count()))
            .collect()
    }
}

impl RecordObserver for RecordingObserver {
    fn record_changed(&self, snapshot: &RecordSnapshot) {
        self.snapshots
            .lock()
            .expect("observer lock")
            .push(snapshot.clone());
    }
}

/// Remote whose save calls can be parked behind one-shot gates, giving a
/// test precise control over when an in-flight persist completes. Fetches
/// pass straight through to the backing store.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct GatedRemote {
    pub store: MemoryRemotePersistence,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

#[allow(dead_code)]
impl GatedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks the next save call until the returned sender fires (or is
    /// dropped). Gates apply to save calls in arrival order.
    pub fn hold_next_save(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates.lock().expect("gate lock").push_back(gate);
        release
    }

    async fn pass_gate(&self) {
        let gate = self.gates.lock().expect("gate lock").pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }
}

#[async_trait]
impl RemotePersistence for GatedRemote {
    async fn fetch_record(&self, owner: &PrincipalId) -> Result<Option<RemoteRecord>, SyncError> {
        self.store.fetch_record(owner).await
    }

    async fn insert_record(
        &self,
        owner: &PrincipalId,
        patch: &RemotePatch,
    ) -> Result<RecordId, SyncError> {
        self.pass_gate().await;
        self.store.insert_record(owner, patch).await
    }

    async fn update_record(
        &self,
        record_id: &RecordId,
        patch: &RemotePatch,
    ) -> Result<(), SyncError> {
        self.pass_gate().await;
        self.store.update_record(record_id, patch).await
    }
}
