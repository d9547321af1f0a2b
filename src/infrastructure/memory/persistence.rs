use crate::application::ports::{RemotePatch, RemotePersistence, RemoteRecord};
use crate::domain::value_objects::{FieldValue, PrincipalId, RecordId};
use crate::shared::error::SyncError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRecord {
    record_id: RecordId,
    values: BTreeMap<String, FieldValue>,
}

/// In-memory [`RemotePersistence`]: one record per owner, uniqueness enforced
/// on insert. The reference adapter, and the workhorse of the integration
/// suite. Latency and failures are injectable, and every call is counted so
/// tests can assert how often the engine actually reached the backend.
#[derive(Debug, Default)]
pub struct MemoryRemotePersistence {
    records: RwLock<HashMap<String, StoredRecord>>,
    latency_ms: AtomicU64,
    scripted_failures: Mutex<VecDeque<SyncError>>,
    fetch_calls: AtomicU64,
    insert_calls: AtomicU64,
    update_calls: AtomicU64,
}

impl MemoryRemotePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every call before it touches the store.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Queues a failure; calls consume the queue in order, then succeed
    /// again.
    pub fn fail_next(&self, error: SyncError) {
        self.scripted_failures
            .lock()
            .expect("failure queue poisoned")
            .push_back(error);
    }

    /// Installs a record for `owner` as if a previous session had saved it.
    pub async fn seed(
        &self,
        owner: &PrincipalId,
        values: BTreeMap<String, FieldValue>,
    ) -> RecordId {
        let record_id = RecordId::generate();
        self.records.write().await.insert(
            owner.as_str().to_string(),
            StoredRecord {
                record_id: record_id.clone(),
                values,
            },
        );
        record_id
    }

    /// What the backend currently holds for `owner`.
    pub async fn stored(&self, owner: &PrincipalId) -> Option<RemoteRecord> {
        self.records
            .read()
            .await
            .get(owner.as_str())
            .map(|record| RemoteRecord {
                record_id: record.record_id.clone(),
                values: record.values.clone(),
            })
    }

    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::Relaxed)
    }

    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::Relaxed)
    }

    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::Relaxed)
    }

    pub fn save_calls(&self) -> u64 {
        self.insert_calls() + self.update_calls()
    }

    async fn simulate(&self) -> Result<(), SyncError> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let scripted = self
            .scripted_failures
            .lock()
            .expect("failure queue poisoned")
            .pop_front();
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemotePersistence for MemoryRemotePersistence {
    async fn fetch_record(&self, owner: &PrincipalId) -> Result<Option<RemoteRecord>, SyncError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate().await?;
        Ok(self.stored(owner).await)
    }

    async fn insert_record(
        &self,
        owner: &PrincipalId,
        patch: &RemotePatch,
    ) -> Result<RecordId, SyncError> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate().await?;

        let mut records = self.records.write().await;
        if records.contains_key(owner.as_str()) {
            return Err(SyncError::Constraint(format!(
                "record already exists for owner {owner}"
            )));
        }
        let record_id = RecordId::generate();
        records.insert(
            owner.as_str().to_string(),
            StoredRecord {
                record_id: record_id.clone(),
                values: patch.values.clone(),
            },
        );
        tracing::debug!(owner = %owner, record = %record_id, "record inserted");
        Ok(record_id)
    }

    async fn update_record(
        &self,
        record_id: &RecordId,
        patch: &RemotePatch,
    ) -> Result<(), SyncError> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate().await?;

        let mut records = self.records.write().await;
        let Some(record) = records
            .values_mut()
            .find(|record| record.record_id == *record_id)
        else {
            return Err(SyncError::Constraint(format!(
                "no record with id {record_id}"
            )));
        };
        for (column, value) in &patch.values {
            record.values.insert(column.clone(), value.clone());
        }
        Ok(())
    }
}
