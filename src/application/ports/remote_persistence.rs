use crate::domain::value_objects::{FieldValue, PrincipalId, RecordId};
use crate::shared::error::SyncError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column-keyed values for one insert or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePatch {
    pub values: BTreeMap<String, FieldValue>,
}

impl RemotePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A record as the backend returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub record_id: RecordId,
    pub values: BTreeMap<String, FieldValue>,
}

/// Backend boundary for one record type. Implementations map these calls to
/// whatever store actually holds the data; the engine only assumes the three
/// operations below and the error taxonomy they fail with.
#[async_trait]
pub trait RemotePersistence: Send + Sync {
    /// Looks up the record owned by `owner`. `Ok(None)` means nothing has
    /// been saved for this principal yet.
    async fn fetch_record(&self, owner: &PrincipalId) -> Result<Option<RemoteRecord>, SyncError>;

    /// Creates the record on first save and returns its backend identity.
    async fn insert_record(
        &self,
        owner: &PrincipalId,
        patch: &RemotePatch,
    ) -> Result<RecordId, SyncError>;

    /// Applies a partial update to an existing record.
    async fn update_record(&self, record_id: &RecordId, patch: &RemotePatch)
        -> Result<(), SyncError>;
}
