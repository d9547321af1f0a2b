use crate::domain::entities::field_store::{FieldSnapshot, FieldStore};
use crate::domain::schema::FieldSchema;
use crate::domain::value_objects::{FieldName, PrincipalId, RecordId};
use crate::shared::error::SaveErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationState {
    Uninitialized,
    Loading,
    Ready,
    Resetting,
}

impl InitializationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitializationState::Uninitialized => "uninitialized",
            InitializationState::Loading => "loading",
            InitializationState::Ready => "ready",
            InitializationState::Resetting => "resetting",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "uninitialized" => Some(InitializationState::Uninitialized),
            "loading" => Some(InitializationState::Loading),
            "ready" => Some(InitializationState::Ready),
            "resetting" => Some(InitializationState::Resetting),
            _ => None,
        }
    }
}

/// Most recent engine-level failure, kept until the next successful save or
/// load, or until reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: SaveErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Immutable view of the whole record, handed to observers on every
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub owner: Option<PrincipalId>,
    pub record_id: Option<RecordId>,
    pub state: InitializationState,
    pub is_saving: bool,
    pub fields: Vec<FieldSnapshot>,
    pub last_error: Option<LastError>,
}

impl RecordSnapshot {
    pub fn field(&self, name: &FieldName) -> Option<&FieldSnapshot> {
        self.fields.iter().find(|f| f.name == *name)
    }

    pub fn dirty_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_dirty).count()
    }
}

/// The per-principal aggregate: who owns it, whether it exists remotely yet,
/// where it is in its lifecycle, and the fields it carries.
#[derive(Debug)]
pub struct EntityRecord {
    owner: Option<PrincipalId>,
    record_id: Option<RecordId>,
    state: InitializationState,
    store: FieldStore,
    saving: BTreeSet<FieldName>,
    last_error: Option<LastError>,
}

impl EntityRecord {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            owner: None,
            record_id: None,
            state: InitializationState::Uninitialized,
            store: FieldStore::new(schema),
            saving: BTreeSet::new(),
            last_error: None,
        }
    }

    pub fn state(&self) -> InitializationState {
        self.state
    }

    pub fn set_state(&mut self, state: InitializationState) {
        self.state = state;
    }

    pub fn owner(&self) -> Option<&PrincipalId> {
        self.owner.as_ref()
    }

    pub fn set_owner(&mut self, owner: Option<PrincipalId>) {
        self.owner = owner;
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FieldStore {
        &mut self.store
    }

    pub fn begin_saving(&mut self, fields: &BTreeSet<FieldName>) {
        self.saving.extend(fields.iter().cloned());
    }

    pub fn end_saving(&mut self, fields: &BTreeSet<FieldName>) {
        for field in fields {
            self.saving.remove(field);
        }
    }

    pub fn is_saving(&self) -> bool {
        !self.saving.is_empty()
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub fn set_last_error(&mut self, error: Option<LastError>) {
        self.last_error = error;
    }

    pub fn record_error(&mut self, kind: SaveErrorKind, message: String) {
        self.last_error = Some(LastError {
            kind,
            message,
            occurred_at: Utc::now(),
        });
    }

    /// True when a reset would change nothing worth announcing.
    pub fn is_pristine(&self) -> bool {
        self.owner.is_none()
            && self.record_id.is_none()
            && self.state == InitializationState::Uninitialized
            && self.saving.is_empty()
            && self.last_error.is_none()
            && !self.store.any_dirty()
    }

    /// Tears the record down to its initial shape: defaults everywhere, no
    /// owner, no remote identity, no errors.
    pub fn reset(&mut self) {
        self.store.reset();
        self.owner = None;
        self.record_id = None;
        self.saving.clear();
        self.last_error = None;
        self.state = InitializationState::Uninitialized;
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            owner: self.owner.clone(),
            record_id: self.record_id.clone(),
            state: self.state,
            is_saving: self.is_saving(),
            fields: self.store.snapshot_fields(),
            last_error: self.last_error.clone(),
        }
    }
}
