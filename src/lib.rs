//! Debounced dirty-field reconciliation for remote-persisted records.
//!
//! One [`RecordReconciler`] keeps a single record, the per-principal
//! aggregate of named fields declared in a [`FieldSchema`], in sync with a
//! backend reached through an injected [`RemotePersistence`] port. Edits mark
//! fields dirty and arm a per-field debounce; when the quiet period closes,
//! the dirty values are persisted as one patch and confirmed back into the
//! store. A record that has never been saved is inserted lazily on its first
//! persist. Loading, saving, stale-completion handling and reset-on-sign-out
//! are driven by an explicit lifecycle state, and every transition is pushed
//! to a [`RecordObserver`].
//!
//! The crate is a library only: no wire format, no CLI, and no opinion about
//! what the backend is. [`MemoryRemotePersistence`] is the in-memory
//! reference adapter, and [`BroadcastObserver`] bridges snapshots onto a
//! tokio broadcast channel for UI-style consumers.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    NoopObserver, RecordObserver, RemotePatch, RemotePersistence, RemoteRecord,
};
pub use application::services::{RecordReconciler, SaveBatch, SaveScheduler};
pub use domain::entities::{
    EntityRecord, FieldSnapshot, FieldStore, InitializationState, LastError, RecordSnapshot,
    SaveTask, SaveTaskId, SaveTaskStatus, SaveTrigger,
};
pub use domain::schema::{FieldSchema, FieldSpec, FieldValidator, SavePolicy};
pub use domain::value_objects::{FieldName, FieldValue, PrincipalId, RecordId};
pub use infrastructure::{BroadcastObserver, MemoryRemotePersistence};
pub use shared::config::SyncConfig;
pub use shared::error::{Result, SaveErrorKind, SyncError};
pub use shared::metrics::MetricsSnapshot;
