use crate::domain::schema::FieldSchema;
use crate::domain::value_objects::{FieldName, FieldValue};
use crate::shared::error::{SaveErrorKind, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable view of one field's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub name: FieldName,
    pub current_value: FieldValue,
    pub last_persisted: Option<FieldValue>,
    pub is_dirty: bool,
    pub last_error: Option<SaveErrorKind>,
}

#[derive(Debug, Clone)]
struct FieldState {
    current: FieldValue,
    persisted: Option<FieldValue>,
    dirty: bool,
    error: Option<SaveErrorKind>,
}

impl FieldState {
    fn new(default: FieldValue) -> Self {
        Self {
            current: default,
            persisted: None,
            dirty: false,
            error: None,
        }
    }
}

/// Holds every registered field's current value, its last value confirmed by
/// the backend, and the dirty flag connecting the two.
///
/// A field starts clean on its schema default with no persisted baseline.
/// It turns dirty on the first real change and turns clean again either when
/// a save confirms the exact value it sent, or when an edit returns it to the
/// persisted baseline.
#[derive(Debug)]
pub struct FieldStore {
    schema: Arc<FieldSchema>,
    states: HashMap<FieldName, FieldState>,
}

impl FieldStore {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        let states = schema
            .fields()
            .iter()
            .map(|spec| {
                (
                    spec.name().clone(),
                    FieldState::new(spec.default_value().clone()),
                )
            })
            .collect();
        Self { schema, states }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Applies an edit. Returns `Ok(false)` when the value is identical to
    /// the current one; the store is untouched in that case.
    pub fn set_value(&mut self, name: &FieldName, value: FieldValue) -> Result<bool, SyncError> {
        let state = self.state_mut(name)?;
        if state.current == value {
            return Ok(false);
        }
        state.current = value;
        state.dirty = match &state.persisted {
            Some(persisted) => *persisted != state.current,
            None => true,
        };
        Ok(true)
    }

    /// Applies an edit without touching the dirty flag. Used while a load is
    /// in flight, when edits must not queue saves.
    pub fn set_value_silent(
        &mut self,
        name: &FieldName,
        value: FieldValue,
    ) -> Result<bool, SyncError> {
        let state = self.state_mut(name)?;
        if state.current == value {
            return Ok(false);
        }
        state.current = value;
        Ok(true)
    }

    /// Installs a fetched value as both the current value and the persisted
    /// baseline. Unknown names are ignored; the load path only feeds names
    /// taken from the schema.
    pub fn hydrate(&mut self, name: &FieldName, value: FieldValue) {
        if let Some(state) = self.states.get_mut(name) {
            state.current = value.clone();
            state.persisted = Some(value);
            state.dirty = false;
            state.error = None;
        }
    }

    /// Confirms a save. The field only turns clean when the confirmed value
    /// still matches the current one; a newer edit keeps it dirty so the
    /// caller schedules a follow-up. Returns whether the field is now clean.
    pub fn mark_clean(&mut self, name: &FieldName, confirmed: &FieldValue) -> bool {
        let Some(state) = self.states.get_mut(name) else {
            return false;
        };
        state.persisted = Some(confirmed.clone());
        state.error = None;
        if state.current == *confirmed {
            state.dirty = false;
            true
        } else {
            state.dirty = true;
            false
        }
    }

    pub fn mark_error(&mut self, name: &FieldName, kind: SaveErrorKind) {
        if let Some(state) = self.states.get_mut(name) {
            state.error = Some(kind);
        }
    }

    pub fn is_dirty(&self, name: &FieldName) -> bool {
        self.states.get(name).map(|s| s.dirty).unwrap_or(false)
    }

    pub fn any_dirty(&self) -> bool {
        self.states.values().any(|s| s.dirty)
    }

    /// Dirty fields in schema order.
    pub fn dirty_fields(&self) -> Vec<FieldName> {
        self.schema
            .fields()
            .iter()
            .filter(|spec| self.is_dirty(spec.name()))
            .map(|spec| spec.name().clone())
            .collect()
    }

    pub fn current(&self, name: &FieldName) -> Option<&FieldValue> {
        self.states.get(name).map(|s| &s.current)
    }

    /// Per-field snapshots in schema order.
    pub fn snapshot_fields(&self) -> Vec<FieldSnapshot> {
        self.schema
            .fields()
            .iter()
            .filter_map(|spec| {
                self.states.get(spec.name()).map(|state| FieldSnapshot {
                    name: spec.name().clone(),
                    current_value: state.current.clone(),
                    last_persisted: state.persisted.clone(),
                    is_dirty: state.dirty,
                    last_error: state.error,
                })
            })
            .collect()
    }

    /// Returns every field to its schema default with no persisted baseline,
    /// no dirty flag and no recorded error.
    pub fn reset(&mut self) {
        for spec in self.schema.fields() {
            if let Some(state) = self.states.get_mut(spec.name()) {
                *state = FieldState::new(spec.default_value().clone());
            }
        }
    }

    fn state_mut(&mut self, name: &FieldName) -> Result<&mut FieldState, SyncError> {
        self.states
            .get_mut(name)
            .ok_or_else(|| SyncError::UnknownField(name.as_str().to_string()))
    }
}
