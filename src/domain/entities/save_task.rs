use crate::domain::value_objects::FieldName;
use crate::shared::error::SaveErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaveTaskId(uuid::Uuid);

impl SaveTaskId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SaveTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTaskStatus {
    Pending,
    InFlight,
    Committed,
    Failed,
}

impl SaveTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveTaskStatus::Pending => "pending",
            SaveTaskStatus::InFlight => "in_flight",
            SaveTaskStatus::Committed => "committed",
            SaveTaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTrigger {
    Debounced,
    Immediate,
}

impl SaveTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveTrigger::Debounced => "debounced",
            SaveTrigger::Immediate => "immediate",
        }
    }
}

/// One persist attempt. A task never changes its payload once created; an
/// edit that lands mid-flight produces a follow-up task for the moved-on
/// fields and links the overtaken one to it via `superseded_by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveTask {
    pub id: SaveTaskId,
    pub target_fields: BTreeSet<FieldName>,
    pub trigger: SaveTrigger,
    pub status: SaveTaskStatus,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub superseded_by: Option<SaveTaskId>,
    pub error: Option<SaveErrorKind>,
}

impl SaveTask {
    pub fn new(target_fields: BTreeSet<FieldName>, trigger: SaveTrigger) -> Self {
        Self {
            id: SaveTaskId::generate(),
            target_fields,
            trigger,
            status: SaveTaskStatus::Pending,
            scheduled_at: Utc::now(),
            completed_at: None,
            superseded_by: None,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            SaveTaskStatus::Pending | SaveTaskStatus::InFlight
        )
    }

    pub fn targets_any(&self, fields: &BTreeSet<FieldName>) -> bool {
        !self.target_fields.is_disjoint(fields)
    }

    pub fn mark_in_flight(&mut self) {
        self.status = SaveTaskStatus::InFlight;
    }

    pub fn mark_committed(&mut self) {
        self.status = SaveTaskStatus::Committed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, kind: SaveErrorKind) {
        self.status = SaveTaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(kind);
    }
}

/// Bounded history of save tasks, oldest first.
#[derive(Debug)]
pub struct TaskLog {
    entries: VecDeque<SaveTask>,
    capacity: usize,
}

impl TaskLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, task: SaveTask) {
        self.entries.push_back(task);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn update<F>(&mut self, id: SaveTaskId, apply: F) -> bool
    where
        F: FnOnce(&mut SaveTask),
    {
        match self.entries.iter_mut().rev().find(|task| task.id == id) {
            Some(task) => {
                apply(task);
                true
            }
            None => false,
        }
    }

    /// Links every open task overlapping `fields` to the task that overtakes
    /// them. Returns how many were linked.
    pub fn supersede_open(&mut self, fields: &BTreeSet<FieldName>, by: SaveTaskId) -> usize {
        let mut linked = 0;
        for task in self.entries.iter_mut() {
            if task.id != by && task.is_open() && task.targets_any(fields) {
                task.superseded_by = Some(by);
                linked += 1;
            }
        }
        linked
    }

    /// The pending task opened for exactly `fields`, if one is still waiting
    /// to run. Used to pick up a scheduled follow-up instead of opening a
    /// duplicate entry.
    pub fn adoptable(&self, fields: &BTreeSet<FieldName>) -> Option<SaveTaskId> {
        self.entries
            .iter()
            .rev()
            .find(|task| {
                task.status == SaveTaskStatus::Pending
                    && task.superseded_by.is_none()
                    && task.target_fields == *fields
            })
            .map(|task| task.id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<SaveTask> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
