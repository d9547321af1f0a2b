pub mod entity_record;
pub mod field_store;
pub mod save_task;

pub use entity_record::{EntityRecord, InitializationState, LastError, RecordSnapshot};
pub use field_store::{FieldSnapshot, FieldStore};
pub use save_task::{SaveTask, SaveTaskId, SaveTaskStatus, SaveTrigger, TaskLog};
