pub mod entities;
pub mod schema;
pub mod value_objects;

pub use entities::{EntityRecord, FieldSnapshot, FieldStore, InitializationState, RecordSnapshot};
pub use schema::{FieldSchema, FieldSpec, FieldValidator, SavePolicy};
pub use value_objects::{FieldName, FieldValue, PrincipalId, RecordId};
