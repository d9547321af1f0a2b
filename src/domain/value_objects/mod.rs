pub mod field_name;
pub mod field_value;
pub mod principal_id;
pub mod record_id;

pub use field_name::FieldName;
pub use field_value::FieldValue;
pub use principal_id::PrincipalId;
pub use record_id::RecordId;
