//! Domain layer: record schemas, attribute values and record instances.

pub mod attributes;
pub mod error;
pub mod record;
pub mod schema;
pub mod types;

pub use attributes::Attributes;
pub use error::DomainError;
pub use record::Record;
pub use schema::{Column, KEY_SEPARATORS, RecordType, contains_key_separator, normalize_column};
pub use types::{ColumnType, Value};
