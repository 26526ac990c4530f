pub mod honorific;
pub mod record;
pub mod schema;
pub mod table;

pub use honorific::Honorifics;
pub use record::{Record, RecordBuilder};
pub use schema::{FieldKind, FieldSchema, FieldSpec, FieldValue};
pub use table::{Row, SchemaMismatch, TabularUnit};
