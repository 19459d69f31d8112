//! Row, key, schema and event types shared across the sink.

mod cell;
mod event;
mod key;
mod schema;
mod table_row;

pub use cell::Cell;
pub use event::{ChangeEvent, DecodedEvent, Operation};
pub use key::{CanonicalKey, extract_key};
pub use schema::{ColumnSchema, ColumnType, SchemaChange, TableName, TableSchema};
pub use table_row::TableRow;
