use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::error::SinkResult;
use crate::types::{CanonicalKey, TableName, TableRow, TableSchema};

/// Current rows of a table, keyed by canonical key.
pub type TableState = HashMap<CanonicalKey, TableRow>;

/// Trait for key-addressable table stores the sink writes to.
///
/// The sink serializes commits to the same table, so implementations only need to guard against
/// concurrent commits to different tables. [`TableStore::commit_changes`] must be atomic: either
/// all upserts and deletes of the call become visible or none of them do.
///
/// Errors should use the destination kinds of [`crate::error::ErrorKind`]: transient failures
/// reported as [`crate::error::ErrorKind::DestinationConnectionFailed`],
/// [`crate::error::ErrorKind::DestinationIoError`] or
/// [`crate::error::ErrorKind::DestinationThrottled`] are retried by the committer.
pub trait TableStore {
    /// Returns the name of the store.
    fn name() -> &'static str;

    /// Returns the schema of a table, or [`None`] if the table does not exist.
    fn table_schema(
        &self,
        table_name: &TableName,
    ) -> impl Future<Output = SinkResult<Option<TableSchema>>> + Send;

    /// Returns the keys of the rows currently stored in a table.
    fn read_current_keys(
        &self,
        table_name: &TableName,
    ) -> impl Future<Output = SinkResult<HashSet<CanonicalKey>>> + Send;

    /// Atomically applies `schema`, then replaces or inserts every row of `upserts` and removes
    /// every key of `deletes`.
    ///
    /// When `schema` is given the table is created, or altered to match it, as part of the same
    /// commit: a failed call leaves both the schema and the rows of the table untouched. The sink
    /// only passes schemas it validated as a compatible evolution of the current one. Without a
    /// schema the table must exist. Deleting a key that is not stored is a no-op.
    fn commit_changes(
        &self,
        table_name: &TableName,
        schema: Option<&TableSchema>,
        upserts: &HashMap<CanonicalKey, TableRow>,
        deletes: &HashSet<CanonicalKey>,
    ) -> impl Future<Output = SinkResult<()>> + Send;
}
