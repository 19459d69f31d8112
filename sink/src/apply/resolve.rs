//! Partition of deduplicated winners into the rows to upsert and the keys to delete.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::apply::dedup::Deduplicated;
use crate::types::{CanonicalKey, TableName, TableRow, TableSchema};

/// Counters describing how a sub-batch was resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Events in the sub-batch.
    pub events: usize,
    /// Distinct canonical keys.
    pub keys: usize,
    pub upserts: usize,
    pub deletes: usize,
    /// Winners whose deletion flag disagreed with their operation code.
    pub flag_mismatches: usize,
}

/// The rows to write and the keys to remove for one table.
///
/// A key is either in `upserts` or in `deletes`, never both.
#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    pub table_name: TableName,
    pub upserts: HashMap<CanonicalKey, TableRow>,
    pub deletes: HashSet<CanonicalKey>,
    /// Distinct schemas of the upserted rows, in arrival order of their first winner.
    pub schemas: Vec<Arc<TableSchema>>,
    pub stats: ResolutionStats,
}

impl ResolvedBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Partitions the winners of a sub-batch into upserts and deletes.
///
/// Delete winners become removals, unless `keep_deletes` is set in which case their last image
/// is upserted so the table keeps the row with its deletion flag.
pub fn resolve(
    table_name: TableName,
    deduplicated: Deduplicated,
    keep_deletes: bool,
) -> ResolvedBatch {
    let mut stats = ResolutionStats {
        events: deduplicated.events(),
        keys: deduplicated.len(),
        ..ResolutionStats::default()
    };

    let mut upserts = HashMap::with_capacity(deduplicated.len());
    let mut deletes = HashSet::new();
    let mut schemas: Vec<Arc<TableSchema>> = Vec::new();

    for winner in deduplicated.into_winners() {
        if winner.has_flag_mismatch() {
            stats.flag_mismatches += 1;
            warn!(
                table = %table_name,
                key = %winner.key,
                operation = %winner.operation,
                deleted = winner.deleted,
                "deletion flag disagrees with the operation code, using the operation code"
            );
        }

        if winner.operation.is_delete() && !keep_deletes {
            deletes.insert(winner.key);
            continue;
        }

        if !schemas.iter().any(|schema| **schema == *winner.schema) {
            schemas.push(winner.schema.clone());
        }
        upserts.insert(winner.key, winner.row);
    }

    stats.upserts = upserts.len();
    stats.deletes = deletes.len();

    debug!(
        table = %table_name,
        events = stats.events,
        keys = stats.keys,
        upserts = stats.upserts,
        deletes = stats.deletes,
        "resolved sub-batch"
    );

    ResolvedBatch {
        table_name,
        upserts,
        deletes,
        schemas,
        stats,
    }
}
