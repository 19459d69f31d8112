//! Per-table application of a sub-batch: deduplication, resolution and commit.

pub mod commit;
pub mod dedup;
pub mod resolve;
mod retry;
