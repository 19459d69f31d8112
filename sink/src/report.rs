use crate::apply::commit::CommitSummary;
use crate::apply::resolve::ResolutionStats;
use crate::error::{SinkError, SinkResult};
use crate::types::TableName;

/// What happened to an event rejected by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedEventAction {
    /// The event was skipped and the rest of the batch was applied.
    Dropped,
    /// The whole batch was left uncommitted because of this event.
    FailedBatch,
}

/// An event of the batch that could not be decoded.
#[derive(Debug, Clone)]
pub struct RejectedEvent {
    pub position: usize,
    pub destination: String,
    pub error: SinkError,
    pub action: RejectedEventAction,
}

/// Result of applying the sub-batch of one table.
#[derive(Debug, Clone)]
pub struct TableCommitOutcome {
    pub table_name: TableName,
    pub stats: ResolutionStats,
    pub result: SinkResult<CommitSummary>,
}

impl TableCommitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&SinkError> {
        self.result.as_ref().err()
    }
}

/// Outcome of one [`crate::sink::Sink::handle_batch`] call.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Number of raw events in the batch.
    pub events: usize,
    /// One outcome per destination table, ordered by table name.
    pub tables: Vec<TableCommitOutcome>,
    pub rejected: Vec<RejectedEvent>,
    /// `true` if every table committed and no event failed the batch.
    pub fully_acknowledged: bool,
}

impl BatchReport {
    /// Returns the outcome of a table.
    pub fn table(&self, table_name: &TableName) -> Option<&TableCommitOutcome> {
        self.tables
            .iter()
            .find(|outcome| &outcome.table_name == table_name)
    }

    /// Returns the outcomes of the tables whose commit failed.
    pub fn failed_tables(&self) -> impl Iterator<Item = &TableCommitOutcome> {
        self.tables.iter().filter(|outcome| !outcome.is_success())
    }

    /// Aggregates the errors that prevented a full acknowledgement, if any.
    pub fn error(&self) -> Option<SinkError> {
        let errors: Vec<SinkError> = self
            .rejected
            .iter()
            .filter(|rejected| rejected.action == RejectedEventAction::FailedBatch)
            .map(|rejected| rejected.error.clone())
            .chain(self.failed_tables().filter_map(|outcome| outcome.error().cloned()))
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(SinkError::from(errors))
        }
    }
}
