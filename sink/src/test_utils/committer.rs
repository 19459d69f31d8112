use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, SinkResult};
use crate::report::BatchReport;
use crate::sink::BatchCommitter;
use crate::sink_error;

#[derive(Debug, Default)]
struct Inner {
    reports: Vec<BatchReport>,
    fail: bool,
}

/// [`BatchCommitter`] that keeps every report it is asked to acknowledge.
#[derive(Debug, Clone, Default)]
pub struct RecordingCommitter {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a committer whose acknowledgements fail after being recorded.
    pub fn failing() -> Self {
        let inner = Inner {
            reports: Vec::new(),
            fail: true,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the acknowledged reports, oldest first.
    pub async fn reports(&self) -> Vec<BatchReport> {
        self.inner.lock().await.reports.clone()
    }

    /// Returns how many times [`BatchCommitter::commit`] was called.
    pub async fn commit_count(&self) -> usize {
        self.inner.lock().await.reports.len()
    }
}

impl BatchCommitter for RecordingCommitter {
    async fn commit(&self, report: &BatchReport) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.reports.push(report.clone());

        if inner.fail {
            return Err(sink_error!(
                ErrorKind::AcknowledgementFailed,
                "Injected acknowledgement failure"
            ));
        }

        Ok(())
    }
}
