use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};

pub const COMMIT_CHANGES__BEFORE_STORE_CALL: &str = "commit_changes.before_store_call";

/// Evaluates a failpoint, returning an error when it is configured to fire.
///
/// The `transient` parameter produces a retryable error, anything else a fatal one.
pub fn sink_fail_point(name: &str) -> SinkResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("transient") => ErrorKind::WithTransientFailure,
            _ => ErrorKind::WithFatalFailure,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
