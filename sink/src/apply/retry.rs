//! Backoff delays between commit attempts.

use std::time::Duration;

use rand::Rng;
use sink_config::shared::CommitRetryConfig;

/// Maximum fraction of the delay added as random jitter.
const MAX_JITTER_FACTOR: f64 = 0.3;

/// Computes the delay to wait before retry number `retry` (starting at 1).
///
/// The delay grows as `initial * multiplier^(retry - 1)`, is capped at the configured maximum
/// and then gets up to 30% of random jitter.
pub(crate) fn calculate_backoff(config: &CommitRetryConfig, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
    let delay_ms = config.initial_retry_delay_ms as f64 * config.backoff_multiplier.powi(exponent);
    let capped_delay_ms = delay_ms.min(config.max_retry_delay_ms as f64);

    let jitter_factor = rand::rng().random::<f64>() * MAX_JITTER_FACTOR;
    let jittered_delay_ms = capped_delay_ms * (1.0 + jitter_factor);

    Duration::from_millis(jittered_delay_ms as u64)
}
