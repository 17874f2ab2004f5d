//! Retry policy as a pure state machine.
//!
//! One transition function maps (attempt result, retries already used,
//! configured maximum) to the next step. The executor is a thin loop over
//! this table, which keeps the policy independently testable without any
//! transport or clock.

use std::time::Duration;

use blobsync_types::BlobError;

/// Next step after one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStep {
    /// The attempt succeeded.
    Done,
    /// Transient failure with retries remaining: wait, then try again.
    Backoff(Duration),
    /// Permanent failure: stop now, carrying the underlying message.
    GiveUp(String),
    /// Transient failure with no retries remaining.
    Exhausted,
}

/// Pure transition function.
///
/// `retries_used` counts completed retries (0 on the first attempt). The
/// backoff before retry `n` (1-based) is `2^n` seconds, so a run with
/// `max_retries = 3` attempts at t=0, +2s, +4s, +8s — four attempts total.
pub fn next_step(
    result: &Result<(), BlobError>,
    retries_used: u32,
    max_retries: u32,
) -> RetryStep {
    match result {
        Ok(()) => RetryStep::Done,
        Err(e) if e.is_transient() => {
            if retries_used < max_retries {
                let next_retry = retries_used + 1;
                RetryStep::Backoff(Duration::from_secs(1u64 << next_retry))
            } else {
                RetryStep::Exhausted
            }
        }
        Err(e) => RetryStep::GiveUp(e.message().to_string()),
    }
}
