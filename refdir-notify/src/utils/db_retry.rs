//! Lock-contention retry for ledger and error-log writes
//!
//! Several fan-out passes may write at once; SQLite answers the loser with
//! "database is locked". Those writes are retried with a doubling pause until
//! the configured budget is spent. Any other error is returned immediately.

use refdir_common::Result;
use std::future::Future;
use std::time::{Duration, Instant};

const FIRST_PAUSE: Duration = Duration::from_millis(10);
const MAX_PAUSE: Duration = Duration::from_secs(1);

/// Run `write` until it succeeds, fails with a non-lock error, or
/// `max_wait_ms` has passed since the first attempt
pub async fn retry_on_lock<F, Fut, T>(label: &str, max_wait_ms: u64, mut write: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut pause = FIRST_PAUSE;
    let mut tries = 1u32;

    loop {
        let err = match write().await {
            Ok(value) => {
                if tries > 1 {
                    tracing::debug!(write = label, tries, "Write went through after lock contention");
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_error() => err,
            Err(err) => return Err(err),
        };

        let now = Instant::now();
        if now >= deadline {
            tracing::error!(write = label, tries, max_wait_ms, "Giving up on locked database");
            return Err(err);
        }

        tracing::warn!(
            write = label,
            tries,
            pause_ms = pause.as_millis() as u64,
            "Database locked, retrying"
        );
        tokio::time::sleep(pause.min(deadline - now)).await;
        pause = (pause * 2).min(MAX_PAUSE);
        tries += 1;
    }
}
