//! Timeout enforcement.
//!
//! Every call to the node has a deadline. `race` runs a future against a
//! timer and reports which side finished first. It never cancels work that was
//! spawned elsewhere: callers that need the work to outlive the deadline spawn
//! it and race the join handle.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The timer side of a race won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct TimedOut(pub Duration);

/// Await `future` for at most `limit`.
pub async fn race<F>(limit: Duration, future: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimedOut(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_future_wins() {
        let result = race(Duration::from_secs(1), async { 5 }).await;
        assert_eq!(result, Ok(5));
    }

    #[tokio::test]
    async fn test_timer_wins() {
        let limit = Duration::from_millis(10);
        let result = race(limit, tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(TimedOut(limit)));
    }
}
