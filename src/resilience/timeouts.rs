//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every remote-store and bus call with a deadline
//! - Cancel the in-flight operation when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped on expiry
//! - Deadline expiry is its own error type; callers map it to a transport
//!   failure, never to an absent key

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// The deadline passed before the operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded(pub Duration);

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deadline exceeded after {}", humantime::format_duration(self.0))
    }
}

impl std::error::Error for DeadlineExceeded {}

/// Run `fut` to completion or until `timeout` elapses.
pub async fn with_deadline<F>(timeout: Duration, fut: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| DeadlineExceeded(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let value = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_expires() {
        let err = with_deadline(Duration::from_millis(10), tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err, DeadlineExceeded(Duration::from_millis(10)));
        assert_eq!(err.to_string(), "deadline exceeded after 10ms");
    }
}
