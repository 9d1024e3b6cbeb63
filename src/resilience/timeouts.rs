//! Timeout enforcement for backend calls.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - A timeout becomes a `BackendErrorKind::Timeout` so it is reported like any
//!   other per-backend failure

use std::future::Future;
use std::time::Duration;

use crate::backends::error::{BackendError, BackendErrorKind};

/// Bound `call` by `limit`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::new(
            BackendErrorKind::Timeout,
            format!("no response within {}s", limit.as_secs_f64()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_times_out() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().kind, BackendErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, BackendError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout(Duration::from_secs(1), async {
            Err::<(), _>(BackendError::new(BackendErrorKind::Authentication, "401"))
        })
        .await;
        assert_eq!(err.unwrap_err().kind, BackendErrorKind::Authentication);
    }
}
