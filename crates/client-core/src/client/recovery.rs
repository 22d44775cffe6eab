//! Bounded platform requests
//!
//! Every request the session core issues to a collaborator goes through
//! [`with_timeout`], so an unresponsive platform can stall a user action for at most
//! the configured request timeout. Nothing is retried; the user re-triggers the action.

use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::error::{PlatformResult, SessionError, SessionResult};

/// Run a platform request with a timeout and map its failure into a [`SessionError`]
///
/// A rejected request becomes [`SessionError::PlatformRequestFailed`] and an expired
/// one [`SessionError::RequestTimeout`]. Both are logged here with the operation name,
/// so callers only decide how to degrade.
///
/// # Examples
///
/// ```rust
/// # use callview_client_core::client::recovery::with_timeout;
/// # use callview_client_core::error::{PlatformError, SessionError};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() {
/// let result = with_timeout("list_cameras", Duration::from_secs(1), async {
///     Err::<Vec<String>, _>(PlatformError::new("device busy"))
/// })
/// .await;
///
/// assert!(matches!(result, Err(SessionError::PlatformRequestFailed { .. })));
/// # }
/// ```
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, future: F) -> SessionResult<T>
where
    F: Future<Output = PlatformResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!(operation = operation, error = %e, "Platform request failed");
            Err(SessionError::platform(operation, e.message))
        }
        Err(_) => {
            error!(
                operation = operation,
                timeout_ms = timeout.as_millis() as u64,
                "Platform request timed out"
            );
            Err(SessionError::RequestTimeout {
                operation: operation.to_string(),
                duration_ms: timeout.as_millis() as u64,
            })
        }
    }
}
