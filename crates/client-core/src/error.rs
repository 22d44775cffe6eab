//! Error types for the call session core
//!
//! Errors fall into three groups that call for different handling:
//!
//! - **Input errors** - `MissingCredential`, `InvalidTarget`: the caller passed something
//!   unusable, nothing was sent to the platform
//! - **Platform errors** - `PlatformRequestFailed`, `RequestTimeout`: a request to the
//!   calling platform, the device-access collaborator or the rendering surface was
//!   rejected or never answered. These are logged where they occur and the session
//!   degrades to "feature unavailable"
//! - **State errors** - `InconsistentState`: an operation was attempted without its
//!   precondition, usually a UI race such as a double click. These are benign
//!
//! # Error Handling Guide
//!
//! ```rust,no_run
//! # use callview_client_core::{SessionOrchestrator, SessionError};
//! # async fn example(session: &mut SessionOrchestrator) {
//! match session.handle_start_call("8:acs:bob", true).await {
//!     Ok(()) => {}
//!     Err(SessionError::InvalidTarget) => {
//!         // Ask the user for a callee identity
//!     }
//!     Err(e) if e.is_benign() => {
//!         // Nothing happened, nothing to report
//!     }
//!     Err(e) => {
//!         tracing::error!(error = %e, category = e.category(), "Failed to start call");
//!     }
//! }
//! # }
//! ```

use thiserror::Error;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Error reported by a platform collaborator
///
/// Collaborator implementations wrap whatever their underlying API rejects with into
/// this type; the session core only ever needs the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Result type alias for collaborator operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Error types for call session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Missing credential: an access token is required to initialize")]
    MissingCredential,

    #[error("Invalid target: callee identity must not be empty")]
    InvalidTarget,

    #[error("Platform request failed during {operation}: {reason}")]
    PlatformRequestFailed { operation: String, reason: String },

    #[error("Platform request {operation} timed out after {duration_ms}ms")]
    RequestTimeout { operation: String, duration_ms: u64 },

    #[error("Inconsistent state for {operation}: {reason}")]
    InconsistentState { operation: String, reason: String },
}

impl SessionError {
    /// Create a platform request failure
    pub fn platform(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PlatformRequestFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an inconsistent state error
    pub fn inconsistent(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InconsistentState {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a benign no-op caused by a UI race
    pub fn is_benign(&self) -> bool {
        matches!(self, SessionError::InconsistentState { .. })
    }

    /// Check if this error originated from a platform collaborator
    pub fn is_platform_failure(&self) -> bool {
        matches!(
            self,
            SessionError::PlatformRequestFailed { .. } | SessionError::RequestTimeout { .. }
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            SessionError::MissingCredential | SessionError::InvalidTarget => "input",
            SessionError::PlatformRequestFailed { .. } | SessionError::RequestTimeout { .. } => {
                "platform"
            }
            SessionError::InconsistentState { .. } => "state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = SessionError::inconsistent("stop_video", "no local stream");
        assert!(err.is_benign());
        assert!(!err.is_platform_failure());
        assert_eq!(err.category(), "state");

        let err = SessionError::RequestTimeout {
            operation: "place_call".to_string(),
            duration_ms: 30_000,
        };
        assert!(err.is_platform_failure());
        assert_eq!(err.category(), "platform");

        assert_eq!(SessionError::InvalidTarget.category(), "input");
    }

    #[test]
    fn test_error_messages() {
        let err = SessionError::platform("accept", "offer expired");
        assert_eq!(err.to_string(), "Platform request failed during accept: offer expired");
        assert_eq!(PlatformError::new("denied").to_string(), "denied");
    }
}
