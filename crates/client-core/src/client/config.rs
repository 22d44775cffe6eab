//! Session configuration
//!
//! [`SessionConfig`] carries the few knobs the session core exposes: how long to wait
//! for any platform request, which device permissions to ask for at initialization,
//! which camera to prefer, and how many session events to buffer.
//!
//! # Examples
//!
//! ```rust
//! use callview_client_core::SessionConfig;
//! use std::time::Duration;
//!
//! let config = SessionConfig::new()
//!     .with_request_timeout(Duration::from_secs(10))
//!     .with_preferred_camera("camera-2");
//!
//! assert_eq!(config.request_timeout(), Duration::from_secs(10));
//! assert_eq!(config.preferred_camera.as_deref(), Some("camera-2"));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout applied to every platform request
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default capacity of the session event broadcast channel
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Configuration for a calling session
///
/// # Examples
///
/// ```rust
/// use callview_client_core::SessionConfig;
///
/// let config = SessionConfig::default();
/// assert_eq!(config.request_timeout_ms, 30_000);
/// assert!(config.request_video_permission);
/// assert!(config.request_audio_permission);
/// assert!(config.preferred_camera.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for any single platform request, in milliseconds
    pub request_timeout_ms: u64,
    /// Ask for camera permission during initialization
    pub request_video_permission: bool,
    /// Ask for microphone permission during initialization
    pub request_audio_permission: bool,
    /// Camera id to use for local video; the first camera is used when unset or missing
    pub preferred_camera: Option<String>,
    /// Capacity of the session event broadcast channel
    pub event_buffer_size: usize,
}

impl SessionConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            request_video_permission: true,
            request_audio_permission: true,
            preferred_camera: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }

    /// Set the timeout applied to every platform request
    ///
    /// A request that does not complete in time is treated exactly like a rejected one.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Choose which device permissions to request during initialization
    pub fn with_permissions(mut self, video: bool, audio: bool) -> Self {
        self.request_video_permission = video;
        self.request_audio_permission = audio;
        self
    }

    /// Prefer a specific camera for local video
    pub fn with_preferred_camera(mut self, camera_id: impl Into<String>) -> Self {
        self.preferred_camera = Some(camera_id.into());
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// The request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
