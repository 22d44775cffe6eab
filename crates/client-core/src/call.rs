//! Call, participant and stream identity types
//!
//! This module provides the identifiers and lifecycle enumerations shared by the
//! call session core. All real call and media operations are delegated to the
//! calling platform; these types only describe what the platform reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-assigned identifier of a call
///
/// The platform may reassign a call's id during its lifetime (for example once the
/// call is connected), which is reported through [`crate::events::CallEvent::IdChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

/// Identity of a remote participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

/// Identity of a video stream, unique within its owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub String);

/// Identity of a pending incoming call offer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

macro_rules! impl_id {
    ($($name:ident),*) => {
        $(
            impl $name {
                /// Create an identifier from anything string-like
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                /// Borrow the raw identifier
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

impl_id!(CallId, ParticipantId, StreamId, OfferId);

/// Lifecycle state of a call as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Call object exists but nothing has happened yet
    None,
    /// Outgoing call is being set up
    Connecting,
    /// Remote side is being alerted
    Ringing,
    /// Remote side is sending early media before answering
    EarlyMedia,
    /// Call is established and media may flow
    Connected,
    /// Call was placed on hold locally
    LocalHold,
    /// Call was placed on hold by the remote side
    RemoteHold,
    /// Call is being torn down
    Disconnecting,
    /// Call has ended; terminal
    Disconnected,
}

impl CallState {
    /// Check if the call is established
    pub fn is_connected(&self) -> bool {
        matches!(self, CallState::Connected)
    }

    /// Check if the call has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Disconnected)
    }

    /// Check if the call is still being set up
    pub fn is_setting_up(&self) -> bool {
        matches!(
            self,
            CallState::None | CallState::Connecting | CallState::Ringing | CallState::EarlyMedia
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a call ended, as reported by the platform in the terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEndReason {
    /// Primary reason code
    pub code: u32,
    /// Platform-specific sub-code
    pub sub_code: u32,
}

impl CallEndReason {
    /// Create an end reason
    pub fn new(code: u32, sub_code: u32) -> Self {
        Self { code, sub_code }
    }

    /// Check if the call ended normally (both codes zero)
    pub fn is_normal(&self) -> bool {
        self.code == 0 && self.sub_code == 0
    }
}

impl fmt::Display for CallEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{code={}, subCode={}}}", self.code, self.sub_code)
    }
}

/// Lifecycle state of a remote participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantState {
    Idle,
    Connecting,
    Ringing,
    Connected,
    Hold,
    InLobby,
    EarlyMedia,
    Disconnected,
}

/// Who owns a video stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamOwner {
    /// Stream published by the local side
    Local,
    /// Stream belonging to a remote participant
    Remote(ParticipantId),
}

impl fmt::Display for StreamOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamOwner::Local => f.write_str("local"),
            StreamOwner::Remote(id) => write!(f, "participant:{}", id),
        }
    }
}

/// A camera reported by the device-access collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Device identifier
    pub id: String,
    /// Human-readable device name
    pub name: String,
}

impl CameraDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Kind of device permission requested from the device-access collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaAccess {
    Video,
    Audio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_connected_states() {
        assert!(CallState::Disconnected.is_terminal());
        assert!(!CallState::Connected.is_terminal());
        assert!(CallState::Connected.is_connected());
        assert!(CallState::Connecting.is_setting_up());
        assert!(!CallState::LocalHold.is_setting_up());
    }

    #[test]
    fn test_end_reason_display() {
        let reason = CallEndReason::new(0, 0);
        assert!(reason.is_normal());
        assert_eq!(reason.to_string(), "{code=0, subCode=0}");
        assert!(!CallEndReason::new(487, 5000).is_normal());
    }

    #[test]
    fn test_stream_owner_display() {
        assert_eq!(StreamOwner::Local.to_string(), "local");
        assert_eq!(
            StreamOwner::Remote(ParticipantId::new("8:acs:bob")).to_string(),
            "participant:8:acs:bob"
        );
    }
}
