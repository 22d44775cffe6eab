//! Events flowing into and out of the session core
//!
//! Two event families live here:
//!
//! - **Platform events** ([`PlatformEvent`]) - pushed by the calling platform into the
//!   channel handed to [`crate::platform::CallingPlatform::create_agent`]. Each entity
//!   kind (agent, call, participant, stream) has its own tagged event type, routed by
//!   identity down the call → participant → stream hierarchy.
//! - **Session events** ([`SessionEvent`]) - broadcast by the core for diagnostics and
//!   for UI layers that want more than the capability set.
//!
//! # Usage Examples
//!
//! ```rust
//! use callview_client_core::events::{PlatformEvent, StreamEvent};
//! use callview_client_core::call::{ParticipantId, StreamId, StreamOwner};
//!
//! let event = PlatformEvent::Stream {
//!     owner: StreamOwner::Remote(ParticipantId::new("8:acs:bob")),
//!     stream_id: StreamId::new("1"),
//!     event: StreamEvent::IsAvailableChanged(true),
//! };
//! assert_eq!(event.kind(), "stream");
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::call::{CallEndReason, CallId, CallState, OfferId, ParticipantId, ParticipantState, StreamId, StreamOwner};
use crate::platform::{IncomingCallOffer, LocalVideoStream, RemoteParticipant, RemoteVideoStream};

/// Sending half of the platform event channel
pub type PlatformEventSender = mpsc::UnboundedSender<PlatformEvent>;

/// Receiving half of the platform event channel
pub type PlatformEventReceiver = mpsc::UnboundedReceiver<PlatformEvent>;

/// An event emitted by the calling platform
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// Agent-level notification
    Agent(AgentEvent),
    /// Event on a call, tagged with the id the call had when the event was emitted
    Call { call_id: CallId, event: CallEvent },
    /// Event on a remote participant of the current call
    Participant {
        participant_id: ParticipantId,
        event: ParticipantEvent,
    },
    /// Event on one video stream
    Stream {
        owner: StreamOwner,
        stream_id: StreamId,
        event: StreamEvent,
    },
}

impl PlatformEvent {
    /// Short name of the entity kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformEvent::Agent(_) => "agent",
            PlatformEvent::Call { .. } => "call",
            PlatformEvent::Participant { .. } => "participant",
            PlatformEvent::Stream { .. } => "stream",
        }
    }
}

#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A remote party is calling
    IncomingCall(Arc<dyn IncomingCallOffer>),
    /// A pending offer was withdrawn before it was answered
    IncomingCallEnded { offer_id: OfferId },
}

#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The platform reassigned the call's id
    IdChanged { id: CallId },
    StateChanged(CallState),
    IsLocalVideoStartedChanged(bool),
    LocalVideoStreamsUpdated {
        added: Vec<Arc<dyn LocalVideoStream>>,
        removed: Vec<StreamId>,
    },
    RemoteParticipantsUpdated {
        added: Vec<Arc<dyn RemoteParticipant>>,
        removed: Vec<ParticipantId>,
    },
}

#[derive(Debug, Clone)]
pub enum ParticipantEvent {
    StateChanged(ParticipantState),
    VideoStreamsUpdated {
        added: Vec<Arc<dyn RemoteVideoStream>>,
        removed: Vec<StreamId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    IsAvailableChanged(bool),
    IsReceivingChanged(bool),
}

/// Event priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// Routine updates (participant state, id changes)
    Low,
    /// State changes and media toggles
    Normal,
    /// Incoming calls and call endings
    High,
}

/// Events broadcast by the session core
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Agent created and device permissions granted
    Initialized { timestamp: DateTime<Utc> },
    /// A remote party is calling
    IncomingCall {
        offer_id: OfferId,
        caller: String,
        /// Whether an earlier pending offer was overwritten
        replaced_pending: bool,
        timestamp: DateTime<Utc>,
    },
    /// The pending offer was withdrawn, accepted or rejected
    IncomingCallCleared { offer_id: OfferId },
    CallIdChanged { previous: CallId, current: CallId },
    CallStateChanged {
        call_id: CallId,
        previous_state: Option<CallState>,
        new_state: CallState,
        timestamp: DateTime<Utc>,
    },
    /// The call reached its terminal state
    CallEnded {
        call_id: CallId,
        reason: Option<CallEndReason>,
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined { participant_id: ParticipantId },
    ParticipantLeft { participant_id: ParticipantId },
    LocalVideoStartedChanged { call_id: CallId, started: bool },
}

impl SessionEvent {
    /// Get the priority of this event
    pub fn priority(&self) -> EventPriority {
        match self {
            SessionEvent::IncomingCall { .. } | SessionEvent::CallEnded { .. } => {
                EventPriority::High
            }
            SessionEvent::Initialized { .. }
            | SessionEvent::IncomingCallCleared { .. }
            | SessionEvent::CallStateChanged { .. }
            | SessionEvent::LocalVideoStartedChanged { .. } => EventPriority::Normal,
            SessionEvent::CallIdChanged { .. }
            | SessionEvent::ParticipantJoined { .. }
            | SessionEvent::ParticipantLeft { .. } => EventPriority::Low,
        }
    }
}
