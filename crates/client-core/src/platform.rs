//! Collaborator interfaces consumed by the session core
//!
//! The session core never talks to a network, a camera or a DOM directly. It drives
//! three collaborators through the traits in this module:
//!
//! ```text
//! ┌──────────────────────────┐   create_agent / place_call / accept
//! │     Calling platform     │ ◄──────────────────────────────────┐
//! │ CallAgent, CallHandle,   │                                    │
//! │ RemoteParticipant, ...   │ ── PlatformEvent (mpsc) ──►  ┌─────┴──────────┐
//! └──────────────────────────┘                               │  session core  │
//! ┌──────────────────────────┐   cameras / permission        │                │
//! │      Device access       │ ◄──────────────────────────── │                │
//! └──────────────────────────┘                               │                │
//! ┌──────────────────────────┐   create_view / append        │                │
//! │    Rendering surface     │ ◄──────────────────────────── └────────────────┘
//! └──────────────────────────┘
//! ```
//!
//! Entity handles are shared as `Arc<dyn Trait>`; the platform owns the real objects
//! and the core only holds references for as long as the entity is tracked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::call::{
    CallEndReason, CallId, CallState, CameraDescriptor, MediaAccess, OfferId, ParticipantId,
    ParticipantState, StreamId, StreamOwner,
};
use crate::error::PlatformResult;
use crate::events::PlatformEventSender;

/// Entry point into the calling platform
#[async_trait]
pub trait CallingPlatform: Send + Sync {
    /// Create a signed-in calling agent
    ///
    /// The platform pushes every agent, call, participant and stream event it emits
    /// from now on into `events`.
    async fn create_agent(
        &self,
        credential: &str,
        events: PlatformEventSender,
    ) -> PlatformResult<Arc<dyn CallAgent>>;

    /// Obtain the device-access collaborator
    async fn device_manager(&self) -> PlatformResult<Arc<dyn DeviceManager>>;
}

/// A signed-in agent able to place and receive calls
#[async_trait]
pub trait CallAgent: Send + Sync {
    /// Place a call to the given targets
    async fn place_call(
        &self,
        targets: &[String],
        options: CallOptions,
    ) -> PlatformResult<Arc<dyn CallHandle>>;

    /// Release the agent and everything the platform holds for it
    async fn dispose(&self) -> PlatformResult<()>;
}

/// A pending invitation from a remote party
#[async_trait]
pub trait IncomingCallOffer: Send + Sync + fmt::Debug {
    fn id(&self) -> OfferId;

    /// Identity of the calling party
    fn caller(&self) -> String;

    async fn accept(&self, options: CallOptions) -> PlatformResult<Arc<dyn CallHandle>>;

    async fn reject(&self) -> PlatformResult<()>;
}

/// One call as exposed by the platform
#[async_trait]
pub trait CallHandle: Send + Sync + fmt::Debug {
    fn id(&self) -> CallId;

    fn state(&self) -> CallState;

    /// Present only once the call is in its terminal state
    fn end_reason(&self) -> Option<CallEndReason>;

    /// Participants present right now
    fn remote_participants(&self) -> Vec<Arc<dyn RemoteParticipant>>;

    /// Local streams currently published on this call
    fn local_video_streams(&self) -> Vec<Arc<dyn LocalVideoStream>>;

    async fn hang_up(&self) -> PlatformResult<()>;

    async fn start_video(&self, stream: Arc<dyn LocalVideoStream>) -> PlatformResult<()>;

    async fn stop_video(&self, stream: Arc<dyn LocalVideoStream>) -> PlatformResult<()>;
}

/// A remote party in a call
pub trait RemoteParticipant: Send + Sync + fmt::Debug {
    fn id(&self) -> ParticipantId;

    fn state(&self) -> ParticipantState;

    /// Video streams the participant currently exposes
    fn video_streams(&self) -> Vec<Arc<dyn RemoteVideoStream>>;
}

/// A video feed published by a remote participant
pub trait RemoteVideoStream: Send + Sync + fmt::Debug {
    fn id(&self) -> StreamId;

    fn is_available(&self) -> bool;

    fn is_receiving(&self) -> bool;
}

/// A camera feed owned by the local side
#[async_trait]
pub trait LocalVideoStream: Send + Sync + fmt::Debug {
    fn id(&self) -> StreamId;

    fn camera(&self) -> CameraDescriptor;

    /// Release the camera
    async fn dispose(&self) -> PlatformResult<()>;
}

/// Camera and microphone access
#[async_trait]
pub trait DeviceManager: Send + Sync {
    async fn list_cameras(&self) -> PlatformResult<Vec<CameraDescriptor>>;

    /// Ask the user for access; `Ok(false)` means the user declined
    async fn request_permission(&self, access: MediaAccess) -> PlatformResult<bool>;

    fn create_local_stream(
        &self,
        camera: &CameraDescriptor,
    ) -> PlatformResult<Arc<dyn LocalVideoStream>>;
}

/// Produces playback views for video streams
#[async_trait]
pub trait RenderingSurface: Send + Sync {
    async fn create_view(&self, source: &VideoSource) -> PlatformResult<Box<dyn RenderedView>>;
}

/// A live playback view bound to one stream
pub trait RenderedView: Send + Sync {
    /// Visual root of the view, inserted into a stream container
    fn target(&self) -> ViewTarget;

    fn dispose(&self);
}

/// A UI mount point receiving per-stream containers
///
/// The UI implements this twice: once for the remote gallery and once for the single
/// local video container.
pub trait ViewMount: Send + Sync {
    /// Append a container holding a freshly created view
    fn append(&self, container: &StreamContainer);

    /// Remove a previously appended container
    fn remove(&self, container: &ContainerId);

    /// Insert or remove the loading indicator inside a mounted container
    fn set_loading_indicator(&self, container: &ContainerId, visible: bool);
}

/// Options passed when placing or accepting a call
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Local streams to publish from the start; empty means audio only
    pub local_video_streams: Vec<Arc<dyn LocalVideoStream>>,
}

impl CallOptions {
    pub fn audio_only() -> Self {
        Self::default()
    }

    /// Build options from an optional local stream
    pub fn with_local_stream(stream: Option<Arc<dyn LocalVideoStream>>) -> Self {
        Self {
            local_video_streams: stream.into_iter().collect(),
        }
    }

    pub fn has_video(&self) -> bool {
        !self.local_video_streams.is_empty()
    }
}

/// A video stream together with its owner
#[derive(Debug, Clone)]
pub enum VideoSource {
    Remote {
        participant: ParticipantId,
        stream: Arc<dyn RemoteVideoStream>,
    },
    Local(Arc<dyn LocalVideoStream>),
}

impl VideoSource {
    pub fn id(&self) -> StreamId {
        match self {
            VideoSource::Remote { stream, .. } => stream.id(),
            VideoSource::Local(stream) => stream.id(),
        }
    }

    pub fn owner(&self) -> StreamOwner {
        match self {
            VideoSource::Remote { participant, .. } => StreamOwner::Remote(participant.clone()),
            VideoSource::Local(_) => StreamOwner::Local,
        }
    }

    /// Local streams are always available while they exist
    pub fn is_available(&self) -> bool {
        match self {
            VideoSource::Remote { stream, .. } => stream.is_available(),
            VideoSource::Local(_) => true,
        }
    }

    pub fn is_receiving(&self) -> bool {
        match self {
            VideoSource::Remote { stream, .. } => stream.is_receiving(),
            VideoSource::Local(_) => true,
        }
    }
}

/// Identifier of a per-stream container element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub Uuid);

impl ContainerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a view's visual root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewTarget(pub String);

/// A container element wrapping exactly one stream's view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContainer {
    pub id: ContainerId,
    pub owner: StreamOwner,
    pub stream_id: StreamId,
    /// The view inserted into this container
    pub view: ViewTarget,
}

/// The rendering collaborators the core draws into
#[derive(Clone)]
pub struct Surfaces {
    pub renderer: Arc<dyn RenderingSurface>,
    /// Mount point for remote stream containers
    pub gallery: Arc<dyn ViewMount>,
    /// Mount point for the local video container
    pub local_container: Arc<dyn ViewMount>,
}

impl fmt::Debug for Surfaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surfaces")
            .field("renderer", &"<rendering surface>")
            .field("gallery", &"<view mount>")
            .field("local_container", &"<view mount>")
            .finish()
    }
}
