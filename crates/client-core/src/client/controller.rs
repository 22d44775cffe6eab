//! Call session control
//!
//! The [`CallSessionController`] owns at most one call at a time together with the
//! local camera stream, and keeps the call → participant → stream hierarchy in sync
//! with platform events.
//!
//! # Lifecycle
//!
//! ```text
//!  start() / accept_incoming()
//!           │
//!           ▼
//!   None ─► Connecting/Ringing ─► Connected ─► Disconnected (terminal)
//!                                    │               │
//!                         hang-up, video,     trackers, local views and
//!                         gallery enabled     local stream torn down,
//!                                             start-call re-enabled
//! ```
//!
//! # Local stream discipline
//!
//! Only one local camera stream is ever live. Every code path that creates a
//! replacement disposes the current one first.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::call::{CallEndReason, CallId, CallState, ParticipantId, StreamId, StreamOwner};
use crate::error::{SessionError, SessionResult};
use crate::events::{CallEvent, ParticipantEvent, SessionEvent, StreamEvent};
use crate::platform::{
    CallAgent, CallHandle, CallOptions, DeviceManager, IncomingCallOffer, LocalVideoStream,
    RemoteParticipant, Surfaces, VideoSource,
};

use super::capabilities::{Capabilities, CapabilityPublisher};
use super::config::SessionConfig;
use super::participant::ParticipantTracker;
use super::recovery::with_timeout;
use super::view::StreamViewManager;

/// Everything tracked for the call in progress
struct ActiveCall {
    handle: Arc<dyn CallHandle>,
    id: CallId,
    state: CallState,
    subscribed: bool,
    local_video_started: bool,
    participants: HashMap<ParticipantId, ParticipantTracker>,
    local_views: HashMap<StreamId, StreamViewManager>,
}

impl ActiveCall {
    fn new(handle: Arc<dyn CallHandle>) -> Self {
        let id = handle.id();
        let state = handle.state();
        Self {
            handle,
            id,
            state,
            subscribed: false,
            local_video_started: false,
            participants: HashMap::new(),
            local_views: HashMap::new(),
        }
    }
}

/// Owns one call's lifecycle and every resource hanging off it
pub struct CallSessionController {
    agent: Arc<dyn CallAgent>,
    devices: Arc<dyn DeviceManager>,
    surfaces: Surfaces,
    config: SessionConfig,
    capabilities: CapabilityPublisher,
    event_tx: broadcast::Sender<SessionEvent>,
    call: Option<ActiveCall>,
    local_stream: Option<Arc<dyn LocalVideoStream>>,
    last_end_reason: Option<CallEndReason>,
    /// Call torn down by a local hang-up whose terminal state is still to be reported
    hung_up: Option<(CallId, Arc<dyn CallHandle>)>,
}

impl CallSessionController {
    pub fn new(
        agent: Arc<dyn CallAgent>,
        devices: Arc<dyn DeviceManager>,
        surfaces: Surfaces,
        config: SessionConfig,
        capabilities: CapabilityPublisher,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            agent,
            devices,
            surfaces,
            config,
            capabilities,
            event_tx,
            call: None,
            local_stream: None,
            last_end_reason: None,
            hung_up: None,
        }
    }

    // ===== QUERIES =====

    pub fn has_active_call(&self) -> bool {
        self.call.is_some()
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.call.as_ref().map(|call| call.id.clone())
    }

    pub fn call_state(&self) -> Option<CallState> {
        self.call.as_ref().map(|call| call.state)
    }

    /// End reason of the most recent call that reached its terminal state
    pub fn last_end_reason(&self) -> Option<CallEndReason> {
        self.last_end_reason
    }

    pub fn local_stream(&self) -> Option<&Arc<dyn LocalVideoStream>> {
        self.local_stream.as_ref()
    }

    pub fn is_local_video_started(&self) -> bool {
        self.call.as_ref().map(|call| call.local_video_started).unwrap_or(false)
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.call
            .as_ref()
            .map(|call| call.participants.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&ParticipantTracker> {
        self.call.as_ref().and_then(|call| call.participants.get(id))
    }

    /// Number of local streams with a mounted view
    pub fn local_view_count(&self) -> usize {
        self.call
            .as_ref()
            .map(|call| call.local_views.values().filter(|v| v.has_view()).count())
            .unwrap_or(0)
    }

    // ===== CALL SETUP =====

    /// Place an outgoing call
    ///
    /// With `with_video`, a fresh local camera stream is published from the start. A
    /// missing or failing camera degrades to an audio-only call.
    pub async fn start(&mut self, target: &str, with_video: bool) -> SessionResult<()> {
        let target = target.trim();
        if target.is_empty() {
            warn!("Refusing to start a call without a target");
            return Err(SessionError::InvalidTarget);
        }
        self.release_stale_call();

        let options = CallOptions::with_local_stream(self.prepare_local_stream(with_video).await);
        let targets = vec![target.to_string()];
        let placed = with_timeout(
            "place_call",
            self.request_timeout(),
            self.agent.place_call(&targets, options),
        )
        .await;

        match placed {
            Ok(handle) => {
                info!(call_id = %handle.id(), target = %target, video = with_video, "Placed outgoing call");
                self.call = Some(ActiveCall::new(handle));
                self.subscribe().await;
                Ok(())
            }
            Err(e) => {
                self.dispose_local_stream().await;
                Err(e)
            }
        }
    }

    /// Accept a pending incoming call offer
    pub async fn accept_incoming(
        &mut self,
        offer: Arc<dyn IncomingCallOffer>,
        with_video: bool,
    ) -> SessionResult<()> {
        self.release_stale_call();

        let options = CallOptions::with_local_stream(self.prepare_local_stream(with_video).await);
        let accepted = with_timeout("accept", self.request_timeout(), offer.accept(options)).await;

        match accepted {
            Ok(handle) => {
                info!(
                    call_id = %handle.id(),
                    offer_id = %offer.id(),
                    caller = %offer.caller(),
                    video = with_video,
                    "Accepted incoming call"
                );
                self.call = Some(ActiveCall::new(handle));
                self.subscribe().await;
                Ok(())
            }
            Err(e) => {
                self.dispose_local_stream().await;
                Err(e)
            }
        }
    }

    /// Start tracking the current call's events and existing entities
    ///
    /// Subscribing twice is a no-op.
    pub async fn subscribe(&mut self) {
        let (handle, initial_state) = match self.call.as_mut() {
            Some(call) if !call.subscribed => {
                call.subscribed = true;
                (call.handle.clone(), call.state)
            }
            Some(call) => {
                debug!(call_id = %call.id, "Call already subscribed");
                return;
            }
            None => {
                warn!("No call to subscribe to");
                return;
            }
        };

        info!(call_id = %handle.id(), state = %initial_state, "Subscribed to call");
        self.emit(SessionEvent::CallStateChanged {
            call_id: handle.id(),
            previous_state: None,
            new_state: initial_state,
            timestamp: Utc::now(),
        });

        for stream in handle.local_video_streams() {
            self.attach_local_view(stream).await;
        }
        for participant in handle.remote_participants() {
            self.attach_participant(participant).await;
        }

        // A call may already be established (or over) by the time it is handed to us
        if initial_state.is_connected() {
            self.on_connected();
        } else if initial_state.is_terminal() {
            self.on_disconnected().await;
        }
    }

    // ===== LOCAL VIDEO =====

    /// Publish a fresh local camera stream on the current call
    pub async fn start_local_video(&mut self) -> SessionResult<()> {
        let Some(handle) = self.call.as_ref().map(|call| call.handle.clone()) else {
            warn!("Cannot start video without an active call");
            return Err(SessionError::inconsistent("start_video", "no active call"));
        };

        if let Some(current) = self.local_stream.clone() {
            if let Err(e) = with_timeout("stop_video", self.request_timeout(), handle.stop_video(current.clone())).await {
                warn!(error = %e, "Failed to unpublish previous local stream");
            }
            self.detach_local_view(&current.id());
        }
        let Some(stream) = self.prepare_local_stream(true).await else {
            return Err(SessionError::platform("start_video", "no camera available"));
        };

        match with_timeout("start_video", self.request_timeout(), handle.start_video(stream.clone())).await {
            Ok(()) => {
                info!(call_id = %handle.id(), stream_id = %stream.id(), "Started local video");
                Ok(())
            }
            Err(e) => {
                self.dispose_local_stream().await;
                Err(e)
            }
        }
    }

    /// Stop publishing the local camera stream
    ///
    /// Without an active call this is an inconsistent-state error; without a local
    /// stream it is a no-op with a warning.
    pub async fn stop_local_video(&mut self) -> SessionResult<()> {
        let Some(handle) = self.call.as_ref().map(|call| call.handle.clone()) else {
            warn!("Cannot stop video without an active call");
            return Err(SessionError::inconsistent("stop_video", "no active call"));
        };
        let Some(stream) = self.local_stream.clone() else {
            warn!(call_id = %handle.id(), "No local video stream to stop");
            return Ok(());
        };

        let stopped = with_timeout("stop_video", self.request_timeout(), handle.stop_video(stream.clone())).await;
        if stopped.is_ok() {
            info!(call_id = %handle.id(), stream_id = %stream.id(), "Stopped local video");
        }
        self.detach_local_view(&stream.id());
        self.dispose_local_stream().await;
        stopped
    }

    // ===== TEARDOWN =====

    /// Hang up the current call
    ///
    /// Without an active call, or with a call already in its terminal state, this is a
    /// no-op with a warning and no platform request is made.
    pub async fn hang_up(&mut self) -> SessionResult<()> {
        let Some(call) = self.call.as_ref() else {
            warn!("Hang up requested without an active call");
            return Ok(());
        };
        if call.state.is_terminal() {
            warn!(call_id = %call.id, "Hang up requested for a call that already ended");
            return Ok(());
        }
        let handle = call.handle.clone();
        let call_id = call.id.clone();

        let result = with_timeout("hang_up", self.request_timeout(), handle.hang_up()).await;
        info!(call_id = %call_id, success = result.is_ok(), "Hung up call");

        self.teardown_call().await;
        self.capabilities.set(Capabilities::ready());
        // The platform still reports the terminal state; its end reason is logged then
        self.hung_up = Some((call_id, handle));
        result
    }

    /// Hang up if needed and release every resource; used before starting a new call
    pub async fn reset(&mut self) {
        if self.call.is_some() {
            if let Err(e) = self.hang_up().await {
                warn!(error = %e, "Hang up during reset failed, resources released anyway");
            }
        }
        self.teardown_call().await;
    }

    /// Release all views and the local stream without talking to the call
    pub async fn release_all(&mut self) {
        self.teardown_call().await;
    }

    // ===== EVENT ROUTING =====

    /// Route one call-level event
    pub async fn handle_call_event(&mut self, call_id: &CallId, event: CallEvent) {
        if !self.owns_call(call_id) {
            let ends_hung_up = matches!(&event, CallEvent::StateChanged(state) if state.is_terminal())
                && self.hung_up.as_ref().is_some_and(|(id, _)| id == call_id);
            match self.hung_up.take() {
                Some((id, handle)) if ends_hung_up => self.report_call_end(id, handle.end_reason()),
                hung_up => {
                    self.hung_up = hung_up;
                    debug!(call_id = %call_id, ?event, "Event for unknown call, ignoring");
                }
            }
            return;
        }

        match event {
            CallEvent::IdChanged { id } => {
                if let Some(call) = self.call.as_mut() {
                    info!(previous = %call.id, current = %id, "Call id changed");
                    let previous = std::mem::replace(&mut call.id, id.clone());
                    self.emit(SessionEvent::CallIdChanged { previous, current: id });
                }
            }
            CallEvent::StateChanged(state) => self.on_state_changed(state).await,
            CallEvent::IsLocalVideoStartedChanged(started) => {
                if let Some(call) = self.call.as_mut() {
                    info!(call_id = %call.id, started, "Local video started changed");
                    call.local_video_started = started;
                    let call_id = call.id.clone();
                    self.emit(SessionEvent::LocalVideoStartedChanged { call_id, started });
                }
            }
            CallEvent::LocalVideoStreamsUpdated { added, removed } => {
                for stream in added {
                    self.attach_local_view(stream).await;
                }
                for stream_id in removed {
                    self.detach_local_view(&stream_id);
                }
            }
            CallEvent::RemoteParticipantsUpdated { added, removed } => {
                for participant in added {
                    self.attach_participant(participant).await;
                }
                for participant_id in removed {
                    self.detach_participant(&participant_id);
                }
            }
        }
    }

    /// Route an event for one remote participant
    pub async fn handle_participant_event(&mut self, participant_id: &ParticipantId, event: ParticipantEvent) {
        match self.call.as_mut().and_then(|call| call.participants.get_mut(participant_id)) {
            Some(tracker) => tracker.handle_event(event).await,
            None => debug!(participant_id = %participant_id, "Event for untracked participant, ignoring"),
        }
    }

    /// Route an event for one stream, local or remote
    pub async fn handle_stream_event(&mut self, owner: &StreamOwner, stream_id: &StreamId, event: StreamEvent) {
        let Some(call) = self.call.as_mut() else {
            debug!(stream_id = %stream_id, "Stream event without an active call, ignoring");
            return;
        };
        match owner {
            StreamOwner::Remote(participant_id) => match call.participants.get_mut(participant_id) {
                Some(tracker) => tracker.handle_stream_event(stream_id, event).await,
                None => debug!(participant_id = %participant_id, stream_id = %stream_id, "Stream event for untracked participant"),
            },
            StreamOwner::Local => match call.local_views.get_mut(stream_id) {
                Some(view) => view.handle_event(event).await,
                None => debug!(stream_id = %stream_id, "Event for untracked local stream"),
            },
        }
        self.sync_local_container();
    }

    // ===== INTERNALS =====

    fn request_timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    fn owns_call(&self, call_id: &CallId) -> bool {
        self.call.as_ref().map(|call| call.id == *call_id).unwrap_or(false)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn on_state_changed(&mut self, state: CallState) {
        let Some(call) = self.call.as_mut() else {
            return;
        };
        let previous = call.state;
        if previous == state {
            debug!(call_id = %call.id, state = %state, "Call state unchanged");
            return;
        }
        call.state = state;
        let call_id = call.id.clone();
        info!(call_id = %call_id, previous = %previous, new = %state, "Call state changed");
        self.emit(SessionEvent::CallStateChanged {
            call_id,
            previous_state: Some(previous),
            new_state: state,
            timestamp: Utc::now(),
        });

        if state.is_connected() {
            self.on_connected();
        } else if state.is_terminal() {
            self.on_disconnected().await;
        }
    }

    fn on_connected(&self) {
        self.capabilities.update(|caps| *caps = caps.connected());
    }

    async fn on_disconnected(&mut self) {
        let Some(call) = self.call.as_ref() else {
            return;
        };
        let call_id = call.id.clone();
        let reason = call.handle.end_reason();

        self.teardown_call().await;
        self.capabilities.update(|caps| *caps = caps.disconnected());
        self.report_call_end(call_id, reason);
    }

    fn report_call_end(&mut self, call_id: CallId, reason: Option<CallEndReason>) {
        match reason {
            Some(reason) => info!(call_id = %call_id, code = reason.code, sub_code = reason.sub_code, "Call ended, call end reason={}", reason),
            None => info!(call_id = %call_id, "Call ended without an end reason"),
        }
        self.last_end_reason = reason;
        self.emit(SessionEvent::CallEnded {
            call_id,
            reason,
            timestamp: Utc::now(),
        });
    }

    /// Drop tracking of a call object left over from an earlier attempt
    fn release_stale_call(&mut self) {
        if let Some(mut call) = self.call.take() {
            warn!(call_id = %call.id, "Replacing a call that was never torn down");
            Self::detach_everything(&mut call);
        }
    }

    async fn teardown_call(&mut self) {
        if let Some(mut call) = self.call.take() {
            Self::detach_everything(&mut call);
            debug!(call_id = %call.id, "Call torn down");
        }
        self.dispose_local_stream().await;
        self.sync_local_container();
    }

    fn detach_everything(call: &mut ActiveCall) {
        for (id, mut tracker) in call.participants.drain() {
            tracker.detach();
            debug!(participant_id = %id, "Participant released");
        }
        for (_, mut view) in call.local_views.drain() {
            view.detach();
        }
    }

    async fn attach_participant(&mut self, participant: Arc<dyn RemoteParticipant>) {
        let renderer = self.surfaces.renderer.clone();
        let gallery = self.surfaces.gallery.clone();
        let timeout = self.request_timeout();
        let Some(call) = self.call.as_mut() else {
            return;
        };

        let participant_id = participant.id();
        if call.participants.contains_key(&participant_id) {
            debug!(participant_id = %participant_id, "Participant already tracked");
            return;
        }

        let mut tracker = ParticipantTracker::new(participant, renderer, gallery, timeout);
        tracker.attach().await;
        call.participants.insert(participant_id.clone(), tracker);
        self.emit(SessionEvent::ParticipantJoined { participant_id });
    }

    fn detach_participant(&mut self, participant_id: &ParticipantId) {
        let removed = self
            .call
            .as_mut()
            .and_then(|call| call.participants.remove(participant_id));
        match removed {
            Some(mut tracker) => {
                tracker.detach();
                info!(participant_id = %participant_id, "Remote participant removed from the call");
                self.emit(SessionEvent::ParticipantLeft {
                    participant_id: participant_id.clone(),
                });
            }
            None => debug!(participant_id = %participant_id, "Removed participant was not tracked"),
        }
    }

    async fn attach_local_view(&mut self, stream: Arc<dyn LocalVideoStream>) {
        let renderer = self.surfaces.renderer.clone();
        let mount = self.surfaces.local_container.clone();
        let timeout = self.request_timeout();
        let Some(call) = self.call.as_mut() else {
            return;
        };

        let stream_id = stream.id();
        if call.local_views.contains_key(&stream_id) {
            debug!(stream_id = %stream_id, "Local stream already displayed");
            return;
        }

        let mut view = StreamViewManager::new(VideoSource::Local(stream), renderer, mount, timeout);
        view.attach().await;
        call.local_views.insert(stream_id, view);
        self.sync_local_container();
    }

    fn detach_local_view(&mut self, stream_id: &StreamId) {
        if let Some(mut view) = self
            .call
            .as_mut()
            .and_then(|call| call.local_views.remove(stream_id))
        {
            view.detach();
            debug!(stream_id = %stream_id, "Local stream view removed");
        }
        self.sync_local_container();
    }

    fn sync_local_container(&self) {
        let visible = self.local_view_count() > 0;
        self.capabilities.update(|caps| caps.local_video_container = visible);
    }

    /// Dispose the current local stream, then create a new one when video is wanted
    async fn prepare_local_stream(&mut self, with_video: bool) -> Option<Arc<dyn LocalVideoStream>> {
        self.dispose_local_stream().await;
        if !with_video {
            return None;
        }

        let cameras = match with_timeout("list_cameras", self.request_timeout(), self.devices.list_cameras()).await {
            Ok(cameras) => cameras,
            Err(e) => {
                warn!(error = %e, "Continuing without local video");
                return None;
            }
        };

        let preferred = self
            .config
            .preferred_camera
            .as_deref()
            .and_then(|wanted| cameras.iter().find(|camera| camera.id == wanted));
        let Some(camera) = preferred.or_else(|| cameras.first()) else {
            warn!("No camera device found on the system, continuing without local video");
            return None;
        };

        match self.devices.create_local_stream(camera) {
            Ok(stream) => {
                debug!(stream_id = %stream.id(), camera = %camera.name, "Created local video stream");
                self.local_stream = Some(stream.clone());
                Some(stream)
            }
            Err(e) => {
                error!(camera = %camera.name, error = %e, "Failed to open camera, continuing without local video");
                None
            }
        }
    }

    async fn dispose_local_stream(&mut self) {
        let Some(stream) = self.local_stream.take() else {
            return;
        };
        match with_timeout("dispose_local_stream", self.request_timeout(), stream.dispose()).await {
            Ok(()) => debug!(stream_id = %stream.id(), "Disposed local video stream"),
            Err(e) => warn!(stream_id = %stream.id(), error = %e, "Local stream disposal failed"),
        }
    }
}

impl std::fmt::Debug for CallSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSessionController")
            .field("call_id", &self.call_id())
            .field("call_state", &self.call_state())
            .field("participants", &self.participant_ids().len())
            .field("local_stream", &self.local_stream.as_ref().map(|s| s.id()))
            .finish()
    }
}
