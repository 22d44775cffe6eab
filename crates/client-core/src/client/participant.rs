//! Participant tracking
//!
//! A [`ParticipantTracker`] owns one [`StreamViewManager`] per video stream of a
//! remote participant, keyed by stream identity so that a stream reported both in the
//! initial snapshot and in a later "added" event is only tracked once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::call::{ParticipantId, ParticipantState, StreamId};
use crate::events::{ParticipantEvent, StreamEvent};
use crate::platform::{RemoteParticipant, RemoteVideoStream, RenderingSurface, VideoSource, ViewMount};

use super::view::StreamViewManager;

pub struct ParticipantTracker {
    participant: Arc<dyn RemoteParticipant>,
    id: ParticipantId,
    state: ParticipantState,
    renderer: Arc<dyn RenderingSurface>,
    gallery: Arc<dyn ViewMount>,
    request_timeout: Duration,
    streams: HashMap<StreamId, StreamViewManager>,
    attached: bool,
}

impl ParticipantTracker {
    pub fn new(
        participant: Arc<dyn RemoteParticipant>,
        renderer: Arc<dyn RenderingSurface>,
        gallery: Arc<dyn ViewMount>,
        request_timeout: Duration,
    ) -> Self {
        let id = participant.id();
        let state = participant.state();
        Self {
            participant,
            id,
            state,
            renderer,
            gallery,
            request_timeout,
            streams: HashMap::new(),
            attached: false,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn state(&self) -> ParticipantState {
        self.state
    }

    /// Number of streams currently tracked
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of tracked streams with a mounted view
    pub fn live_view_count(&self) -> usize {
        self.streams.values().filter(|s| s.has_view()).count()
    }

    pub fn stream(&self, stream_id: &StreamId) -> Option<&StreamViewManager> {
        self.streams.get(stream_id)
    }

    /// Start tracking the participant and every stream it already exposes
    pub async fn attach(&mut self) {
        if self.attached {
            warn!(participant_id = %self.id, "Participant already attached, ignoring");
            return;
        }
        self.attached = true;
        self.state = self.participant.state();

        let streams = self.participant.video_streams();
        info!(
            participant_id = %self.id,
            state = ?self.state,
            streams = streams.len(),
            "Tracking remote participant"
        );

        for stream in streams {
            self.add_stream(stream).await;
        }
    }

    /// Route one participant-level event
    pub async fn handle_event(&mut self, event: ParticipantEvent) {
        match event {
            ParticipantEvent::StateChanged(state) => {
                debug!(participant_id = %self.id, previous = ?self.state, new = ?state, "Participant state changed");
                self.state = state;
            }
            ParticipantEvent::VideoStreamsUpdated { added, removed } => {
                for stream in added {
                    self.add_stream(stream).await;
                }
                for stream_id in removed {
                    self.remove_stream(&stream_id);
                }
            }
        }
    }

    /// Route an event for one of this participant's streams
    pub async fn handle_stream_event(&mut self, stream_id: &StreamId, event: StreamEvent) {
        match self.streams.get_mut(stream_id) {
            Some(view) => view.handle_event(event).await,
            None => debug!(
                participant_id = %self.id,
                stream_id = %stream_id,
                ?event,
                "Event for untracked stream, ignoring"
            ),
        }
    }

    /// Release every stream view; used when the participant leaves the call
    pub fn detach(&mut self) {
        for (_, mut view) in self.streams.drain() {
            view.detach();
        }
        if self.attached {
            info!(participant_id = %self.id, "Stopped tracking remote participant");
        }
        self.attached = false;
    }

    async fn add_stream(&mut self, stream: Arc<dyn RemoteVideoStream>) {
        let stream_id = stream.id();
        if self.streams.contains_key(&stream_id) {
            debug!(participant_id = %self.id, stream_id = %stream_id, "Stream already tracked");
            return;
        }

        let mut view = StreamViewManager::new(
            VideoSource::Remote {
                participant: self.id.clone(),
                stream,
            },
            self.renderer.clone(),
            self.gallery.clone(),
            self.request_timeout,
        );
        view.attach().await;
        self.streams.insert(stream_id, view);
    }

    fn remove_stream(&mut self, stream_id: &StreamId) {
        match self.streams.remove(stream_id) {
            Some(mut view) => view.detach(),
            None => debug!(participant_id = %self.id, stream_id = %stream_id, "Removed stream was not tracked"),
        }
    }
}

impl std::fmt::Debug for ParticipantTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantTracker")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("streams", &self.streams.len())
            .field("attached", &self.attached)
            .finish()
    }
}
