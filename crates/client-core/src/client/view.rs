//! Stream view management
//!
//! A [`StreamViewManager`] keeps exactly one video stream in sync with at most one
//! rendered view. The view lives only while the stream is available:
//!
//! ```text
//!   available=true                        available=false / detach()
//! ──────────────────► create view ──► container appended ──────────────► view disposed,
//!                     (renderer)      to the mount                       container removed
//! ```
//!
//! A loading indicator is shown inside the container while the stream is available
//! but not yet receiving frames.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::call::{StreamId, StreamOwner};
use crate::error::SessionResult;
use crate::events::StreamEvent;
use crate::platform::{
    ContainerId, RenderedView, RenderingSurface, StreamContainer, VideoSource, ViewMount,
};

use super::recovery::with_timeout;

/// A view currently mounted for the stream
struct LiveView {
    view: Box<dyn RenderedView>,
    container: StreamContainer,
    /// Whether the loading indicator is inside the container right now
    loading_indicator: bool,
}

/// Owns the 0-or-1 relationship between one stream and its rendered view
pub struct StreamViewManager {
    source: VideoSource,
    renderer: Arc<dyn RenderingSurface>,
    mount: Arc<dyn ViewMount>,
    request_timeout: Duration,
    attached: bool,
    live: Option<LiveView>,
}

impl StreamViewManager {
    pub fn new(
        source: VideoSource,
        renderer: Arc<dyn RenderingSurface>,
        mount: Arc<dyn ViewMount>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            renderer,
            mount,
            request_timeout,
            attached: false,
            live: None,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.source.id()
    }

    pub fn owner(&self) -> StreamOwner {
        self.source.owner()
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether a view is currently mounted
    pub fn has_view(&self) -> bool {
        self.live.is_some()
    }

    /// Container of the mounted view, if any
    pub fn container_id(&self) -> Option<ContainerId> {
        self.live.as_ref().map(|live| live.container.id)
    }

    /// Whether the loading indicator is currently shown
    pub fn is_loading(&self) -> bool {
        self.live.as_ref().map(|live| live.loading_indicator).unwrap_or(false)
    }

    /// Start tracking the stream, creating a view right away if it is available
    ///
    /// Attaching twice is a no-op with a warning; it never creates a second view.
    pub async fn attach(&mut self) {
        if self.attached {
            warn!(
                stream_id = %self.stream_id(),
                owner = %self.owner(),
                "Stream view already attached, ignoring"
            );
            return;
        }
        self.attached = true;

        debug!(
            stream_id = %self.stream_id(),
            owner = %self.owner(),
            available = self.source.is_available(),
            receiving = self.source.is_receiving(),
            "Attached stream view manager"
        );

        if self.source.is_available() {
            self.show().await;
        }
    }

    /// Route one stream event
    pub async fn handle_event(&mut self, event: StreamEvent) {
        if !self.attached {
            debug!(stream_id = %self.stream_id(), ?event, "Event for detached stream view, ignoring");
            return;
        }
        match event {
            StreamEvent::IsAvailableChanged(true) => self.show().await,
            StreamEvent::IsAvailableChanged(false) => self.hide(),
            StreamEvent::IsReceivingChanged(receiving) => self.sync_loading_indicator(receiving),
        }
    }

    /// Release the view and stop tracking the stream
    ///
    /// Must run before the stream is discarded. Safe to call repeatedly.
    pub fn detach(&mut self) {
        self.hide();
        if self.attached {
            debug!(stream_id = %self.stream_id(), owner = %self.owner(), "Detached stream view manager");
        }
        self.attached = false;
    }

    async fn show(&mut self) {
        if self.live.is_some() {
            debug!(stream_id = %self.stream_id(), "View already present");
            return;
        }

        match self.create_view().await {
            Ok(view) => {
                let container = StreamContainer {
                    id: ContainerId::new(),
                    owner: self.owner(),
                    stream_id: self.stream_id(),
                    view: view.target(),
                };
                self.mount.append(&container);
                info!(
                    stream_id = %container.stream_id,
                    owner = %container.owner,
                    container = %container.id,
                    "Rendered stream view"
                );
                self.live = Some(LiveView {
                    view,
                    container,
                    loading_indicator: false,
                });
                let receiving = self.source.is_receiving();
                self.sync_loading_indicator(receiving);
            }
            Err(e) => {
                // Nothing was appended; the stream simply shows no video until the
                // next availability change.
                error!(
                    stream_id = %self.stream_id(),
                    owner = %self.owner(),
                    error = %e,
                    "Failed to create stream view"
                );
            }
        }
    }

    async fn create_view(&self) -> SessionResult<Box<dyn RenderedView>> {
        with_timeout(
            "create_view",
            self.request_timeout,
            self.renderer.create_view(&self.source),
        )
        .await
    }

    fn hide(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        live.view.dispose();
        self.mount.remove(&live.container.id);
        info!(
            stream_id = %live.container.stream_id,
            owner = %live.container.owner,
            container = %live.container.id,
            "Disposed stream view"
        );
    }

    fn sync_loading_indicator(&mut self, receiving: bool) {
        let Some(live) = self.live.as_mut() else {
            // Unavailable streams have no container to hold an indicator
            return;
        };
        let wanted = !receiving;
        if live.loading_indicator == wanted {
            return;
        }
        self.mount.set_loading_indicator(&live.container.id, wanted);
        live.loading_indicator = wanted;
        debug!(stream_id = %live.container.stream_id, loading = wanted, "Loading indicator toggled");
    }
}

impl Drop for StreamViewManager {
    fn drop(&mut self) {
        if self.live.is_some() {
            warn!(stream_id = %self.stream_id(), "Stream view manager dropped with a live view");
            self.hide();
        }
    }
}

impl std::fmt::Debug for StreamViewManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamViewManager")
            .field("stream_id", &self.stream_id())
            .field("owner", &self.owner())
            .field("attached", &self.attached)
            .field("has_view", &self.has_view())
            .finish()
    }
}
