//! Session orchestration
//!
//! The [`SessionOrchestrator`] is the single entry point a UI talks to. It owns the
//! signed-in agent, the device-access handle, one [`CallSessionController`] and at most
//! one pending incoming-call offer.
//!
//! Every operation takes `&mut self`, so user actions and platform events are handled
//! strictly one after another. That sequencing is the only mutual exclusion needed for
//! the "at most one call" and "at most one local stream" invariants.
//!
//! # Usage
//!
//! ```rust,no_run
//! # use callview_client_core::{SessionOrchestrator, SessionConfig, SessionResult};
//! # use callview_client_core::platform::{CallingPlatform, Surfaces};
//! # use std::sync::Arc;
//! # async fn example(platform: Arc<dyn CallingPlatform>, surfaces: Surfaces) -> SessionResult<()> {
//! let mut session = SessionOrchestrator::new(platform, surfaces, SessionConfig::default());
//! let mut capabilities = session.capabilities();
//!
//! session.initialize("user-access-token").await?;
//! session.handle_start_call("8:acs:bob", true).await?;
//!
//! // Feed platform events as they arrive
//! session.process_pending_events().await;
//! println!("hang up enabled: {}", capabilities.borrow_and_update().hang_up);
//!
//! session.hang_up().await?;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::call::{MediaAccess, OfferId};
use crate::error::{SessionError, SessionResult};
use crate::events::{AgentEvent, PlatformEvent, PlatformEventReceiver, PlatformEventSender, SessionEvent};
use crate::platform::{CallAgent, CallingPlatform, DeviceManager, IncomingCallOffer, Surfaces};

use super::capabilities::{Capabilities, CapabilityPublisher};
use super::config::SessionConfig;
use super::controller::CallSessionController;
use super::recovery::with_timeout;

/// Everything that exists only between `initialize` and `shutdown`
struct SessionContext {
    agent: Arc<dyn CallAgent>,
    controller: CallSessionController,
    pending_offer: Option<Arc<dyn IncomingCallOffer>>,
}

/// Top-level coordinator of a calling session
pub struct SessionOrchestrator {
    platform: Arc<dyn CallingPlatform>,
    surfaces: Surfaces,
    config: SessionConfig,
    capabilities: CapabilityPublisher,
    event_tx: broadcast::Sender<SessionEvent>,
    platform_tx: PlatformEventSender,
    pub(crate) platform_rx: Option<PlatformEventReceiver>,
    context: Option<SessionContext>,
}

impl SessionOrchestrator {
    pub fn new(platform: Arc<dyn CallingPlatform>, surfaces: Surfaces, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_buffer_size.max(1));
        let (platform_tx, platform_rx) = mpsc::unbounded_channel();
        Self {
            platform,
            surfaces,
            config,
            capabilities: CapabilityPublisher::new(Capabilities::initial()),
            event_tx,
            platform_tx,
            platform_rx: Some(platform_rx),
            context: None,
        }
    }

    // ===== OBSERVATION =====

    /// Watch the capability set the UI renders from
    pub fn capabilities(&self) -> watch::Receiver<Capabilities> {
        self.capabilities.subscribe()
    }

    pub fn current_capabilities(&self) -> Capabilities {
        self.capabilities.current()
    }

    /// Subscribe to session events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.event_tx.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Id of the offer currently waiting for accept or reject
    pub fn pending_offer(&self) -> Option<OfferId> {
        self.context
            .as_ref()
            .and_then(|ctx| ctx.pending_offer.as_ref())
            .map(|offer| offer.id())
    }

    /// The call controller, present once initialized
    pub fn controller(&self) -> Option<&CallSessionController> {
        self.context.as_ref().map(|ctx| &ctx.controller)
    }

    // ===== LIFECYCLE =====

    /// Sign in and request device permissions
    ///
    /// Initializing an already initialized session is a no-op. On any failure the
    /// freshly created agent is disposed again and `initialize` stays enabled.
    pub async fn initialize(&mut self, credential: &str) -> SessionResult<()> {
        let credential = credential.trim();
        if credential.is_empty() {
            warn!("Cannot initialize without a credential");
            return Err(SessionError::MissingCredential);
        }
        if self.context.is_some() {
            warn!("Session already initialized, ignoring");
            return Ok(());
        }

        let timeout = self.config.request_timeout();
        let agent = with_timeout(
            "create_agent",
            timeout,
            self.platform.create_agent(credential, self.platform_tx.clone()),
        )
        .await?;
        info!("Calling agent created");

        let devices = match self.prepare_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                if let Err(dispose_err) = with_timeout("dispose_agent", timeout, agent.dispose()).await {
                    warn!(error = %dispose_err, "Failed to dispose agent after initialization failure");
                }
                return Err(e);
            }
        };

        let controller = CallSessionController::new(
            agent.clone(),
            devices,
            self.surfaces.clone(),
            self.config.clone(),
            self.capabilities.clone(),
            self.event_tx.clone(),
        );
        self.context = Some(SessionContext {
            agent,
            controller,
            pending_offer: None,
        });

        self.capabilities.set(Capabilities::ready());
        info!("Session initialized");
        self.emit(SessionEvent::Initialized { timestamp: Utc::now() });
        Ok(())
    }

    /// Release every call resource and the agent
    ///
    /// Views and the local stream are released without talking to the call; the agent
    /// is disposed regardless. Capabilities return to their initial value.
    pub async fn shutdown(&mut self) {
        let Some(mut ctx) = self.context.take() else {
            debug!("Shutdown requested for an uninitialized session");
            return;
        };

        ctx.controller.release_all().await;
        if let Some(offer) = ctx.pending_offer.take() {
            debug!(offer_id = %offer.id(), "Dropping pending offer on shutdown");
        }
        if let Err(e) = with_timeout("dispose_agent", self.config.request_timeout(), ctx.agent.dispose()).await {
            warn!(error = %e, "Agent disposal failed during shutdown");
        }

        self.capabilities.set(Capabilities::initial());
        info!("Session shut down");
    }

    // ===== USER ACTIONS =====

    /// Start an outgoing call, tearing down whatever call came before
    pub async fn handle_start_call(&mut self, target: &str, with_video: bool) -> SessionResult<()> {
        if target.trim().is_empty() {
            warn!("Cannot start a call without a target");
            return Err(SessionError::InvalidTarget);
        }
        let ctx = Self::require_context(&mut self.context, "start_call")?;

        ctx.controller.reset().await;
        let result = ctx.controller.start(target, with_video).await;
        match &result {
            Ok(()) => Self::enter_call(&self.capabilities, ctx),
            Err(_) => Self::restore_idle(&self.capabilities, ctx),
        }
        result
    }

    /// Accept the pending incoming offer
    ///
    /// The offer stays pending until the platform confirms the accept, so a failed
    /// accept can be re-triggered.
    pub async fn accept_incoming(&mut self, with_video: bool) -> SessionResult<()> {
        let ctx = Self::require_context(&mut self.context, "accept")?;
        let Some(offer) = ctx.pending_offer.clone() else {
            warn!("No incoming call to accept");
            return Err(SessionError::inconsistent("accept", "no pending incoming call"));
        };
        let offer_id = offer.id();

        ctx.controller.reset().await;
        let result = ctx.controller.accept_incoming(offer, with_video).await;
        match &result {
            Ok(()) => {
                ctx.pending_offer = None;
                let _ = self.event_tx.send(SessionEvent::IncomingCallCleared { offer_id });
                Self::enter_call(&self.capabilities, ctx);
            }
            Err(e) => {
                warn!(offer_id = %offer_id, error = %e, "Accept failed, offer still pending");
                Self::restore_idle(&self.capabilities, ctx);
            }
        }
        result
    }

    /// Decline the pending incoming offer
    pub async fn reject_incoming(&mut self) -> SessionResult<()> {
        let timeout = self.config.request_timeout();
        let ctx = Self::require_context(&mut self.context, "reject")?;
        let Some(offer) = ctx.pending_offer.take() else {
            warn!("No incoming call to reject");
            return Err(SessionError::inconsistent("reject", "no pending incoming call"));
        };

        let offer_id = offer.id();
        let result = with_timeout("reject", timeout, offer.reject()).await;
        info!(offer_id = %offer_id, success = result.is_ok(), "Rejected incoming call");

        let _ = self.event_tx.send(SessionEvent::IncomingCallCleared { offer_id });
        Self::restore_idle(&self.capabilities, ctx);
        result
    }

    /// Hang up the current call
    pub async fn hang_up(&mut self) -> SessionResult<()> {
        let ctx = Self::require_context(&mut self.context, "hang_up")?;
        let had_call = ctx.controller.has_active_call();
        let result = ctx.controller.hang_up().await;
        if had_call {
            Self::restore_idle(&self.capabilities, ctx);
        }
        result
    }

    pub async fn start_local_video(&mut self) -> SessionResult<()> {
        let ctx = Self::require_context(&mut self.context, "start_video")?;
        ctx.controller.start_local_video().await
    }

    pub async fn stop_local_video(&mut self) -> SessionResult<()> {
        let ctx = Self::require_context(&mut self.context, "stop_video")?;
        ctx.controller.stop_local_video().await
    }

    // ===== PLATFORM EVENTS =====

    /// Handle every platform event already queued, without waiting for more
    ///
    /// Returns the number of events handled.
    pub async fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match self.platform_rx.as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some(event) = next else {
                break;
            };
            self.handle_platform_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Route one platform event down the call → participant → stream hierarchy
    pub async fn handle_platform_event(&mut self, event: PlatformEvent) {
        let Some(ctx) = self.context.as_mut() else {
            debug!(kind = event.kind(), "Platform event before initialization, ignoring");
            return;
        };

        match event {
            PlatformEvent::Agent(AgentEvent::IncomingCall(offer)) => {
                Self::on_incoming_call(&self.capabilities, &self.event_tx, ctx, offer);
            }
            PlatformEvent::Agent(AgentEvent::IncomingCallEnded { offer_id }) => {
                let matches = ctx.pending_offer.as_ref().map(|o| o.id() == offer_id).unwrap_or(false);
                if !matches {
                    debug!(offer_id = %offer_id, "Withdrawn offer is not pending, ignoring");
                    return;
                }
                ctx.pending_offer = None;
                info!(offer_id = %offer_id, "Incoming call withdrawn");
                let _ = self.event_tx.send(SessionEvent::IncomingCallCleared { offer_id });
                Self::restore_idle(&self.capabilities, ctx);
            }
            PlatformEvent::Call { call_id, event } => {
                let had_call = ctx.controller.has_active_call();
                ctx.controller.handle_call_event(&call_id, event).await;
                if had_call && !ctx.controller.has_active_call() {
                    Self::restore_idle(&self.capabilities, ctx);
                }
            }
            PlatformEvent::Participant { participant_id, event } => {
                ctx.controller.handle_participant_event(&participant_id, event).await;
            }
            PlatformEvent::Stream { owner, stream_id, event } => {
                ctx.controller.handle_stream_event(&owner, &stream_id, event).await;
            }
        }
    }

    // ===== INTERNALS =====

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn require_context<'a>(
        context: &'a mut Option<SessionContext>,
        operation: &str,
    ) -> SessionResult<&'a mut SessionContext> {
        match context.as_mut() {
            Some(ctx) => Ok(ctx),
            None => {
                warn!(operation = operation, "Session not initialized");
                Err(SessionError::inconsistent(operation, "session not initialized"))
            }
        }
    }

    /// Last offer wins: a second offer silently replaces the first one
    fn on_incoming_call(
        capabilities: &CapabilityPublisher,
        event_tx: &broadcast::Sender<SessionEvent>,
        ctx: &mut SessionContext,
        offer: Arc<dyn IncomingCallOffer>,
    ) {
        let offer_id = offer.id();
        let caller = offer.caller();
        let replaced = ctx.pending_offer.replace(offer);
        if let Some(previous) = &replaced {
            warn!(previous = %previous.id(), current = %offer_id, "Pending incoming call replaced by a newer offer");
        }
        info!(offer_id = %offer_id, caller = %caller, "Incoming call");

        if !ctx.controller.has_active_call() {
            capabilities.update(|caps| *caps = caps.offer_pending());
        }
        let _ = event_tx.send(SessionEvent::IncomingCall {
            offer_id,
            caller,
            replaced_pending: replaced.is_some(),
            timestamp: Utc::now(),
        });
    }

    /// A call is being set up or is live: both entry points are closed
    fn enter_call(capabilities: &CapabilityPublisher, ctx: &SessionContext) {
        if !ctx.controller.has_active_call() {
            return;
        }
        capabilities.update(|caps| {
            caps.accept = false;
            caps.start_call = false;
        });
    }

    /// Entry points once no call is active: accept while an offer waits, else start
    fn restore_idle(capabilities: &CapabilityPublisher, ctx: &SessionContext) {
        if ctx.controller.has_active_call() {
            return;
        }
        let pending = ctx.pending_offer.is_some();
        capabilities.update(|caps| {
            caps.accept = pending;
            caps.start_call = !pending;
        });
    }

    async fn prepare_devices(&self) -> SessionResult<Arc<dyn DeviceManager>> {
        let timeout = self.config.request_timeout();
        let devices = with_timeout("device_manager", timeout, self.platform.device_manager()).await?;

        let mut wanted = Vec::new();
        if self.config.request_video_permission {
            wanted.push(MediaAccess::Video);
        }
        if self.config.request_audio_permission {
            wanted.push(MediaAccess::Audio);
        }
        for access in wanted {
            let granted = with_timeout("request_permission", timeout, devices.request_permission(access)).await?;
            if !granted {
                warn!(access = ?access, "Device permission denied");
                return Err(SessionError::platform("request_permission", format!("{:?} access denied", access)));
            }
        }
        debug!("Device permissions granted");
        Ok(devices)
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("initialized", &self.is_initialized())
            .field("pending_offer", &self.pending_offer())
            .field("controller", &self.controller())
            .field("capabilities", &self.current_capabilities())
            .finish()
    }
}
