//! Event-loop driver
//!
//! [`SessionOrchestrator::run`] owns the orchestrator on a single task and interleaves
//! UI commands with platform events, one at a time. UI code talks to it through a
//! cloneable [`SessionHandle`]; every command carries a `oneshot` reply channel.

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::events::SessionEvent;

use super::capabilities::Capabilities;
use super::orchestrator::SessionOrchestrator;

/// Capacity of the command queue between handles and the loop
const COMMAND_BUFFER_SIZE: usize = 32;

type Reply = oneshot::Sender<SessionResult<()>>;

/// A user action queued for the session loop
#[derive(Debug)]
pub enum SessionCommand {
    Initialize { credential: String, reply: Reply },
    StartCall { target: String, with_video: bool, reply: Reply },
    AcceptIncoming { with_video: bool, reply: Reply },
    RejectIncoming { reply: Reply },
    HangUp { reply: Reply },
    StartVideo { reply: Reply },
    StopVideo { reply: Reply },
    /// Release everything and stop the loop
    Shutdown { reply: oneshot::Sender<()> },
}

impl SessionCommand {
    fn name(&self) -> &'static str {
        match self {
            SessionCommand::Initialize { .. } => "initialize",
            SessionCommand::StartCall { .. } => "start_call",
            SessionCommand::AcceptIncoming { .. } => "accept",
            SessionCommand::RejectIncoming { .. } => "reject",
            SessionCommand::HangUp { .. } => "hang_up",
            SessionCommand::StartVideo { .. } => "start_video",
            SessionCommand::StopVideo { .. } => "stop_video",
            SessionCommand::Shutdown { .. } => "shutdown",
        }
    }
}

/// Cloneable front end of a running session loop
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    capabilities: watch::Receiver<Capabilities>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn initialize(&self, credential: impl Into<String>) -> SessionResult<()> {
        let credential = credential.into();
        self.request("initialize", |reply| SessionCommand::Initialize { credential, reply })
            .await
    }

    pub async fn start_call(&self, target: impl Into<String>, with_video: bool) -> SessionResult<()> {
        let target = target.into();
        self.request("start_call", |reply| SessionCommand::StartCall {
            target,
            with_video,
            reply,
        })
        .await
    }

    pub async fn accept_incoming(&self, with_video: bool) -> SessionResult<()> {
        self.request("accept", |reply| SessionCommand::AcceptIncoming { with_video, reply })
            .await
    }

    pub async fn reject_incoming(&self) -> SessionResult<()> {
        self.request("reject", |reply| SessionCommand::RejectIncoming { reply }).await
    }

    pub async fn hang_up(&self) -> SessionResult<()> {
        self.request("hang_up", |reply| SessionCommand::HangUp { reply }).await
    }

    pub async fn start_video(&self) -> SessionResult<()> {
        self.request("start_video", |reply| SessionCommand::StartVideo { reply }).await
    }

    pub async fn stop_video(&self) -> SessionResult<()> {
        self.request("stop_video", |reply| SessionCommand::StopVideo { reply }).await
    }

    /// Stop the loop after releasing every resource
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(SessionCommand::Shutdown { reply }).await.is_err() {
            debug!("Session loop already stopped");
            return;
        }
        let _ = done.await;
    }

    /// Watch the capability set
    pub fn capabilities(&self) -> watch::Receiver<Capabilities> {
        self.capabilities.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request(
        &self,
        operation: &str,
        command: impl FnOnce(Reply) -> SessionCommand,
    ) -> SessionResult<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::inconsistent(operation, "session loop stopped"))?;
        response
            .await
            .map_err(|_| SessionError::inconsistent(operation, "session loop dropped the request"))?
    }
}

impl SessionOrchestrator {
    /// Start the session loop on the tokio runtime
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let handle = SessionHandle {
            commands,
            capabilities: self.capabilities(),
            events: self.event_sender(),
        };
        (handle, tokio::spawn(self.run(rx)))
    }

    /// Serve commands and platform events until shutdown or until every handle is gone
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let Some(mut platform_events) = self.platform_rx.take() else {
            warn!("Platform event receiver already taken, session loop not started");
            return;
        };
        info!("Session loop started");

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("All session handles dropped");
                        break;
                    };
                    if !self.execute(command).await {
                        break;
                    }
                }
                Some(event) = platform_events.recv() => {
                    debug!(kind = event.kind(), "Platform event");
                    self.handle_platform_event(event).await;
                }
            }
        }

        self.shutdown().await;
        info!("Session loop stopped");
    }

    /// Run one command; `false` stops the loop
    async fn execute(&mut self, command: SessionCommand) -> bool {
        debug!(command = command.name(), "Session command");
        match command {
            SessionCommand::Initialize { credential, reply } => {
                let _ = reply.send(self.initialize(&credential).await);
            }
            SessionCommand::StartCall { target, with_video, reply } => {
                let _ = reply.send(self.handle_start_call(&target, with_video).await);
            }
            SessionCommand::AcceptIncoming { with_video, reply } => {
                let _ = reply.send(self.accept_incoming(with_video).await);
            }
            SessionCommand::RejectIncoming { reply } => {
                let _ = reply.send(self.reject_incoming().await);
            }
            SessionCommand::HangUp { reply } => {
                let _ = reply.send(self.hang_up().await);
            }
            SessionCommand::StartVideo { reply } => {
                let _ = reply.send(self.start_local_video().await);
            }
            SessionCommand::StopVideo { reply } => {
                let _ = reply.send(self.stop_local_video().await);
            }
            SessionCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }
}
