//! UI capability set
//!
//! The core never touches UI controls. Instead it publishes a [`Capabilities`] value
//! on every state transition and the UI renders its controls from the latest value.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Which user actions are currently possible and which panels are visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub initialize: bool,
    pub start_call: bool,
    pub hang_up: bool,
    pub accept: bool,
    pub start_video: bool,
    pub stop_video: bool,
    pub connected_banner: bool,
    pub remote_gallery: bool,
    pub local_video_container: bool,
}

impl Capabilities {
    /// Before initialization only `initialize` is possible
    pub fn initial() -> Self {
        Self {
            initialize: true,
            ..Self::default()
        }
    }

    /// Initialized with no call: only starting a call is possible
    pub fn ready() -> Self {
        Self {
            start_call: true,
            ..Self::default()
        }
    }

    /// An incoming offer can be accepted instead of starting a call
    pub fn offer_pending(mut self) -> Self {
        self.accept = true;
        self.start_call = false;
        self
    }

    /// A call reached `Connected`
    pub fn connected(mut self) -> Self {
        self.connected_banner = true;
        self.accept = false;
        self.start_call = false;
        self.hang_up = true;
        self.start_video = true;
        self.stop_video = true;
        self.remote_gallery = true;
        self
    }

    /// A call reached `Disconnected`
    pub fn disconnected(mut self) -> Self {
        self.connected_banner = false;
        self.start_call = true;
        self.hang_up = false;
        self.start_video = false;
        self.stop_video = false;
        self.remote_gallery = false;
        self.local_video_container = false;
        self
    }
}

/// Publishes capability changes to any number of UI observers
#[derive(Debug, Clone)]
pub struct CapabilityPublisher {
    tx: Arc<watch::Sender<Capabilities>>,
}

impl CapabilityPublisher {
    pub fn new(initial: Capabilities) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// The value observers currently see
    pub fn current(&self) -> Capabilities {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Capabilities> {
        self.tx.subscribe()
    }

    /// Apply a change; observers are only woken if the value actually changed
    pub fn update(&self, f: impl FnOnce(&mut Capabilities)) {
        self.tx.send_if_modified(|caps| {
            let before = *caps;
            f(caps);
            before != *caps
        });
    }

    /// Replace the whole value
    pub fn set(&self, caps: Capabilities) {
        self.update(|current| *current = caps);
    }
}
