//! Session core implementation
//!
//! The client module is organized bottom-up along the call → participant → stream
//! hierarchy:
//!
//! - **`view`** - [`StreamViewManager`], one media stream to at most one live view
//! - **`participant`** - [`ParticipantTracker`], one view manager per remote stream
//! - **`controller`** - [`CallSessionController`], one call and the local camera stream
//! - **`orchestrator`** - [`SessionOrchestrator`], agent, device access and offers
//! - **`handle`** - [`SessionHandle`] and the single-task session loop
//! - **`capabilities`** - the capability set the UI renders from
//! - **`config`** / **`recovery`** - session settings and bounded platform requests

pub mod capabilities;
pub mod config;
pub mod controller;
pub mod handle;
pub mod orchestrator;
pub mod participant;
pub mod recovery;
pub mod view;

#[cfg(test)]
mod mock;

pub use capabilities::{Capabilities, CapabilityPublisher};
pub use config::SessionConfig;
pub use controller::CallSessionController;
pub use handle::{SessionCommand, SessionHandle};
pub use orchestrator::SessionOrchestrator;
pub use participant::ParticipantTracker;
pub use view::StreamViewManager;
