//! # Callview Client Core
//!
//! Call-session synchronization core for browser video calling. The crate keeps the
//! state of a calling platform (agent, calls, remote participants, video streams) in
//! sync with a rendering surface, and derives the set of user actions that are
//! possible at any moment.
//!
//! The platform, the device layer and the rendering surface are collaborators the
//! embedding application implements through the traits in [`platform`]. The UI never
//! reads session state directly; it renders from the [`Capabilities`] value published
//! on every transition.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use callview_client_core::{SessionConfig, SessionOrchestrator};
//! # use callview_client_core::platform::{CallingPlatform, Surfaces};
//! # use std::sync::Arc;
//! # async fn example(platform: Arc<dyn CallingPlatform>, surfaces: Surfaces) -> Result<(), Box<dyn std::error::Error>> {
//! let (session, _task) = SessionOrchestrator::new(platform, surfaces, SessionConfig::default()).spawn();
//! let mut capabilities = session.capabilities();
//!
//! session.initialize("user-access-token").await?;
//! session.start_call("8:acs:bob", true).await?;
//!
//! while capabilities.changed().await.is_ok() {
//!     if capabilities.borrow().connected_banner {
//!         println!("Call connected");
//!         break;
//!     }
//! }
//!
//! session.hang_up().await?;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod error;
pub mod events;
pub mod platform;

pub use call::{CallEndReason, CallId, CallState, OfferId, ParticipantId, StreamId, StreamOwner};
pub use client::{Capabilities, SessionConfig, SessionHandle, SessionOrchestrator};
pub use error::{SessionError, SessionResult};
pub use events::{PlatformEvent, SessionEvent};

/// Client-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
