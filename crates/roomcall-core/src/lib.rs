//! # roomcall-core — call/room session coordination
//!
//! This crate bridges a media-engine room session with an OS-level call
//! provider (native telephony UI and audio routing). Two independently
//! driven state machines have to stay consistent: the media connection
//! (idle → connected → disconnected, with failure variants) and the call
//! session (outgoing/incoming → connecting → connected → held → ended).
//! Each is driven by asynchronous callbacks from a different subsystem with
//! no shared transaction boundary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │        CallCenter        │  orchestration facade
//! └───┬───────┬──────────┬───┘
//!     │       │          │
//! ┌───▼────┐ ┌▼────────┐ ┌▼─────────────┐
//! │Call    │ │Provider │ │ MediaSession │
//! │Manager │ │Bridge   │ │ (connector   │
//! │(gateway│ │(inbound │ │  state       │
//! │ out)   │ │ events) │ │  machine)    │
//! └───┬────┘ └┬───┬────┘ └──────┬───────┘
//!     │       │   │             │
//!  transactions  ActiveCall   MediaEngine
//!     │       │  (slot)         │
//!     ▼       ▼                 ▼
//!   OS telephony integration  media engine
//! ```
//!
//! User actions flow out through [`CallManager`] as transactions; their real
//! effect comes back asynchronously as perform-* events on
//! [`ProviderBridge`], which is the only writer of [`ActiveCall`] state.
//! Call state changes fan out synchronously to the OS UI reporting surface
//! and to the facade, which starts the media session and navigates once a
//! call connects. The media engine's own outcome lands in [`MediaSession`],
//! and every failure or disconnect path converges on the single wrap-up
//! callback the UI supplied.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roomcall_core::{
//!     AudioRoute, CallCenter, CallController, EngineConfig, MediaEngine,
//!     MediaSession, ProviderHandle, RoomTarget, TokioDispatcher,
//! };
//!
//! # async fn wire(
//! #     controller: Arc<dyn CallController>,
//! #     provider_handle: Arc<dyn ProviderHandle>,
//! #     audio: Arc<dyn AudioRoute>,
//! #     engine: Arc<dyn MediaEngine>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let media = Arc::new(MediaSession::construct(
//!     engine,
//!     EngineConfig::default(),
//!     Arc::new(TokioDispatcher),
//! )?);
//!
//! let center = CallCenter::builder()
//!     .controller(controller)
//!     .provider_handle(provider_handle)
//!     .audio_route(audio)
//!     .media(media)
//!     .on_call_connected(|call| println!("call {} connected", call.id()))
//!     .wrap_up(|| println!("call screen wrapped up"))
//!     .room(RoomTarget::new("portal.example.com", "team-room", "Alice"))
//!     .build()?;
//!
//! let call_id = center.start_outgoing("bob")?;
//! println!("outgoing call {call_id} requested");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod call;
pub mod center;
pub mod config;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod manager;
pub mod provider;

pub use call::{ActiveCall, CallDirection, CallId, CallStateChanged};
pub use center::{CallCenter, CallCenterBuilder, ConnectedCallback};
pub use config::{EngineConfig, HandleType, ProviderConfig, RoomTarget};
pub use connector::{
    ConnectFailReason, ConnectorState, DisconnectReason, EngineMode, EngineState, MediaEngine,
    MediaSession, WrapUpCallback,
};
pub use dispatch::{Dispatcher, TokioDispatcher};
pub use error::{CallError, CallResult};
pub use events::{EventEmitter, EventStream, RoomCallEvent};
pub use manager::{ActiveCallSlot, CallAction, CallController, CallManager, Transaction};
pub use provider::{
    ActionAck, AnswerCallAction, AudioRoute, CallUpdate, EndCallAction, ProviderBridge,
    ProviderHandle, SetHeldCallAction, StartCallAction,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
