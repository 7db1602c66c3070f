//! Media connector state machine
//!
//! [`MediaSession`] owns the engine-facing half of the coordinator: it holds
//! the injected [`MediaEngine`] handle, tracks the engine's connection
//! outcome as an observable [`ConnectorState`], and converges the engine's
//! failure/disconnect paths onto the single wrap-up callback the UI supplies.
//!
//! State machine: `Idle → Connected | ConnectionFailure`;
//! `Connected → Disconnected | DisconnectedUnexpectedly`. Every non-idle
//! state is stable until the next engine event; there is no auto-reset.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::{CallError, CallResult};

/// Connection outcome of the media engine, as seen by the rest of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    /// No connection attempted yet, or engine returned to rest
    Idle,
    /// The room connection is live
    Connected,
    /// The connection attempt failed before ever connecting
    ConnectionFailure,
    /// Expected, user/peer-initiated disconnect
    Disconnected,
    /// Disconnect the user did not ask for (network loss, engine error)
    DisconnectedUnexpectedly,
}

/// Engine-reported reason a connection attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailReason {
    /// The transport could not be established
    ConnectionFailed,
    /// The transport dropped mid-handshake
    ConnectionLost,
    /// The attempt timed out
    ConnectionTimeout,
    /// The room token was not accepted
    InvalidToken,
    /// The room is at capacity
    RoomFull,
    /// Media negotiation failed
    MediaFailed,
    /// Any other engine-reported failure
    Miscellaneous,
}

/// Engine-reported reason a live connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The expected, user/peer-initiated disconnect
    Disconnected,
    /// The transport dropped
    ConnectionLost,
    /// The connection timed out
    ConnectionTimeout,
    /// The room stopped responding
    NoResponse,
    /// The session was terminated by the service
    Terminated,
    /// Any other engine-reported reason
    Miscellaneous,
}

impl DisconnectReason {
    /// Whether this is the expected, user/peer-initiated disconnect code
    pub fn is_expected(&self) -> bool {
        matches!(self, DisconnectReason::Disconnected)
    }
}

/// Engine rendering/processing mode, switched on app lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Full processing, app visible
    Foreground,
    /// Reduced processing, app backgrounded
    Background,
}

/// Coarse engine-side connection state, used only by wrap-up sequencing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed but not ready
    Idle,
    /// Ready to connect
    Ready,
    /// Connection in progress
    Connecting,
    /// Room connection live
    Connected,
    /// Teardown in progress
    Disconnecting,
}

/// The media engine boundary (consumed, never owned by this crate).
///
/// `connect` is fire-and-forget: a `true` return means the attempt was
/// accepted, and the outcome arrives later through the session's
/// `on_connect_success` / `on_connect_failure` / `on_disconnected` signals.
pub trait MediaEngine: Send + Sync {
    /// One-time library initialization. Returns false on failure.
    fn initialize(&self, config: &EngineConfig) -> bool;

    /// Engine library version string
    fn version(&self) -> String;

    /// Start connecting to a room as a guest
    fn connect(&self, portal: &str, display_name: &str, room_key: &str, pin: &str) -> bool;

    /// Tear down the live connection
    fn disconnect(&self);

    /// Current engine-side connection state
    fn state(&self) -> EngineState;

    /// Stop or resume sending local video
    fn set_camera_privacy(&self, privacy: bool);

    /// Stop or resume sending local audio
    fn set_microphone_privacy(&self, privacy: bool);

    /// Switch processing mode on app lifecycle transitions
    fn set_mode(&self, mode: EngineMode);

    /// Select the next local camera
    fn cycle_camera(&self);

    /// Forward an experimental option string to the engine
    fn set_experimental_options(&self, options: &str);

    /// Enable the engine's debug transport
    fn enable_debug(&self, port: u16, log_filter: &str);

    /// Disable the engine's debug transport
    fn disable_debug(&self);

    /// Release engine resources at app exit
    fn disable(&self);
}

/// Callback that closes or reacts to a terminated call screen
pub type WrapUpCallback = Arc<dyn Fn() + Send + Sync>;

/// Owns the media engine handle and its observable connection state
pub struct MediaSession {
    engine: Arc<dyn MediaEngine>,
    dispatcher: Arc<dyn Dispatcher>,
    state_tx: watch::Sender<ConnectorState>,
    wrap_up: Mutex<Option<WrapUpCallback>>,
    /// Privacy the user chose, restored when the app returns to foreground
    camera_privacy: Mutex<bool>,
}

impl MediaSession {
    /// Initialize the engine and build the session around it.
    ///
    /// Initialization failure is fatal to the whole session and surfaces as
    /// [`CallError::EngineInitFailed`].
    pub fn construct(
        engine: Arc<dyn MediaEngine>,
        config: EngineConfig,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> CallResult<Self> {
        if !engine.initialize(&config) {
            return Err(CallError::engine_init("engine library failed to initialize"));
        }

        info!(version = %engine.version(), "media engine initialized");

        if config.enable_debug {
            engine.enable_debug(config.debug_port, &config.log_level);
        }
        if let Some(options) = &config.experimental_options {
            engine.set_experimental_options(options);
        }

        let (state_tx, _) = watch::channel(ConnectorState::Idle);
        Ok(Self {
            engine,
            dispatcher,
            state_tx,
            wrap_up: Mutex::new(None),
            camera_privacy: Mutex::new(false),
        })
    }

    /// Register the UI's wrap-up callback, replacing any previous one
    pub fn set_wrap_up(&self, callback: WrapUpCallback) {
        *self.wrap_up.lock() = Some(callback);
    }

    /// Current connector state
    pub fn state(&self) -> ConnectorState {
        *self.state_tx.borrow()
    }

    /// Observe connector state replacements
    pub fn subscribe(&self) -> watch::Receiver<ConnectorState> {
        self.state_tx.subscribe()
    }

    /// Engine library version
    pub fn version(&self) -> String {
        self.engine.version()
    }

    /// Start connecting the engine to `room`. Returns whether the attempt
    /// was accepted; the outcome arrives via the connection signals.
    pub fn connect(&self, room: &crate::config::RoomTarget) -> bool {
        debug!(portal = %room.portal, room = %room.room_key, "connecting media session");
        self.engine
            .connect(&room.portal, &room.display_name, &room.room_key, &room.pin)
    }

    /// Tear down the live engine connection
    pub fn disconnect(&self) {
        self.engine.disconnect();
    }

    /// Converge on the wrap-up callback: a connected engine is disconnected
    /// first (the wrap-up then fires from `on_disconnected`), an idle engine
    /// wraps up immediately, and an in-flight transition is left to its own
    /// completion signal.
    pub fn wrap_call(&self) {
        match self.engine.state() {
            EngineState::Connected => {
                debug!("engine still connected, disconnecting first");
                self.engine.disconnect();
            }
            EngineState::Idle | EngineState::Ready => self.invoke_wrap_up(),
            EngineState::Connecting | EngineState::Disconnecting => {
                debug!("engine transition in flight, deferring wrap-up");
            }
        }
    }

    /// Engine signal: room connection established
    pub fn on_connect_success(&self) {
        info!("media engine connected");
        self.replace_state(ConnectorState::Connected);
        // Connecting successfully does not, by itself, close anything.
    }

    /// Engine signal: connection attempt failed
    pub fn on_connect_failure(&self, reason: ConnectFailReason) {
        warn!(?reason, "media engine connection failed");
        self.replace_state(ConnectorState::ConnectionFailure);
        self.invoke_wrap_up();
    }

    /// Engine signal: live connection ended
    pub fn on_disconnected(&self, reason: DisconnectReason) {
        info!(?reason, "media engine disconnected");
        if reason.is_expected() {
            self.replace_state(ConnectorState::Disconnected);
        } else {
            self.replace_state(ConnectorState::DisconnectedUnexpectedly);
        }
        self.invoke_wrap_up();
    }

    /// Stop or resume sending local video, remembering the choice across
    /// background transitions
    pub fn set_camera_privacy(&self, privacy: bool) {
        *self.camera_privacy.lock() = privacy;
        self.engine.set_camera_privacy(privacy);
    }

    /// Stop or resume sending local audio
    pub fn set_microphone_privacy(&self, privacy: bool) {
        self.engine.set_microphone_privacy(privacy);
    }

    /// Select the next local camera
    pub fn cycle_camera(&self) {
        self.engine.cycle_camera();
    }

    /// App moved to the background: mask the camera and reduce processing
    pub fn on_app_sleep(&self) {
        self.engine.set_camera_privacy(true);
        self.engine.set_mode(EngineMode::Background);
    }

    /// App returned to the foreground: restore processing and the user's
    /// chosen camera privacy
    pub fn on_app_resume(&self) {
        self.engine.set_mode(EngineMode::Foreground);
        self.engine.set_camera_privacy(*self.camera_privacy.lock());
    }

    /// Release the engine at app exit
    pub fn dispose(&self) {
        info!("releasing media engine");
        self.engine.disable();
    }

    fn replace_state(&self, state: ConnectorState) {
        self.state_tx.send_replace(state);
    }

    fn invoke_wrap_up(&self) {
        let Some(callback) = self.wrap_up.lock().clone() else {
            return;
        };
        self.dispatcher.dispatch(Box::new(move || callback()));
    }
}
