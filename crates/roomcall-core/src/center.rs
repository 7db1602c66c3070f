//! Call orchestration facade
//!
//! [`CallCenter`] is the single entry point the application uses: report an
//! outgoing or incoming call, hang up, and receive the connected/ended
//! transitions that start or stop the media session. It wires the gateway,
//! the provider bridge, and the media session together so that either side's
//! failure path converges on the one wrap-up callback the UI supplied.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::call::{ActiveCall, CallDirection, CallId, CallStateChanged};
use crate::config::{ProviderConfig, RoomTarget};
use crate::connector::{MediaSession, WrapUpCallback};
use crate::dispatch::{Dispatcher, TokioDispatcher};
use crate::error::{CallError, CallResult};
use crate::events::{EventEmitter, EventStream, RoomCallEvent};
use crate::manager::{ActiveCallSlot, CallController, CallManager};
use crate::provider::{AudioRoute, ProviderBridge, ProviderHandle};

/// Navigation callback invoked (on the UI executor) when a call's media path
/// goes live
pub type ConnectedCallback = Arc<dyn Fn(Arc<ActiveCall>) + Send + Sync>;

/// Orchestrates call lifecycle between the OS telephony integration and the
/// media session
pub struct CallCenter {
    manager: Arc<CallManager>,
    bridge: Arc<ProviderBridge>,
    media: Arc<MediaSession>,
    slot: Arc<ActiveCallSlot>,
    dispatcher: Arc<dyn Dispatcher>,
    emitter: EventEmitter,
    on_connected: ConnectedCallback,
    room: Arc<Mutex<Option<RoomTarget>>>,
}

impl CallCenter {
    /// Start building a call center
    pub fn builder() -> CallCenterBuilder {
        CallCenterBuilder::new()
    }

    /// Request an outgoing call to `remote_handle`.
    ///
    /// The call's media session starts and the navigation callback fires only
    /// once the OS confirms the start and activates the audio session; a call
    /// that ends before ever connecting wraps up instead.
    pub fn start_outgoing(&self, remote_handle: &str) -> CallResult<CallId> {
        let call = self.manager.request_start(remote_handle)?;
        self.attach_call_observer(&call);
        self.emitter.emit(RoomCallEvent::OutgoingCallStarted {
            call_id: call.id(),
            remote_handle: remote_handle.to_string(),
        });
        Ok(call.id())
    }

    /// Report an incoming call from `remote_handle` to the native UI.
    ///
    /// Resolves once the OS accepts or rejects the call; a rejected call is
    /// dropped and the active slot stays empty.
    pub async fn report_incoming(&self, remote_handle: &str) -> CallResult<CallId> {
        let call = Arc::new(ActiveCall::new(remote_handle, CallDirection::Incoming));
        self.attach_call_observer(&call);
        self.bridge.report_incoming(call.clone()).await?;
        self.emitter.emit(RoomCallEvent::IncomingCallReported {
            call_id: call.id(),
            remote_handle: remote_handle.to_string(),
        });
        Ok(call.id())
    }

    /// End the active call.
    ///
    /// Submits the end action and clears the locally held call reference.
    /// The provider bridge clears the slot again when the OS confirms the
    /// end; the double clear is intentional idempotent cleanup.
    pub fn hang_up(&self) -> CallResult<()> {
        self.manager.request_end()?;
        self.slot.clear();
        Ok(())
    }

    /// Hold or resume the active call
    pub fn set_held(&self, on_hold: bool) -> CallResult<()> {
        self.manager.request_hold(on_hold)
    }

    /// Set the room the media session joins when a call connects
    pub fn set_room(&self, room: RoomTarget) {
        *self.room.lock() = Some(room);
    }

    /// The call currently occupying the active slot
    pub fn active_call(&self) -> Option<Arc<ActiveCall>> {
        self.manager.active_call()
    }

    /// Subscribe to coordinator events
    pub fn subscribe(&self) -> EventStream {
        self.emitter.subscribe()
    }

    /// The outbound action gateway
    pub fn manager(&self) -> &Arc<CallManager> {
        &self.manager
    }

    /// The inbound provider bridge. Platform glue routes OS callbacks here.
    pub fn bridge(&self) -> &Arc<ProviderBridge> {
        &self.bridge
    }

    /// The media session
    pub fn media(&self) -> &Arc<MediaSession> {
        &self.media
    }

    /// Forward the `connected` transitions of `call` into media session
    /// start/stop and UI navigation.
    fn attach_call_observer(&self, call: &Arc<ActiveCall>) {
        let weak = Arc::downgrade(call);
        let media = self.media.clone();
        let dispatcher = self.dispatcher.clone();
        let emitter = self.emitter.clone();
        let on_connected = self.on_connected.clone();
        let room = self.room.clone();

        call.on_state_changed(move |_, change| {
            if change != CallStateChanged::Connected {
                return;
            }
            let Some(call) = weak.upgrade() else {
                return;
            };

            if call.is_connected() {
                match room.lock().clone() {
                    Some(target) => {
                        if !media.connect(&target) {
                            warn!(call_id = %call.id(), "media session connect was not accepted");
                        }
                    }
                    None => {
                        warn!(call_id = %call.id(), "no room target configured, media session not started");
                    }
                }
                emitter.emit(RoomCallEvent::CallConnected { call_id: call.id() });
                let callback = on_connected.clone();
                let connected_call = call.clone();
                dispatcher.dispatch(Box::new(move || callback(connected_call)));
            } else {
                // Ended, or cancelled before ever connecting. Either way the
                // call screen wraps up; connect-side state decides whether a
                // disconnect is needed first.
                emitter.emit(RoomCallEvent::CallEnded { call_id: call.id() });
                media.wrap_call();
            }
        });
    }

    fn spawn_media_watcher(&self) {
        let mut rx = self.media.subscribe();
        let emitter = self.emitter.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                emitter.emit(RoomCallEvent::MediaStateChanged { state });
            }
        });
    }
}

/// Builder for [`CallCenter`]
#[derive(Default)]
pub struct CallCenterBuilder {
    provider_config: ProviderConfig,
    controller: Option<Arc<dyn CallController>>,
    provider_handle: Option<Arc<dyn ProviderHandle>>,
    audio: Option<Arc<dyn AudioRoute>>,
    media: Option<Arc<MediaSession>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    on_connected: Option<ConnectedCallback>,
    wrap_up: Option<WrapUpCallback>,
    room: Option<RoomTarget>,
}

impl CallCenterBuilder {
    /// Create a builder with default provider configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration
    pub fn provider_config(mut self, config: ProviderConfig) -> Self {
        self.provider_config = config;
        self
    }

    /// Set the outbound OS transaction controller (required)
    pub fn controller(mut self, controller: Arc<dyn CallController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Set the OS reporting surface (required)
    pub fn provider_handle(mut self, handle: Arc<dyn ProviderHandle>) -> Self {
        self.provider_handle = Some(handle);
        self
    }

    /// Set the audio route used before start/answer fulfillment (required)
    pub fn audio_route(mut self, audio: Arc<dyn AudioRoute>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Set the media session (required)
    pub fn media(mut self, media: Arc<MediaSession>) -> Self {
        self.media = Some(media);
        self
    }

    /// Set the UI dispatcher. Defaults to [`TokioDispatcher`].
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the navigation callback fired when a call connects (required)
    pub fn on_call_connected<F>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<ActiveCall>) + Send + Sync + 'static,
    {
        self.on_connected = Some(Arc::new(callback));
        self
    }

    /// Set the wrap-up callback fired on failure, cancellation, and
    /// disconnect (required)
    pub fn wrap_up<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.wrap_up = Some(Arc::new(callback));
        self
    }

    /// Set the initial room target
    pub fn room(mut self, room: RoomTarget) -> Self {
        self.room = Some(room);
        self
    }

    /// Wire everything together.
    ///
    /// Must run inside a tokio runtime; the center spawns its media state
    /// watcher at build time.
    pub fn build(self) -> CallResult<Arc<CallCenter>> {
        let controller = self
            .controller
            .ok_or_else(|| CallError::config("call controller is required"))?;
        let provider_handle = self
            .provider_handle
            .ok_or_else(|| CallError::config("provider handle is required"))?;
        let audio = self
            .audio
            .ok_or_else(|| CallError::config("audio route is required"))?;
        let media = self
            .media
            .ok_or_else(|| CallError::config("media session is required"))?;
        let on_connected = self
            .on_connected
            .ok_or_else(|| CallError::config("connected callback is required"))?;
        let wrap_up = self
            .wrap_up
            .ok_or_else(|| CallError::config("wrap-up callback is required"))?;
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(TokioDispatcher));

        let slot = Arc::new(ActiveCallSlot::new());
        let pending_outgoing = Arc::new(DashMap::new());
        let manager = Arc::new(CallManager::new(
            controller,
            slot.clone(),
            pending_outgoing.clone(),
        ));
        let bridge = Arc::new(ProviderBridge::new(
            self.provider_config,
            provider_handle,
            audio,
            slot.clone(),
            pending_outgoing,
        ));

        media.set_wrap_up(wrap_up);

        let center = CallCenter {
            manager,
            bridge,
            media,
            slot,
            dispatcher,
            emitter: EventEmitter::default(),
            on_connected,
            room: Arc::new(Mutex::new(self.room)),
        };
        center.spawn_media_watcher();
        Ok(Arc::new(center))
    }
}
