//! Call provider bridge
//!
//! The inbound half of the OS telephony integration. The OS drives this
//! bridge with perform-* lifecycle events, audio session transitions, and
//! provider resets; the bridge is the only component that mutates
//! [`ActiveCall`] state in response. Every perform-* event carries an
//! [`ActionAck`] that must be fulfilled or failed before the handler returns.
//!
//! The bridge also owns the outbound `report_new_incoming_call` path that
//! pushes a fresh incoming call into the native call UI.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::call::{ActiveCall, CallDirection, CallId, CallStateChanged};
use crate::config::ProviderConfig;
use crate::error::{CallError, CallResult};
use crate::manager::{ActiveCallSlot, CallAction};

/// Per-action acknowledgment channel back to the OS.
///
/// The OS delivers one of these with every perform-* event; exactly one of
/// [`fulfill`](Self::fulfill) or [`fail`](Self::fail) must be called.
/// Dropping the ack unresolved closes the channel, which the OS side treats
/// as an undelivered callback.
pub struct ActionAck {
    tx: oneshot::Sender<CallResult<()>>,
}

impl ActionAck {
    /// Create an ack and the receiver the OS side awaits
    pub fn channel() -> (Self, oneshot::Receiver<CallResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report the action as performed
    pub fn fulfill(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Report the action as failed
    pub fn fail(self, error: CallError) {
        let _ = self.tx.send(Err(error));
    }
}

/// OS request to start an outgoing call
#[derive(Debug, Clone)]
pub struct StartCallAction {
    /// Call id the OS assigned (or echoed back from the gateway)
    pub call_id: CallId,
    /// Counterparty handle being dialed
    pub handle: String,
}

/// OS request to answer the incoming call
#[derive(Debug, Clone)]
pub struct AnswerCallAction {
    /// Call id being answered
    pub call_id: CallId,
}

/// OS request to end the call
#[derive(Debug, Clone)]
pub struct EndCallAction {
    /// Call id being ended
    pub call_id: CallId,
}

/// OS request to hold or resume the call
#[derive(Debug, Clone)]
pub struct SetHeldCallAction {
    /// Call id being held or resumed
    pub call_id: CallId,
    /// True to hold, false to resume
    pub on_hold: bool,
}

/// Descriptor for a new incoming call pushed to the native UI
#[derive(Debug, Clone)]
pub struct CallUpdate {
    /// Counterparty handle to display
    pub remote_handle: String,
    /// Whether the call carries video
    pub has_video: bool,
}

/// Outbound reporting surface of the OS telephony integration.
///
/// The connecting/connected reports are fire-and-forget UI updates invoked
/// synchronously from call observers; the incoming-call report resolves with
/// the OS's accept/reject decision.
#[async_trait]
pub trait ProviderHandle: Send + Sync {
    /// Tell the native UI an outgoing call started connecting
    fn report_outgoing_connecting(&self, call_id: CallId, at: DateTime<Utc>);

    /// Tell the native UI an outgoing call connected
    fn report_outgoing_connected(&self, call_id: CallId, at: DateTime<Utc>);

    /// Push a new incoming call into the native UI. Resolves once the OS
    /// accepts or rejects the call.
    async fn report_new_incoming_call(&self, call_id: CallId, update: CallUpdate)
        -> CallResult<()>;
}

/// Audio path configuration for the call, performed before start/answer
/// actions are fulfilled. Failures are logged, never fatal.
pub trait AudioRoute: Send + Sync {
    /// Configure the audio route for two-way call audio
    fn configure_for_call(&self) -> CallResult<()>;
}

/// Inbound state machine driven by OS-originated call events
pub struct ProviderBridge {
    config: ProviderConfig,
    handle: Arc<dyn ProviderHandle>,
    audio: Arc<dyn AudioRoute>,
    slot: Arc<ActiveCallSlot>,
    pending_outgoing: Arc<DashMap<CallId, Arc<ActiveCall>>>,
    /// Which call the OS activated the audio session for. Deactivation only
    /// clears the slot while this call still occupies it.
    audio_session_owner: Mutex<Option<CallId>>,
}

impl ProviderBridge {
    /// Create a bridge over the given OS handle and shared call slot
    pub fn new(
        config: ProviderConfig,
        handle: Arc<dyn ProviderHandle>,
        audio: Arc<dyn AudioRoute>,
        slot: Arc<ActiveCallSlot>,
        pending_outgoing: Arc<DashMap<CallId, Arc<ActiveCall>>>,
    ) -> Self {
        info!(provider = %config.localized_name, "call provider registered");
        Self {
            config,
            handle,
            audio,
            slot,
            pending_outgoing,
            audio_session_owner: Mutex::new(None),
        }
    }

    /// The OS discarded all calls (crash recovery). Clears the slot
    /// unconditionally.
    pub fn did_reset(&self) {
        info!("provider reset, dropping active call");
        self.slot.clear();
        *self.audio_session_owner.lock() = None;
    }

    /// The OS confirmed an outgoing start action.
    ///
    /// Attaches the parked call from the gateway (or constructs one when the
    /// start originated in the native UI), wires its state changes to the OS
    /// reporting surface, fulfills the ack, places the call active, and marks
    /// it connecting.
    pub fn perform_start(&self, action: StartCallAction, ack: ActionAck) {
        self.configure_audio();

        let call = self
            .pending_outgoing
            .remove(&action.call_id)
            .map(|(_, call)| call)
            .unwrap_or_else(|| {
                debug!(call_id = %action.call_id, "start action for unknown call, constructing");
                Arc::new(ActiveCall::with_id(
                    action.call_id,
                    action.handle.clone(),
                    CallDirection::Outgoing,
                ))
            });

        let handle = self.handle.clone();
        call.on_state_changed(move |call, change| match change {
            CallStateChanged::Connecting => {
                if call.is_connecting() {
                    if let Some(at) = call.connecting_started_at() {
                        handle.report_outgoing_connecting(call.id(), at);
                    }
                }
            }
            CallStateChanged::Connected => {
                if call.is_connected() {
                    if let Some(at) = call.connected_at() {
                        handle.report_outgoing_connected(call.id(), at);
                    }
                }
            }
        });

        ack.fulfill();
        self.slot.place(call.clone());
        call.set_connecting(true);
    }

    /// The OS confirmed an answer action for the incoming call
    pub fn perform_answer(&self, action: AnswerCallAction, ack: ActionAck) {
        if self.slot.active().is_none() {
            warn!(call_id = %action.call_id, "answer action with empty slot");
            ack.fail(CallError::NoActiveCall);
            return;
        }

        self.configure_audio();
        ack.fulfill();
    }

    /// The OS confirmed an end action. Ends the active call and clears the
    /// slot, conditioned on the ended call's identity.
    pub fn perform_end(&self, action: EndCallAction, ack: ActionAck) {
        let Some(call) = self.slot.active() else {
            warn!(call_id = %action.call_id, "end action with empty slot");
            ack.fail(CallError::NoActiveCall);
            return;
        };

        call.end_call();
        self.slot.clear_if(call.id());
        ack.fulfill();
    }

    /// The OS confirmed a hold/resume action
    pub fn perform_set_held(&self, action: SetHeldCallAction, ack: ActionAck) {
        let Some(call) = self.slot.active() else {
            warn!(call_id = %action.call_id, "set-held action with empty slot");
            ack.fail(CallError::NoActiveCall);
            return;
        };

        call.set_on_hold(action.on_hold);
        debug!(call_id = %call.id(), on_hold = action.on_hold, "hold state updated");
        ack.fulfill();
    }

    /// The OS gave up waiting for an action. Log-only: no compensating
    /// transition is defined, so a timed-out start leaves the slot pending.
    pub fn action_timed_out(&self, action: CallAction) {
        let error = CallError::action_timeout(format!("{action:?}"));
        warn!(call_id = %action.call_id(), %error, "provider action timed out");
    }

    /// The OS activated the call audio session. This is the signal that the
    /// call's media path is live from the telephony side.
    pub fn audio_session_activated(&self) {
        debug!("audio session activated");
        if let Some(call) = self.slot.active() {
            *self.audio_session_owner.lock() = Some(call.id());
            call.start_call();
        }
    }

    /// The OS deactivated the call audio session. Clears the slot only while
    /// it still holds the call the session was activated for, so a stale
    /// deactivation cannot drop a just-placed second call.
    pub fn audio_session_deactivated(&self) {
        debug!("audio session deactivated");
        if let Some(owner) = self.audio_session_owner.lock().take() {
            self.slot.clear_if(owner);
        }
    }

    /// Push a new incoming call into the native UI.
    ///
    /// On OS acceptance the call becomes active, unless another call claimed
    /// the slot while the report was in flight; on rejection it is logged
    /// and dropped with the slot left untouched. No retry.
    pub async fn report_incoming(&self, call: Arc<ActiveCall>) -> CallResult<()> {
        info!(call_id = %call.id(), handle = %call.remote_handle(), "reporting incoming call");

        if !self.slot.is_empty() {
            warn!(call_id = %call.id(), "incoming call while another is active");
            return Err(CallError::CallAlreadyActive);
        }

        let update = CallUpdate {
            remote_handle: call.remote_handle().to_string(),
            has_video: self.config.supports_video,
        };

        match self.handle.report_new_incoming_call(call.id(), update).await {
            Ok(()) => {
                // The slot may have been claimed during the await above;
                // occupancy is re-checked under the lock at placement.
                if self.slot.place_if_empty(call.clone()) {
                    Ok(())
                } else {
                    warn!(call_id = %call.id(), "call started during incoming report, dropping incoming call");
                    Err(CallError::CallAlreadyActive)
                }
            }
            Err(error) => {
                warn!(call_id = %call.id(), %error, "incoming call rejected by OS");
                Err(error)
            }
        }
    }

    /// Best-effort audio path setup; misconfiguration is logged only
    fn configure_audio(&self) {
        if let Err(error) = self.audio.configure_for_call() {
            warn!(%error, "audio session configuration failed");
        }
    }
}
