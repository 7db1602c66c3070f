//! End-to-end facade tests: user actions flow out through the gateway, OS
//! confirmations flow back through the bridge, and the media session and UI
//! callbacks react to the resulting call transitions.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_stream::StreamExt;

use roomcall_core::{
    ActionAck, ActiveCall, AudioRoute, CallAction, CallCenter, CallController, CallError, CallId,
    CallResult, CallUpdate, ConnectorState, DisconnectReason, Dispatcher, EndCallAction,
    EngineConfig, EngineMode, EngineState, MediaEngine, MediaSession, ProviderHandle,
    RoomCallEvent, RoomTarget, StartCallAction, Transaction,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("roomcall_core=debug")
        .try_init();
}

/// Records submitted transactions and acknowledges them all
#[derive(Default)]
struct RecordingController {
    transactions: Mutex<Vec<Transaction>>,
}

#[async_trait]
impl CallController for RecordingController {
    async fn request_transaction(&self, transaction: Transaction) -> CallResult<()> {
        self.transactions.lock().push(transaction);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingProvider {
    connected: Mutex<Vec<CallId>>,
    accept_incoming: AtomicBool,
}

#[async_trait]
impl ProviderHandle for RecordingProvider {
    fn report_outgoing_connecting(&self, _call_id: CallId, _at: DateTime<Utc>) {}

    fn report_outgoing_connected(&self, call_id: CallId, _at: DateTime<Utc>) {
        self.connected.lock().push(call_id);
    }

    async fn report_new_incoming_call(
        &self,
        _call_id: CallId,
        _update: CallUpdate,
    ) -> CallResult<()> {
        if self.accept_incoming.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CallError::incoming_rejected("declined by system"))
        }
    }
}

struct OkAudio;

impl AudioRoute for OkAudio {
    fn configure_for_call(&self) -> CallResult<()> {
        Ok(())
    }
}

/// Runs UI tasks inline so tests observe navigation immediately
struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

struct FakeEngine {
    state: Mutex<EngineState>,
    connects: Mutex<Vec<(String, String, String, String)>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            state: Mutex::new(EngineState::Ready),
            connects: Mutex::new(Vec::new()),
        }
    }
}

impl MediaEngine for FakeEngine {
    fn initialize(&self, _config: &EngineConfig) -> bool {
        true
    }
    fn version(&self) -> String {
        "fake-1.0".to_string()
    }
    fn connect(&self, portal: &str, display_name: &str, room_key: &str, pin: &str) -> bool {
        self.connects.lock().push((
            portal.to_string(),
            display_name.to_string(),
            room_key.to_string(),
            pin.to_string(),
        ));
        *self.state.lock() = EngineState::Connecting;
        true
    }
    fn disconnect(&self) {
        *self.state.lock() = EngineState::Ready;
    }
    fn state(&self) -> EngineState {
        *self.state.lock()
    }
    fn set_camera_privacy(&self, _privacy: bool) {}
    fn set_microphone_privacy(&self, _privacy: bool) {}
    fn set_mode(&self, _mode: EngineMode) {}
    fn cycle_camera(&self) {}
    fn set_experimental_options(&self, _options: &str) {}
    fn enable_debug(&self, _port: u16, _log_filter: &str) {}
    fn disable_debug(&self) {}
    fn disable(&self) {}
}

struct Harness {
    center: Arc<CallCenter>,
    controller: Arc<RecordingController>,
    provider: Arc<RecordingProvider>,
    engine: Arc<FakeEngine>,
    navigated: Arc<Mutex<Vec<CallId>>>,
    wrapped: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    init_tracing();

    let controller = Arc::new(RecordingController::default());
    let provider = Arc::new(RecordingProvider::default());
    let engine = Arc::new(FakeEngine::default());
    let media = Arc::new(
        MediaSession::construct(
            engine.clone(),
            EngineConfig::default(),
            Arc::new(InlineDispatcher),
        )
        .expect("engine initializes"),
    );

    let navigated = Arc::new(Mutex::new(Vec::new()));
    let wrapped = Arc::new(AtomicUsize::new(0));

    let nav = navigated.clone();
    let wrap = wrapped.clone();
    let center = CallCenter::builder()
        .controller(controller.clone())
        .provider_handle(provider.clone())
        .audio_route(Arc::new(OkAudio))
        .media(media)
        .dispatcher(Arc::new(InlineDispatcher))
        .on_call_connected(move |call: Arc<ActiveCall>| {
            nav.lock().push(call.id());
        })
        .wrap_up(move || {
            wrap.fetch_add(1, Ordering::SeqCst);
        })
        .room(RoomTarget::new("portal.example.com", "team-room", "Alice"))
        .build()
        .expect("center builds");

    Harness {
        center,
        controller,
        provider,
        engine,
        navigated,
        wrapped,
    }
}

/// Wait for the gateway's spawned submit task to reach the controller
async fn submitted_start(controller: &RecordingController) -> StartCallAction {
    for _ in 0..50 {
        if let Some(transaction) = controller.transactions.lock().last().cloned() {
            if let CallAction::Start { call_id, handle } = transaction.action {
                return StartCallAction { call_id, handle };
            }
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("start transaction never submitted");
}

#[tokio::test]
async fn outgoing_call_connects_media_and_navigates() {
    let h = harness();
    let mut events = h.center.subscribe();

    let call_id = h.center.start_outgoing("alice").expect("start accepted");
    let action = submitted_start(&h.controller).await;
    assert_eq!(action.call_id, call_id);
    assert_eq!(action.handle, "alice");

    // OS confirms the start, then activates the audio session.
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_start(action, ack);
    rx.await.expect("ack delivered").expect("start fulfilled");
    h.center.bridge().audio_session_activated();

    let call = h.center.active_call().expect("call active");
    assert!(call.is_connected());
    assert_eq!(*h.navigated.lock(), vec![call_id]);
    assert_eq!(*h.provider.connected.lock(), vec![call_id]);
    assert_eq!(h.wrapped.load(Ordering::SeqCst), 0);

    // The media session was pointed at the configured room.
    let connects = h.engine.connects.lock();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].0, "portal.example.com");
    assert_eq!(connects[0].2, "team-room");
    drop(connects);

    let first = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .expect("event arrives")
        .expect("stream open")
        .expect("no lag");
    assert!(matches!(first, RoomCallEvent::OutgoingCallStarted { .. }));
}

#[tokio::test]
async fn timed_out_start_stays_pending_without_navigation() {
    let h = harness();

    let call_id = h.center.start_outgoing("bob").expect("start accepted");
    let action = submitted_start(&h.controller).await;
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_start(action.clone(), ack);
    rx.await.expect("ack delivered").expect("start fulfilled");

    h.center.bridge().action_timed_out(CallAction::Start {
        call_id: action.call_id,
        handle: action.handle,
    });

    let call = h.center.active_call().expect("slot still populated");
    assert_eq!(call.id(), call_id);
    assert!(call.is_connecting());
    assert!(!call.is_connected());
    assert!(h.navigated.lock().is_empty());
}

#[tokio::test]
async fn unexpected_media_disconnect_wraps_up_exactly_once() {
    let h = harness();

    let _ = h.center.start_outgoing("alice").expect("start accepted");
    let action = submitted_start(&h.controller).await;
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_start(action, ack);
    rx.await.expect("ack delivered").expect("start fulfilled");
    h.center.bridge().audio_session_activated();
    h.center.media().on_connect_success();

    h.center
        .media()
        .on_disconnected(DisconnectReason::ConnectionLost);

    assert_eq!(
        h.center.media().state(),
        ConnectorState::DisconnectedUnexpectedly
    );
    assert_eq!(h.wrapped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn call_cancelled_before_connecting_wraps_up_instead_of_navigating() {
    let h = harness();

    let call_id = h.center.start_outgoing("carol").expect("start accepted");
    let action = submitted_start(&h.controller).await;
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_start(action, ack);
    rx.await.expect("ack delivered").expect("start fulfilled");

    // The OS ends the call before the audio session ever activates.
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_end(EndCallAction { call_id }, ack);
    rx.await.expect("ack delivered").expect("end fulfilled");

    assert!(h.navigated.lock().is_empty());
    assert_eq!(h.wrapped.load(Ordering::SeqCst), 1);
    assert!(h.center.active_call().is_none());
}

#[tokio::test]
async fn hang_up_clears_locally_and_tolerates_the_late_os_end() {
    let h = harness();

    let call_id = h.center.start_outgoing("alice").expect("start accepted");
    let action = submitted_start(&h.controller).await;
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_start(action, ack);
    rx.await.expect("ack delivered").expect("start fulfilled");
    h.center.bridge().audio_session_activated();

    h.center.hang_up().expect("hang up accepted");
    assert!(h.center.active_call().is_none());

    // The OS confirmation arrives after the local clear; the bridge reports
    // NoActiveCall rather than crashing.
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_end(EndCallAction { call_id }, ack);
    assert!(matches!(
        rx.await.expect("ack delivered"),
        Err(CallError::NoActiveCall)
    ));

    // Nothing left to hang up.
    assert!(matches!(h.center.hang_up(), Err(CallError::NoActiveCall)));
}

#[tokio::test]
async fn second_outgoing_call_is_rejected_while_one_is_active() {
    let h = harness();

    let _ = h.center.start_outgoing("alice").expect("start accepted");
    let action = submitted_start(&h.controller).await;
    let (ack, rx) = ActionAck::channel();
    h.center.bridge().perform_start(action, ack);
    rx.await.expect("ack delivered").expect("start fulfilled");

    assert!(matches!(
        h.center.start_outgoing("eve"),
        Err(CallError::CallAlreadyActive)
    ));
}

#[tokio::test]
async fn rejected_incoming_call_is_dropped() {
    let h = harness();
    h.provider.accept_incoming.store(false, Ordering::SeqCst);

    let result = h.center.report_incoming("mallory").await;
    assert!(matches!(result, Err(CallError::IncomingCallRejected { .. })));
    assert!(h.center.active_call().is_none());
}

#[tokio::test]
async fn accepted_incoming_call_connects_on_audio_activation() {
    let h = harness();
    h.provider.accept_incoming.store(true, Ordering::SeqCst);

    let call_id = h.center.report_incoming("carol").await.expect("accepted");
    h.center.bridge().audio_session_activated();

    let call = h.center.active_call().expect("call active");
    assert_eq!(call.id(), call_id);
    assert!(call.is_connected());
    assert_eq!(*h.navigated.lock(), vec![call_id]);
}
