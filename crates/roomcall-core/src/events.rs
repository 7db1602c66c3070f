//! Application-facing event stream
//!
//! The orchestration facade publishes coarse lifecycle events on a broadcast
//! channel so that UI layers can observe call and media activity without
//! registering per-call observers.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::call::CallId;
use crate::connector::ConnectorState;

/// Events emitted by the call coordinator
#[derive(Debug, Clone)]
pub enum RoomCallEvent {
    /// An outgoing call was requested through the gateway
    OutgoingCallStarted {
        /// Id assigned to the new call
        call_id: CallId,
        /// Counterparty handle
        remote_handle: String,
    },

    /// An incoming call was accepted by the OS UI
    IncomingCallReported {
        /// Id assigned to the new call
        call_id: CallId,
        /// Counterparty handle
        remote_handle: String,
    },

    /// A call's media path went live
    CallConnected {
        /// The connected call
        call_id: CallId,
    },

    /// A call ended or was cancelled before connecting
    CallEnded {
        /// The ended call
        call_id: CallId,
    },

    /// The media connector state machine replaced its state
    MediaStateChanged {
        /// New connector state
        state: ConnectorState,
    },
}

/// Stream of [`RoomCallEvent`]s for a single subscriber
pub type EventStream = BroadcastStream<RoomCallEvent>;

/// Broadcast emitter for [`RoomCallEvent`]s
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<RoomCallEvent>,
}

impl EventEmitter {
    /// Create an emitter with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event. Send errors (no receivers) are ignored.
    pub fn emit(&self, event: RoomCallEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this point
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
