//! Call identity and connection state
//!
//! An [`ActiveCall`] represents one attempt to establish a two-party
//! audio/video session, from request to termination. The identity fields
//! (`id`, `remote_handle`, `direction`) are immutable; the connection flags
//! are mutated exclusively through the provided methods, and every flag flip
//! is delivered synchronously to all registered observers.
//!
//! State machine: `Created → Connecting → Connected → Ended`, with a direct
//! `Connecting → Ended` edge for calls cancelled before they ever connect,
//! and hold as an orthogonal sub-state of `Connected`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Unique identifier for a call attempt
pub type CallId = Uuid;

/// Direction of a call relative to the local user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Call placed by the local user
    Outgoing,
    /// Call received from a remote party
    Incoming,
}

/// Which connection flag changed on an [`ActiveCall`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStateChanged {
    /// The `connecting` flag was written
    Connecting,
    /// The `connected` flag was written
    Connected,
}

/// Observer invoked synchronously on every connection flag change.
///
/// Observers must not register further observers or mutate the call from
/// inside a notification; delivery holds the observer list lock.
pub type CallObserver = Box<dyn Fn(&ActiveCall, CallStateChanged) + Send + Sync>;

#[derive(Debug, Default)]
struct CallFlags {
    connecting: bool,
    connected: bool,
    on_hold: bool,
    connecting_started_at: Option<DateTime<Utc>>,
    connected_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// One call attempt: immutable identity plus mutable connection/hold state.
///
/// Timestamps are stamped on edges only: `connecting_started_at` exactly once
/// when `connecting` first becomes true, `connected_at` on the false→true
/// edge of `connected`, and `ended_at` on the true→false edge. A call that is
/// ended before it ever connected keeps `ended_at` unset.
pub struct ActiveCall {
    id: CallId,
    remote_handle: String,
    direction: CallDirection,
    flags: Mutex<CallFlags>,
    observers: Mutex<Vec<CallObserver>>,
}

impl ActiveCall {
    /// Create a call with a freshly assigned id
    pub fn new(remote_handle: impl Into<String>, direction: CallDirection) -> Self {
        Self::with_id(Uuid::new_v4(), remote_handle, direction)
    }

    /// Create a call with an externally assigned id (e.g. from an OS action)
    pub fn with_id(id: CallId, remote_handle: impl Into<String>, direction: CallDirection) -> Self {
        Self {
            id,
            remote_handle: remote_handle.into(),
            direction,
            flags: Mutex::new(CallFlags::default()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Unique identifier assigned at creation
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Identifier of the counterparty
    pub fn remote_handle(&self) -> &str {
        &self.remote_handle
    }

    /// Whether the call is outgoing or incoming
    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    /// Whether the call is currently dialing/establishing
    pub fn is_connecting(&self) -> bool {
        self.flags.lock().connecting
    }

    /// Whether the call's audio/media path is live
    pub fn is_connected(&self) -> bool {
        self.flags.lock().connected
    }

    /// Whether the call is on hold. Only meaningful while connected.
    pub fn is_on_hold(&self) -> bool {
        self.flags.lock().on_hold
    }

    /// When the call first started connecting, if it ever did
    pub fn connecting_started_at(&self) -> Option<DateTime<Utc>> {
        self.flags.lock().connecting_started_at
    }

    /// When the call transitioned into `connected`, if it ever did
    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.flags.lock().connected_at
    }

    /// When the call transitioned out of `connected`, if it ever did
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.flags.lock().ended_at
    }

    /// Register an observer for connection flag changes.
    ///
    /// Delivery is synchronous and exactly once per flag write, in
    /// registration order.
    pub fn on_state_changed<F>(&self, observer: F)
    where
        F: Fn(&ActiveCall, CallStateChanged) + Send + Sync + 'static,
    {
        self.observers.lock().push(Box::new(observer));
    }

    /// Set the `connecting` flag, stamping `connecting_started_at` on the
    /// first false→true transition.
    pub fn set_connecting(&self, connecting: bool) {
        {
            let mut flags = self.flags.lock();
            if connecting && !flags.connecting && flags.connecting_started_at.is_none() {
                flags.connecting_started_at = Some(Utc::now());
            }
            flags.connecting = connecting;
        }
        self.notify(CallStateChanged::Connecting);
    }

    /// Mark the call's media path as live. Used for outgoing calls once the
    /// audio session is actually active.
    pub fn start_call(&self) {
        self.set_connected(true);
    }

    /// Inbound equivalent of [`start_call`](Self::start_call)
    pub fn answer_call(&self) {
        self.set_connected(true);
        debug!(call_id = %self.id, "call has been answered");
    }

    /// Mark the call as ended
    pub fn end_call(&self) {
        self.set_connected(false);
        debug!(call_id = %self.id, "call has been ended");
    }

    /// Toggle hold. Does not affect the connected/connecting flags.
    pub fn set_on_hold(&self, on_hold: bool) {
        self.flags.lock().on_hold = on_hold;
    }

    fn set_connected(&self, connected: bool) {
        {
            let mut flags = self.flags.lock();
            if connected && !flags.connected {
                flags.connected_at = Some(Utc::now());
            } else if !connected && flags.connected {
                flags.ended_at = Some(Utc::now());
            }
            flags.connected = connected;
        }
        self.notify(CallStateChanged::Connected);
    }

    fn notify(&self, change: CallStateChanged) {
        let observers = self.observers.lock();
        for observer in observers.iter() {
            observer(self, change);
        }
    }
}

impl std::fmt::Debug for ActiveCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = self.flags.lock();
        f.debug_struct("ActiveCall")
            .field("id", &self.id)
            .field("remote_handle", &self.remote_handle)
            .field("direction", &self.direction)
            .field("connecting", &flags.connecting)
            .field("connected", &flags.connected)
            .field("on_hold", &flags.on_hold)
            .finish()
    }
}
