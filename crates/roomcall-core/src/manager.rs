//! Call action gateway
//!
//! [`CallManager`] is the outbound half of the OS telephony integration: it
//! turns user intents (start, end, hold) into transactions submitted to the
//! [`CallController`], and it owns nothing else. The integration's
//! acknowledgment is awaited on a spawned task and logged; it never mutates
//! call state. Only the provider bridge's inbound callbacks do that, so there
//! is a single write path for every call field.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::call::{ActiveCall, CallDirection, CallId};
use crate::error::{CallError, CallResult};

/// A single call-control action submitted to the OS telephony integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallAction {
    /// Start an outgoing call to `handle`
    Start {
        /// Id assigned to the call being started
        call_id: CallId,
        /// Counterparty handle to dial
        handle: String,
    },
    /// End the call
    End {
        /// Id of the call to end
        call_id: CallId,
    },
    /// Place the call on hold or resume it
    SetHeld {
        /// Id of the call to hold or resume
        call_id: CallId,
        /// True to hold, false to resume
        on_hold: bool,
    },
}

impl CallAction {
    /// Id of the call this action targets
    pub fn call_id(&self) -> CallId {
        match self {
            CallAction::Start { call_id, .. }
            | CallAction::End { call_id }
            | CallAction::SetHeld { call_id, .. } => *call_id,
        }
    }
}

/// A transaction wrapping one action for submission to the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The action being requested
    pub action: CallAction,
}

impl Transaction {
    /// Wrap an action in a transaction
    pub fn new(action: CallAction) -> Self {
        Self { action }
    }
}

/// Outbound boundary to the OS telephony integration.
///
/// `request_transaction` resolves with the integration's acknowledgment of
/// the *request*, not with the action's effect. The effect arrives later as a
/// perform-* callback on the provider bridge, or not at all.
#[async_trait]
pub trait CallController: Send + Sync {
    /// Submit a transaction to the OS
    async fn request_transaction(&self, transaction: Transaction) -> CallResult<()>;
}

/// The single-call-at-a-time slot shared by the gateway and the provider
/// bridge.
///
/// Every check-then-set on the occupant runs under one lock, so perform-start
/// and perform-end arriving from different threads cannot interleave inside
/// the slot update.
#[derive(Default)]
pub struct ActiveCallSlot {
    current: Mutex<Option<Arc<ActiveCall>>>,
}

impl ActiveCallSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a call in the slot, replacing any occupant
    pub fn place(&self, call: Arc<ActiveCall>) {
        *self.current.lock() = Some(call);
    }

    /// Place a call only if the slot is empty, returning whether it was
    /// placed.
    ///
    /// Used where the emptiness check and the placement are separated by an
    /// await: the occupancy must be re-checked under the lock at placement
    /// time.
    pub fn place_if_empty(&self, call: Arc<ActiveCall>) -> bool {
        let mut current = self.current.lock();
        if current.is_some() {
            return false;
        }
        *current = Some(call);
        true
    }

    /// The current occupant, if any
    pub fn active(&self) -> Option<Arc<ActiveCall>> {
        self.current.lock().clone()
    }

    /// Whether the slot is empty
    pub fn is_empty(&self) -> bool {
        self.current.lock().is_none()
    }

    /// Clear the slot unconditionally, returning the previous occupant
    pub fn clear(&self) -> Option<Arc<ActiveCall>> {
        self.current.lock().take()
    }

    /// Clear the slot only if it still holds `call_id`.
    ///
    /// Idempotent: a second clear for the same call is a no-op, and a clear
    /// racing a newly placed call leaves the new call untouched.
    pub fn clear_if(&self, call_id: CallId) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(call) if call.id() == call_id => {
                *current = None;
                true
            }
            _ => false,
        }
    }
}

/// Serializes call-control actions against the OS telephony integration
pub struct CallManager {
    controller: Arc<dyn CallController>,
    slot: Arc<ActiveCallSlot>,
    pending_outgoing: Arc<DashMap<CallId, Arc<ActiveCall>>>,
}

impl CallManager {
    /// Create a gateway over the given controller and shared slot
    pub fn new(
        controller: Arc<dyn CallController>,
        slot: Arc<ActiveCallSlot>,
        pending_outgoing: Arc<DashMap<CallId, Arc<ActiveCall>>>,
    ) -> Self {
        Self {
            controller,
            slot,
            pending_outgoing,
        }
    }

    /// Request an outgoing call to `remote_handle`.
    ///
    /// Constructs a fresh outgoing [`ActiveCall`], parks it until the OS
    /// confirms the start via the provider bridge, and submits the start
    /// transaction. Returns immediately with the call handle; the call only
    /// becomes active once the bridge's perform-start callback places it.
    pub fn request_start(&self, remote_handle: &str) -> CallResult<Arc<ActiveCall>> {
        if !self.slot.is_empty() {
            return Err(CallError::CallAlreadyActive);
        }

        let call = Arc::new(ActiveCall::new(remote_handle, CallDirection::Outgoing));
        self.pending_outgoing.insert(call.id(), call.clone());

        self.submit(Transaction::new(CallAction::Start {
            call_id: call.id(),
            handle: remote_handle.to_string(),
        }));

        Ok(call)
    }

    /// Request that the active call be ended
    pub fn request_end(&self) -> CallResult<()> {
        let call = self.slot.active().ok_or(CallError::NoActiveCall)?;
        self.submit(Transaction::new(CallAction::End { call_id: call.id() }));
        Ok(())
    }

    /// Request that the active call be held or resumed
    pub fn request_hold(&self, on_hold: bool) -> CallResult<()> {
        let call = self.slot.active().ok_or(CallError::NoActiveCall)?;
        self.submit(Transaction::new(CallAction::SetHeld {
            call_id: call.id(),
            on_hold,
        }));
        Ok(())
    }

    /// The call currently occupying the active slot
    pub fn active_call(&self) -> Option<Arc<ActiveCall>> {
        self.slot.active()
    }

    /// Submit-and-forget: the acknowledgment is logged on a spawned task and
    /// deliberately does not touch call state.
    ///
    /// A refused `Start` does unpark its pending call: the OS never saw the
    /// action, so no perform-start will ever arrive to claim it.
    fn submit(&self, transaction: Transaction) {
        let controller = self.controller.clone();
        let pending_outgoing = self.pending_outgoing.clone();
        tokio::spawn(async move {
            match controller.request_transaction(transaction.clone()).await {
                Ok(()) => {
                    debug!(action = ?transaction.action, "transaction request sent");
                }
                Err(error) => {
                    warn!(action = ?transaction.action, %error, "transaction request failed");
                    if let CallAction::Start { call_id, .. } = &transaction.action {
                        pending_outgoing.remove(call_id);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct RefusingController;

    #[async_trait]
    impl CallController for RefusingController {
        async fn request_transaction(&self, _transaction: Transaction) -> CallResult<()> {
            Err(CallError::transaction("controller offline"))
        }
    }

    #[tokio::test]
    async fn refused_start_unparks_the_pending_call() {
        let slot = Arc::new(ActiveCallSlot::new());
        let pending = Arc::new(DashMap::new());
        let manager = CallManager::new(
            Arc::new(RefusingController),
            slot.clone(),
            pending.clone(),
        );

        // Every attempt is refused; none may leave a parked call behind.
        for _ in 0..5 {
            manager.request_start("alice").expect("request accepted");
            for _ in 0..50 {
                if pending.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            assert!(pending.is_empty());
            assert!(slot.is_empty());
        }
    }

    #[test]
    fn slot_place_if_empty_refuses_an_occupied_slot() {
        let slot = ActiveCallSlot::new();
        let first = Arc::new(ActiveCall::new("alice", CallDirection::Outgoing));
        let second = Arc::new(ActiveCall::new("bob", CallDirection::Incoming));

        assert!(slot.place_if_empty(first.clone()));
        assert!(!slot.place_if_empty(second));
        assert_eq!(slot.active().map(|c| c.id()), Some(first.id()));
    }

    #[test]
    fn slot_clear_if_is_identity_conditioned() {
        let slot = ActiveCallSlot::new();
        let first = Arc::new(ActiveCall::new("alice", CallDirection::Outgoing));
        let second = Arc::new(ActiveCall::new("bob", CallDirection::Outgoing));

        slot.place(first.clone());
        assert!(slot.clear_if(first.id()));
        assert!(slot.is_empty());

        // Second clear for the same call is a no-op.
        assert!(!slot.clear_if(first.id()));

        // A stale clear does not drop a newly placed call.
        slot.place(second.clone());
        assert!(!slot.clear_if(first.id()));
        assert_eq!(slot.active().map(|c| c.id()), Some(second.id()));
    }
}
