//! Error types for the roomcall-core library

use thiserror::Error;

/// Result type for call coordination operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors that can occur while coordinating a call
#[derive(Debug, Error)]
pub enum CallError {
    /// An action was requested while the active call slot is empty
    #[error("No active call")]
    NoActiveCall,

    /// A new call was requested while another call occupies the active slot
    #[error("A call is already active")]
    CallAlreadyActive,

    /// The OS telephony integration did not respond to an action in time
    #[error("Call action timed out: {action}")]
    ActionTimeout {
        /// Description of the action that timed out
        action: String,
    },

    /// The OS refused to present the incoming call
    #[error("Incoming call rejected: {reason}")]
    IncomingCallRejected {
        /// Reason reported by the OS telephony integration
        reason: String,
    },

    /// The media engine library failed to initialize
    #[error("Media engine initialization failed: {reason}")]
    EngineInitFailed {
        /// Failure detail from the engine
        reason: String,
    },

    /// The OS telephony integration failed to accept a transaction
    #[error("Transaction request failed: {message}")]
    Transaction {
        /// Failure detail from the integration
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was missing or inconsistent
        message: String,
    },
}

impl CallError {
    /// Create an action timeout error
    pub fn action_timeout(action: impl Into<String>) -> Self {
        Self::ActionTimeout {
            action: action.into(),
        }
    }

    /// Create an incoming-call rejection error
    pub fn incoming_rejected(reason: impl Into<String>) -> Self {
        Self::IncomingCallRejected {
            reason: reason.into(),
        }
    }

    /// Create an engine initialization error
    pub fn engine_init(reason: impl Into<String>) -> Self {
        Self::EngineInitFailed {
            reason: reason.into(),
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
