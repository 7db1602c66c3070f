//! Configuration types for the call provider and media engine

use serde::{Deserialize, Serialize};

/// Kinds of remote handle the OS call UI can display and dial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleType {
    /// Free-form identifier (user name, room name)
    Generic,
    /// Telephone number
    PhoneNumber,
    /// Email address
    EmailAddress,
}

/// Configuration handed to the OS telephony integration when the provider
/// is registered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name shown in the native call UI
    pub localized_name: String,
    /// Capacity bound for a call group. This coordinator only drives
    /// single-call groups.
    pub maximum_calls_per_group: u32,
    /// Whether calls carry video
    pub supports_video: bool,
    /// Handle types the provider accepts
    pub supported_handle_types: Vec<HandleType>,
}

impl ProviderConfig {
    /// Create a configuration with the given display name and defaults for
    /// everything else
    pub fn new(localized_name: impl Into<String>) -> Self {
        Self {
            localized_name: localized_name.into(),
            ..Default::default()
        }
    }

    /// Set whether calls carry video
    pub fn with_supports_video(mut self, supports_video: bool) -> Self {
        self.supports_video = supports_video;
        self
    }

    /// Set the accepted handle types
    pub fn with_handle_types(mut self, types: Vec<HandleType>) -> Self {
        self.supported_handle_types = types;
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            localized_name: "Room Call".to_string(),
            maximum_calls_per_group: 1,
            supports_video: true,
            supported_handle_types: vec![HandleType::PhoneNumber],
        }
    }
}

/// Configuration applied to the media engine at initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on room participants
    pub max_participants: u32,
    /// Engine log filter string
    pub log_level: String,
    /// Whether to enable the engine's debug transport
    pub enable_debug: bool,
    /// Port for the debug transport when enabled
    pub debug_port: u16,
    /// Opaque experimental option string forwarded to the engine, if any
    pub experimental_options: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_participants: 8,
            log_level: "debug@engine warning".to_string(),
            enable_debug: false,
            debug_port: 7776,
            experimental_options: None,
        }
    }
}

/// Room the media session connects to once a call reaches `connected`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTarget {
    /// Portal/host address of the room service
    pub portal: String,
    /// Room key or id
    pub room_key: String,
    /// Display name to join as
    pub display_name: String,
    /// Room PIN, empty when the room has none
    pub pin: String,
}

impl RoomTarget {
    /// Create a room target without a PIN
    pub fn new(
        portal: impl Into<String>,
        room_key: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            portal: portal.into(),
            room_key: room_key.into(),
            display_name: display_name.into(),
            pin: String::new(),
        }
    }

    /// Set the room PIN
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = pin.into();
        self
    }
}
