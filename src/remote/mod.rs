//! Remote backend gateway.
//!
//! The bridge only depends on [`RemoteGateway`]; [`HomeAssistantClient`] is the
//! REST implementation used by the binary.

pub mod client;

use crate::store::Device;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use client::HomeAssistantClient;

/// Value of the `source` field attached to every fired event
pub const EVENT_SOURCE: &str = "android_media_bridge";

/// `input_text` helper mirroring the device roster across installs
pub const DEVICE_LIST_ENTITY: &str = "input_text.android_media_bridge_devices";

pub const EVENT_MEDIA_PLAY: &str = "android_media_play";
pub const EVENT_MEDIA_PAUSE: &str = "android_media_pause";
pub const EVENT_MEDIA_NEXT: &str = "android_media_next";
pub const EVENT_MEDIA_PREVIOUS: &str = "android_media_previous";
pub const EVENT_MEDIA_STOP: &str = "android_media_stop";
pub const EVENT_DEVICE_ON: &str = "android_device_on";
pub const EVENT_DEVICE_OFF: &str = "android_device_off";
pub const EVENT_DEVICE_VOLUME: &str = "android_device_volume";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Home Assistant URL not configured")]
    NotConfigured,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// State of one remote entity; `brightness` is already rescaled to `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub brightness: Option<u8>,
}

impl EntityState {
    pub fn is_on(&self) -> bool {
        self.state == "on"
    }
}

/// Rescale a Home Assistant brightness (`0..=255`) to a volume percentage.
/// Negative values mean "not reported".
pub fn brightness_to_volume(raw: i64) -> Option<u8> {
    if raw < 0 {
        return None;
    }
    Some((raw.min(255) * 100 / 255) as u8)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Submit a named event with extra data fields
    async fn fire_event(&self, event_type: &str, data: Map<String, Value>) -> Result<(), RemoteError>;

    async fn get_entity_state(&self, entity_id: &str) -> Result<EntityState, RemoteError>;

    /// Roster stored on the backend; a missing helper entity reads as empty.
    async fn get_device_list(&self) -> Result<Vec<Device>, RemoteError>;

    async fn set_device_list(&self, devices: &[Device]) -> Result<(), RemoteError>;

    async fn test_connection(&self) -> Result<(), RemoteError>;
}
