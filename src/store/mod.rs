//! Persistent configuration: service flag, credentials and the device roster.
//!
//! The bridge only talks to the [`ConfigStore`] trait. [`FileConfigStore`] is the
//! on-disk implementation used by the binary, [`MemoryConfigStore`] backs tests
//! and embedders that persist settings themselves.

pub mod device_list;
pub mod file_store;

use crate::state::BridgeState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub use file_store::FileConfigStore;

/// A controllable remote entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub entity_id: String,
}

impl Device {
    pub fn new(name: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_id: entity_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub ha_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub devices: Vec<Device>,
}

impl Settings {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn bridge_state(&self) -> BridgeState {
        BridgeState {
            enabled: self.enabled,
            authenticated: self.is_authenticated(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("token encryption failed: {0}")]
    Crypto(String),
    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Key-value persistence for the bridge settings
pub trait ConfigStore: Send + Sync {
    /// Current settings; a missing or unreadable store yields defaults.
    fn load(&self) -> Settings;

    fn save(&self, settings: &Settings) -> Result<(), StoreError>;

    /// Load, modify and save as one step, so concurrent writers cannot lose
    /// each other's changes.
    fn update(&self, apply: &mut dyn FnMut(&mut Settings)) -> Result<(), StoreError>;

    fn bridge_state(&self) -> BridgeState {
        self.load().bridge_state()
    }

    fn devices(&self) -> Vec<Device> {
        self.load().devices
    }

    fn set_devices(&self, devices: Vec<Device>) -> Result<(), StoreError> {
        let mut devices = Some(devices);
        self.update(&mut |settings| {
            if let Some(devices) = devices.take() {
                settings.devices = devices;
            }
        })
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.update(&mut |settings| settings.enabled = enabled)
    }
}

/// Store kept entirely in memory
#[derive(Default)]
pub struct MemoryConfigStore {
    settings: Mutex<Settings>,
}

impl MemoryConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    fn lock_or_recover(&self) -> MutexGuard<'_, Settings> {
        match self.settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Recovering from poisoned mutex in MemoryConfigStore");
                poisoned.into_inner()
            }
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Settings {
        self.lock_or_recover().clone()
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        *self.lock_or_recover() = settings.clone();
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Settings)) -> Result<(), StoreError> {
        let mut settings = self.lock_or_recover();
        apply(&mut settings);
        Ok(())
    }
}
