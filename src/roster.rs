//! Device roster management and cross-install synchronisation.
//!
//! The local roster lives in the [`ConfigStore`]; a copy is mirrored into a
//! Home Assistant helper entity so several installs can share one list.

use crate::remote::RemoteGateway;
use crate::store::{ConfigStore, Device, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

// Home Assistant entity ids are `<domain>.<object_id>`
static ENTITY_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9_]+\.[a-z0-9_]+$").unwrap());

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Device name is required")]
    NameRequired,

    #[error("Entity ID is required")]
    EntityIdRequired,

    #[error("Invalid entity ID '{0}', expected <domain>.<object_id>")]
    InvalidEntityId(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a manual roster sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote roster replaced the local one
    Pulled(usize),
    /// Remote roster was empty, local roster was pushed
    Pushed,
    /// Nothing to exchange, or the helper entity could not be written
    NoRemoteEntity,
    Failed(String),
    NotAuthenticated,
}

pub struct DeviceRoster {
    store: Arc<dyn ConfigStore>,
    gateway: Arc<dyn RemoteGateway>,
}

impl DeviceRoster {
    pub fn new(store: Arc<dyn ConfigStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn devices(&self) -> Vec<Device> {
        self.store.devices()
    }

    /// Append a device and mirror the roster to the backend.
    pub async fn add(&self, name: &str, entity_id: &str) -> Result<Vec<Device>, RosterError> {
        let name = name.trim();
        let entity_id = entity_id.trim();

        if name.is_empty() {
            return Err(RosterError::NameRequired);
        }
        if entity_id.is_empty() {
            return Err(RosterError::EntityIdRequired);
        }
        if !ENTITY_ID_PATTERN.is_match(entity_id) {
            return Err(RosterError::InvalidEntityId(entity_id.to_string()));
        }

        let mut devices = Vec::new();
        self.store.update(&mut |settings| {
            settings.devices.push(Device::new(name, entity_id));
            devices = settings.devices.clone();
        })?;
        log::info!("Added device '{}' ({}), roster size {}", name, entity_id, devices.len());

        self.push(&devices).await;
        Ok(devices)
    }

    /// Remove the device at `index`; out-of-range indices leave the roster untouched.
    pub async fn remove(&self, index: usize) -> Result<Vec<Device>, RosterError> {
        let mut devices = Vec::new();
        let mut removed = None;
        self.store.update(&mut |settings| {
            if index < settings.devices.len() {
                removed = Some(settings.devices.remove(index));
            }
            devices = settings.devices.clone();
        })?;

        let Some(removed) = removed else {
            log::debug!("Ignoring removal of device {} from roster of {}", index, devices.len());
            return Ok(devices);
        };
        log::info!("Removed device '{}' ({})", removed.name, removed.entity_id);

        self.push(&devices).await;
        Ok(devices)
    }

    /// Best-effort mirror of the local roster; failures are only logged.
    async fn push(&self, devices: &[Device]) {
        if !self.store.bridge_state().authenticated {
            return;
        }
        if let Err(e) = self.gateway.set_device_list(devices).await {
            log::warn!("Failed to push device list: {}", e);
        }
    }

    /// Pull the remote roster, or seed it from the local one when it is empty.
    pub async fn sync(&self) -> Result<SyncOutcome, RosterError> {
        if !self.store.bridge_state().authenticated {
            return Ok(SyncOutcome::NotAuthenticated);
        }

        let remote = match self.gateway.get_device_list().await {
            Ok(remote) => remote,
            Err(e) => {
                log::error!("Device list sync failed: {}", e);
                return Ok(SyncOutcome::Failed(e.to_string()));
            }
        };

        if !remote.is_empty() {
            let count = remote.len();
            self.store.set_devices(remote)?;
            log::info!("Synced {} devices from Home Assistant", count);
            return Ok(SyncOutcome::Pulled(count));
        }

        let local = self.store.devices();
        if local.is_empty() {
            return Ok(SyncOutcome::NoRemoteEntity);
        }

        match self.gateway.set_device_list(&local).await {
            Ok(()) => Ok(SyncOutcome::Pushed),
            Err(e) => {
                log::warn!("Remote roster empty and push failed: {}", e);
                Ok(SyncOutcome::NoRemoteEntity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemoteGateway, RemoteError};
    use crate::store::{MemoryConfigStore, Settings};

    fn store(authenticated: bool, devices: Vec<Device>) -> Arc<MemoryConfigStore> {
        Arc::new(MemoryConfigStore::new(Settings {
            ha_url: "http://ha".to_string(),
            access_token: authenticated.then(|| "token".to_string()),
            enabled: true,
            devices,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_add_validates_and_pushes() {
        let mut gateway = MockRemoteGateway::new();
        gateway
            .expect_set_device_list()
            .withf(|devices| devices.len() == 1 && devices[0].entity_id == "light.lamp")
            .times(1)
            .returning(|_| Ok(()));

        let store = store(true, Vec::new());
        let roster = DeviceRoster::new(store.clone(), Arc::new(gateway));

        assert!(matches!(roster.add("  ", "light.lamp").await, Err(RosterError::NameRequired)));
        assert!(matches!(roster.add("Lamp", "").await, Err(RosterError::EntityIdRequired)));
        assert!(matches!(
            roster.add("Lamp", "lamp").await,
            Err(RosterError::InvalidEntityId(_))
        ));

        let devices = roster.add(" Lamp ", " light.lamp ").await.unwrap();
        assert_eq!(devices, vec![Device::new("Lamp", "light.lamp")]);
        assert_eq!(store.devices(), devices);
    }

    #[tokio::test]
    async fn test_push_failure_keeps_local_change() {
        let mut gateway = MockRemoteGateway::new();
        gateway
            .expect_set_device_list()
            .returning(|_| Err(RemoteError::Network("offline".to_string())));

        let roster = DeviceRoster::new(store(true, Vec::new()), Arc::new(gateway));
        let devices = roster.add("Fan", "fan.office").await.unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_unauthenticated_add_does_not_push() {
        let mut gateway = MockRemoteGateway::new();
        gateway.expect_set_device_list().times(0);

        let roster = DeviceRoster::new(store(false, Vec::new()), Arc::new(gateway));
        let devices = tokio_test::block_on(roster.add("Fan", "fan.office")).unwrap();
        assert_eq!(devices, vec![Device::new("Fan", "fan.office")]);
    }

    #[tokio::test]
    async fn test_remove_ignores_out_of_range() {
        let mut gateway = MockRemoteGateway::new();
        gateway.expect_set_device_list().times(1).returning(|_| Ok(()));

        let initial = vec![Device::new("A", "light.a"), Device::new("B", "light.b")];
        let roster = DeviceRoster::new(store(true, initial.clone()), Arc::new(gateway));

        assert_eq!(roster.remove(5).await.unwrap(), initial);
        assert_eq!(roster.remove(0).await.unwrap(), vec![Device::new("B", "light.b")]);
    }

    #[tokio::test]
    async fn test_sync_pulls_remote_roster() {
        let mut gateway = MockRemoteGateway::new();
        gateway
            .expect_get_device_list()
            .returning(|| Ok(vec![Device::new("Lamp", "light.lamp"), Device::new("TV", "media_player.tv")]));
        gateway.expect_set_device_list().times(0);

        let store = store(true, vec![Device::new("Old", "light.old")]);
        let roster = DeviceRoster::new(store.clone(), Arc::new(gateway));

        assert_eq!(roster.sync().await.unwrap(), SyncOutcome::Pulled(2));
        assert_eq!(store.devices().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_seeds_empty_remote() {
        let mut gateway = MockRemoteGateway::new();
        gateway.expect_get_device_list().returning(|| Ok(Vec::new()));
        gateway.expect_set_device_list().times(1).returning(|_| Ok(()));

        let roster = DeviceRoster::new(store(true, vec![Device::new("A", "light.a")]), Arc::new(gateway));
        assert_eq!(roster.sync().await.unwrap(), SyncOutcome::Pushed);
    }

    #[tokio::test]
    async fn test_sync_outcomes_without_exchange() {
        let mut gateway = MockRemoteGateway::new();
        gateway.expect_get_device_list().returning(|| Ok(Vec::new()));
        let roster = DeviceRoster::new(store(true, Vec::new()), Arc::new(gateway));
        assert_eq!(roster.sync().await.unwrap(), SyncOutcome::NoRemoteEntity);

        let mut gateway = MockRemoteGateway::new();
        gateway
            .expect_get_device_list()
            .returning(|| Err(RemoteError::Http { status: 500, body: "boom".to_string() }));
        let roster = DeviceRoster::new(store(true, Vec::new()), Arc::new(gateway));
        assert_eq!(
            roster.sync().await.unwrap(),
            SyncOutcome::Failed("HTTP 500: boom".to_string())
        );

        let roster = DeviceRoster::new(store(false, Vec::new()), Arc::new(MockRemoteGateway::new()));
        assert_eq!(roster.sync().await.unwrap(), SyncOutcome::NotAuthenticated);
    }
}
