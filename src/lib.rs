pub mod audio;
pub mod bridge;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod liveness;
pub mod media;
pub mod remote;
pub mod roster;
pub mod router;
pub mod secure_store;
pub mod state;
pub mod state_machine;
pub mod store;
pub mod utils;

#[cfg(test)]
mod tests;

use bridge::{Bridge, BridgeDeps, BridgeError};
use config::BridgeConfig;
use console::Console;
use media::HeadlessPlatform;
use remote::{HomeAssistantClient, RemoteGateway};
use roster::DeviceRoster;
use std::sync::Arc;
use store::{ConfigStore, FileConfigStore};
use tokio::sync::broadcast;

/// Seed the store from `HAMB_HA_URL` / `HAMB_HA_TOKEN` when they are set
fn apply_env_credentials(store: &dyn ConfigStore) -> Result<(), BridgeError> {
    let url = std::env::var("HAMB_HA_URL").ok().filter(|v| !v.trim().is_empty());
    let token = std::env::var("HAMB_HA_TOKEN").ok().filter(|v| !v.trim().is_empty());
    if url.is_none() && token.is_none() {
        return Ok(());
    }

    store.update(&mut |settings| {
        if let Some(url) = &url {
            settings.ha_url = url.trim().to_string();
        }
        if let Some(token) = &token {
            settings.access_token = Some(token.trim().to_string());
        }
    })?;
    log::info!("Stored Home Assistant credentials from environment");
    Ok(())
}

pub fn run() -> Result<(), BridgeError> {
    dotenv::dotenv().ok();
    utils::logger::init_logging();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let config = BridgeConfig::from_env();
        let dir = FileConfigStore::default_dir()?;
        let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::open(&dir)?);
        log::info!("Settings at {:?}", dir);
        apply_env_credentials(store.as_ref())?;

        let gateway: Arc<dyn RemoteGateway> =
            Arc::new(HomeAssistantClient::new(store.clone(), config.http_timeout)?);
        let sink = audio::default_sink();
        log::info!("Silent pulse output: {}", sink.name());
        let platform = Arc::new(HeadlessPlatform::new(sink));

        let bridge = Bridge::spawn(
            BridgeDeps::new(store.clone(), gateway.clone(), platform),
            config,
        );
        bridge.start()?;

        let mut notifications = bridge.subscribe();
        tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(notification) => match notification.error_message {
                        Some(error) => println!("{} failed: {}", notification.event_name, error),
                        None => println!("{} sent", notification.event_name),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("Missed {} dispatch notifications", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let console = Console::new(
            bridge.clone(),
            DeviceRoster::new(store, gateway.clone()),
            gateway,
        );
        let result = console.run().await;

        bridge.shutdown().await?;
        result
    })
}
