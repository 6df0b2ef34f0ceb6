use super::{device_list, ConfigStore, Settings, StoreError};
use crate::secure_store::TokenCipher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SETTINGS_FILE: &str = "settings.json";
const KEY_FILE: &str = "store.key";

/// On-disk layout. Tokens are encrypted, the roster uses the compact encoding.
#[derive(Serialize, Deserialize, Default)]
struct PersistedSettings {
    #[serde(default)]
    ha_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    service_enabled: bool,
    #[serde(default)]
    devices: String,
}

/// JSON settings file with encrypted credentials
pub struct FileConfigStore {
    settings_path: PathBuf,
    cipher: TokenCipher,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let cipher = TokenCipher::load_or_create(&dir.join(KEY_FILE))?;
        Ok(Self {
            settings_path: dir.join(SETTINGS_FILE),
            cipher,
            write_lock: Mutex::new(()),
        })
    }

    /// `HAMB_CONFIG_DIR`, or `<config dir>/hamediabridge`
    pub fn default_dir() -> Result<PathBuf, StoreError> {
        if let Ok(dir) = std::env::var("HAMB_CONFIG_DIR") {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        dirs::config_dir()
            .map(|dir| dir.join("hamediabridge"))
            .ok_or(StoreError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Caller must hold the write lock
    fn write_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let persisted = PersistedSettings {
            ha_url: settings.ha_url.clone(),
            access_token: settings
                .access_token
                .as_deref()
                .map(|token| self.cipher.encrypt_value(token))
                .transpose()?,
            refresh_token: settings
                .refresh_token
                .as_deref()
                .map(|token| self.cipher.encrypt_value(token))
                .transpose()?,
            token_expires_at: settings.token_expires_at,
            service_enabled: settings.enabled,
            devices: device_list::encode(&settings.devices),
        };
        let encoded = serde_json::to_string_pretty(&persisted)?;

        // Write-then-rename so a crash never leaves a truncated file behind
        let tmp_path = self.settings_path.with_extension("json.tmp");
        fs::write(&tmp_path, encoded)?;
        fs::rename(&tmp_path, &self.settings_path)?;
        Ok(())
    }

    fn read_persisted(&self) -> PersistedSettings {
        let raw = match fs::read_to_string(&self.settings_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings file at {:?}, using defaults", self.settings_path);
                return PersistedSettings::default();
            }
            Err(e) => {
                log::error!("Failed to read settings {:?}: {}", self.settings_path, e);
                return PersistedSettings::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::error!("Settings file is corrupted, using defaults: {}", e);
            PersistedSettings::default()
        })
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Settings {
        let persisted = self.read_persisted();
        let devices = if persisted.devices.trim().is_empty() {
            Vec::new()
        } else {
            device_list::decode(&persisted.devices)
        };

        Settings {
            ha_url: persisted.ha_url,
            access_token: self
                .cipher
                .decrypt_or_drop("access_token", persisted.access_token.as_deref()),
            refresh_token: self
                .cipher
                .decrypt_or_drop("refresh_token", persisted.refresh_token.as_deref()),
            token_expires_at: persisted.token_expires_at,
            enabled: persisted.service_enabled,
            devices,
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let _guard = self.lock_writes();
        self.write_settings(settings)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut Settings)) -> Result<(), StoreError> {
        let _guard = self.lock_writes();
        let mut settings = self.load();
        apply(&mut settings);
        self.write_settings(&settings)
    }
}
