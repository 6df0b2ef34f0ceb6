use crate::store::Device;
use serde::Serialize;

pub const GENERIC_TITLE: &str = "HA Media Bridge";

/// What the platform shows for the session (lock screen, notification, car display)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMetadata {
    pub title: String,
    pub subtitle: String,
    pub detail: String,
    /// 1-based `(position, count)` of the selected device
    pub position: Option<(usize, usize)>,
}

impl DisplayMetadata {
    /// Shown before any device is configured
    pub fn idle() -> Self {
        Self {
            title: GENERIC_TITLE.to_string(),
            subtitle: "No devices configured".to_string(),
            detail: "Add devices in app".to_string(),
            position: None,
        }
    }

    pub fn project(devices: &[Device], selected: Option<usize>, volume: u8) -> Self {
        let Some(index) = selected.filter(|&i| i < devices.len()) else {
            return Self::idle();
        };

        let device = &devices[index];
        let count = devices.len();
        Self {
            title: device.name.clone(),
            subtitle: format!("Vol: {}%", volume),
            detail: format!("{}/{} · {}", index + 1, count, device.entity_id),
            position: Some((index + 1, count)),
        }
    }
}
