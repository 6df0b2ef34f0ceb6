//! Command router: transport/volume commands in, logical actions out.
//!
//! The router owns the playback shadow and the device cursor. It never talks
//! to the backend itself; it hands back at most one [`LogicalAction`] plus an
//! optional entity whose state should be refreshed.

pub mod metadata;

pub use metadata::DisplayMetadata;

use crate::log_simple;
use crate::remote::{
    EntityState, EVENT_DEVICE_OFF, EVENT_DEVICE_ON, EVENT_DEVICE_VOLUME, EVENT_MEDIA_NEXT,
    EVENT_MEDIA_PAUSE, EVENT_MEDIA_PLAY, EVENT_MEDIA_PREVIOUS, EVENT_MEDIA_STOP,
};
use crate::state::{DeviceCursor, PlaybackModel};
use crate::store::Device;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Inbound command from the platform media surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Next,
    Previous,
    Stop,
    /// Absolute volume, clamped into `[0, 100]`
    VolumeSet(i32),
    /// Signed direction; each unit moves the volume by one step
    VolumeAdjust(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    Play,
    Pause,
    Next,
    Previous,
    Stop,
    VolumeSet,
    VolumeAdjust,
}

/// Unit of work handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicalAction {
    pub kind: ActionKind,
    pub device_entity: Option<String>,
    /// Resulting volume for volume actions
    pub volume: Option<u8>,
}

impl LogicalAction {
    pub fn generic(kind: ActionKind) -> Self {
        Self {
            kind,
            device_entity: None,
            volume: None,
        }
    }

    pub fn for_device(kind: ActionKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            device_entity: Some(entity_id.into()),
            volume: None,
        }
    }

    fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Name reported to observers in dispatch notifications
    pub fn event_name(&self) -> &'static str {
        match (self.kind, self.device_entity.is_some()) {
            (ActionKind::Play, true) => "device_on",
            (ActionKind::Play, false) => "play",
            (ActionKind::Pause, true) => "device_off",
            (ActionKind::Pause, false) => "pause",
            (ActionKind::Next, _) => "next",
            (ActionKind::Previous, _) => "previous",
            (ActionKind::Stop, _) => "stop",
            (ActionKind::VolumeSet | ActionKind::VolumeAdjust, _) => "device_volume",
        }
    }

    /// Remote event type and its data fields
    pub fn remote_event(&self) -> (&'static str, Map<String, Value>) {
        let mut data = Map::new();
        if let Some(entity_id) = &self.device_entity {
            data.insert("entity_id".to_string(), json!(entity_id));
        }

        let event_type = match (self.kind, self.device_entity.is_some()) {
            (ActionKind::Play, true) => EVENT_DEVICE_ON,
            (ActionKind::Play, false) => EVENT_MEDIA_PLAY,
            (ActionKind::Pause, true) => EVENT_DEVICE_OFF,
            (ActionKind::Pause, false) => EVENT_MEDIA_PAUSE,
            (ActionKind::Next, _) => EVENT_MEDIA_NEXT,
            (ActionKind::Previous, _) => EVENT_MEDIA_PREVIOUS,
            (ActionKind::Stop, _) => EVENT_MEDIA_STOP,
            (ActionKind::VolumeSet | ActionKind::VolumeAdjust, _) => {
                if let Some(volume) = self.volume {
                    data.insert("volume".to_string(), json!(volume));
                }
                EVENT_DEVICE_VOLUME
            }
        };

        (event_type, data)
    }
}

/// What the bridge must do after routing one command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteOutcome {
    pub action: Option<LogicalAction>,
    /// Entity whose remote state should be fetched
    pub refresh_entity: Option<String>,
    /// Set for volume commands: whether the numeric volume changed
    pub volume_changed: Option<bool>,
}

pub struct CommandRouter {
    volume_step: i32,
    playback: PlaybackModel,
    cursor: DeviceCursor,
}

impl CommandRouter {
    pub fn new(initial_volume: u8, volume_step: i32) -> Self {
        Self {
            volume_step,
            playback: PlaybackModel::new(initial_volume),
            cursor: DeviceCursor::new(),
        }
    }

    pub fn playback(&self) -> PlaybackModel {
        self.playback
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn selected_device<'a>(&self, devices: &'a [Device]) -> Option<&'a Device> {
        self.cursor.peek(devices.len()).map(|i| &devices[i])
    }

    /// Keep the cursor valid after the roster changed
    pub fn on_devices_changed(&mut self, devices: &[Device]) {
        self.cursor.clamp(devices.len());
    }

    pub fn display(&self, devices: &[Device]) -> DisplayMetadata {
        let selected = self.cursor.peek(devices.len());
        DisplayMetadata::project(devices, selected, self.playback.volume())
    }

    pub fn route(&mut self, command: TransportCommand, devices: &[Device]) -> RouteOutcome {
        let selected = self
            .selected_device(devices)
            .map(|device| device.entity_id.clone());

        match command {
            TransportCommand::Play => {
                self.playback.is_playing = true;
                let action = match selected {
                    Some(entity_id) => LogicalAction::for_device(ActionKind::Play, entity_id),
                    None => LogicalAction::generic(ActionKind::Play),
                };
                log::info!("[ROUTER] Play -> {}", action.event_name());
                RouteOutcome {
                    action: Some(action),
                    ..Default::default()
                }
            }
            TransportCommand::Pause => {
                self.playback.is_playing = false;
                let action = match selected {
                    Some(entity_id) => LogicalAction::for_device(ActionKind::Pause, entity_id),
                    None => LogicalAction::generic(ActionKind::Pause),
                };
                log::info!("[ROUTER] Pause -> {}", action.event_name());
                RouteOutcome {
                    action: Some(action),
                    ..Default::default()
                }
            }
            TransportCommand::Next | TransportCommand::Previous => {
                let forward = command == TransportCommand::Next;
                if devices.is_empty() {
                    let kind = if forward { ActionKind::Next } else { ActionKind::Previous };
                    return RouteOutcome {
                        action: Some(LogicalAction::generic(kind)),
                        ..Default::default()
                    };
                }

                let moved = if forward {
                    self.cursor.next(devices.len())
                } else {
                    self.cursor.previous(devices.len())
                };
                let refresh_entity = moved.map(|i| devices[i].entity_id.clone());
                log::info!(
                    "[ROUTER] Cursor moved to {}/{} ({:?})",
                    self.cursor.index() + 1,
                    devices.len(),
                    refresh_entity
                );
                RouteOutcome {
                    refresh_entity,
                    ..Default::default()
                }
            }
            TransportCommand::Stop => RouteOutcome {
                action: Some(LogicalAction::generic(ActionKind::Stop)),
                ..Default::default()
            },
            TransportCommand::VolumeSet(volume) => {
                self.route_volume(ActionKind::VolumeSet, volume, selected)
            }
            TransportCommand::VolumeAdjust(direction) => {
                let target = i32::from(self.playback.volume())
                    .saturating_add(direction.saturating_mul(self.volume_step));
                self.route_volume(ActionKind::VolumeAdjust, target, selected)
            }
        }
    }

    fn route_volume(&mut self, kind: ActionKind, target: i32, selected: Option<String>) -> RouteOutcome {
        // A volume command also means "device on"
        self.playback.is_playing = true;
        let changed = self.playback.set_volume(target);
        let volume = self.playback.volume();
        log_simple!("[ROUTER] volume", "{:?} -> {} (changed: {})", kind, volume, changed);

        RouteOutcome {
            action: selected.map(|entity_id| LogicalAction::for_device(kind, entity_id).with_volume(volume)),
            refresh_entity: None,
            volume_changed: Some(changed),
        }
    }

    /// Apply a fetched entity state if that entity is still selected.
    pub fn apply_entity_state(&mut self, devices: &[Device], state: &EntityState) -> bool {
        let still_selected = self
            .selected_device(devices)
            .is_some_and(|device| device.entity_id == state.entity_id);
        if !still_selected {
            log::debug!("[ROUTER] Discarding stale state for {}", state.entity_id);
            return false;
        }

        self.playback.is_playing = state.is_on();
        if let Some(brightness) = state.brightness {
            self.playback.set_volume(i32::from(brightness));
        }
        true
    }
}
