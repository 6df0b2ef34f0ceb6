//! Translation of raw platform broadcasts and media key events.

use super::WakeSource;
use crate::router::TransportCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Call (SCO) audio link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSignal {
    A2dpConnectionChanged(ConnectionState),
    HeadsetConnectionChanged(ConnectionState),
    AudioBecomingNoisy,
    ScoAudioStateUpdated(ScoState),
    /// Any Bluetooth device connected (car kits and the like)
    AclConnected,
    BootCompleted,
}

impl PlatformSignal {
    /// Wake source for this broadcast, or `None` when it should be ignored
    pub fn wake_source(&self) -> Option<WakeSource> {
        match self {
            PlatformSignal::A2dpConnectionChanged(ConnectionState::Connected) => {
                Some(WakeSource::BluetoothAudioConnected)
            }
            PlatformSignal::HeadsetConnectionChanged(ConnectionState::Connected) => {
                Some(WakeSource::HeadsetConnected)
            }
            PlatformSignal::A2dpConnectionChanged(_)
            | PlatformSignal::HeadsetConnectionChanged(_) => None,
            PlatformSignal::AudioBecomingNoisy => Some(WakeSource::AudioBecomingNoisy),
            // A call just ended, reclaim the media route
            PlatformSignal::ScoAudioStateUpdated(ScoState::Disconnected) => {
                Some(WakeSource::CallAudioEnded)
            }
            PlatformSignal::ScoAudioStateUpdated(_) => None,
            PlatformSignal::AclConnected => Some(WakeSource::DeviceConnected),
            PlatformSignal::BootCompleted => Some(WakeSource::Boot),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
    Stop,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaKeyEvent {
    pub key: MediaKey,
    pub action: KeyAction,
}

impl MediaKeyEvent {
    pub fn down(key: MediaKey) -> Self {
        Self {
            key,
            action: KeyAction::Down,
        }
    }

    /// Only key-down events produce commands. Play/pause is treated as play.
    pub fn to_command(&self) -> Option<TransportCommand> {
        if self.action != KeyAction::Down {
            return None;
        }
        match self.key {
            MediaKey::Play | MediaKey::PlayPause => Some(TransportCommand::Play),
            MediaKey::Pause => Some(TransportCommand::Pause),
            MediaKey::Next => Some(TransportCommand::Next),
            MediaKey::Previous => Some(TransportCommand::Previous),
            MediaKey::Stop => Some(TransportCommand::Stop),
            MediaKey::Other(code) => {
                log::debug!("Ignoring media key {}", code);
                None
            }
        }
    }
}
