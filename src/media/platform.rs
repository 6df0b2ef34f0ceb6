use crate::router::DisplayMetadata;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Audio focus request was denied")]
    FocusDenied,

    #[error("Media session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Audio output failed: {0}")]
    Audio(String),
}

/// Audio focus notifications delivered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Gain,
    /// Focus revoked for good; another app took over playback
    Loss,
    LossTransient,
    LossTransientCanDuck,
}

impl FocusChange {
    pub fn is_permanent_loss(&self) -> bool {
        matches!(self, Self::Loss)
    }
}

/// Transport state published to the platform session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    pub volume: u8,
}

/// Adapter over the platform media-session surface.
///
/// Calls are made from the bridge task only and must return quickly; anything
/// slow (the audio pulse) has to be pushed onto another thread.
pub trait MediaPlatform: Send + Sync {
    fn set_session_active(&self, active: bool);

    /// Install the remote volume surface with the given current volume
    fn attach_volume_surface(&self, volume: u8);

    fn publish_transport_state(&self, snapshot: TransportSnapshot);

    fn set_metadata(&self, metadata: &DisplayMetadata);

    fn request_audio_focus(&self) -> Result<(), PlatformError>;

    fn abandon_audio_focus(&self);

    /// Start a short inaudible playback
    fn emit_silent_pulse(&self) -> Result<(), PlatformError>;

    fn release_session(&self);
}
