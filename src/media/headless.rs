use super::platform::{MediaPlatform, PlatformError, TransportSnapshot};
use crate::audio::{PulseSink, SilentPulse};
use crate::router::DisplayMetadata;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Platform adapter for desktop/server hosts without a system media session.
///
/// Session calls are logged and tracked; the claim pulse goes to a
/// [`PulseSink`] on a blocking thread.
pub struct HeadlessPlatform {
    session_active: AtomicBool,
    focus_held: AtomicBool,
    volume: AtomicU8,
    pulse: Arc<SilentPulse>,
    sink: Arc<dyn PulseSink>,
}

impl HeadlessPlatform {
    pub fn new(sink: Arc<dyn PulseSink>) -> Self {
        Self {
            session_active: AtomicBool::new(false),
            focus_held: AtomicBool::new(false),
            volume: AtomicU8::new(0),
            pulse: Arc::new(SilentPulse::default()),
            sink,
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    pub fn has_focus(&self) -> bool {
        self.focus_held.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::SeqCst)
    }
}

impl MediaPlatform for HeadlessPlatform {
    fn set_session_active(&self, active: bool) {
        self.session_active.store(active, Ordering::SeqCst);
        log::debug!("Media session active: {}", active);
    }

    fn attach_volume_surface(&self, volume: u8) {
        self.volume.store(volume, Ordering::SeqCst);
        log::debug!("Volume surface attached at {}%", volume);
    }

    fn publish_transport_state(&self, snapshot: TransportSnapshot) {
        self.volume.store(snapshot.volume, Ordering::SeqCst);
        log::debug!(
            "Transport state: {} @ {}%",
            if snapshot.is_playing { "playing" } else { "paused" },
            snapshot.volume
        );
    }

    fn set_metadata(&self, metadata: &DisplayMetadata) {
        log::info!("🎵 {} | {} | {}", metadata.title, metadata.subtitle, metadata.detail);
    }

    fn request_audio_focus(&self) -> Result<(), PlatformError> {
        if !self.is_session_active() {
            return Err(PlatformError::SessionUnavailable(
                "session is not active".to_string(),
            ));
        }
        self.focus_held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn abandon_audio_focus(&self) {
        self.focus_held.store(false, Ordering::SeqCst);
    }

    fn emit_silent_pulse(&self) -> Result<(), PlatformError> {
        let pulse = self.pulse.clone();
        let sink = self.sink.clone();
        let play = move || {
            if let Err(e) = sink.play(&pulse) {
                log::warn!("Silent pulse on '{}' failed: {}", sink.name(), e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(play);
                Ok(())
            }
            Err(_) => std::thread::Builder::new()
                .name("silent-pulse".to_string())
                .spawn(play)
                .map(|_| ())
                .map_err(|e| PlatformError::Audio(format!("Failed to spawn pulse thread: {}", e))),
        }
    }

    fn release_session(&self) {
        self.session_active.store(false, Ordering::SeqCst);
        self.focus_held.store(false, Ordering::SeqCst);
        log::debug!("Media session released");
    }
}
