//! Session ownership controller.
//!
//! Claims the platform media-routing slot, re-asserts it when the session may
//! have gone stale, and releases it on teardown. All calls come from the
//! bridge task, so claims never overlap.

use super::platform::{FocusChange, MediaPlatform, TransportSnapshot};
use crate::config::HeartbeatPolicy;
use crate::router::DisplayMetadata;
use crate::state::{PlaybackModel, SessionOwnership};
use crate::state_machine::{SessionState, SessionStateMachine};
use crate::utils::logger::{log_event, LogEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct SessionController {
    platform: Arc<dyn MediaPlatform>,
    machine: SessionStateMachine,
    ownership: SessionOwnership,
    quiet_window: Duration,
    heartbeat_policy: HeartbeatPolicy,
}

impl SessionController {
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        quiet_window: Duration,
        heartbeat_policy: HeartbeatPolicy,
    ) -> Self {
        Self {
            platform,
            machine: SessionStateMachine::new(),
            ownership: SessionOwnership::default(),
            quiet_window,
            heartbeat_policy,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.current()
    }

    pub fn ownership(&self) -> SessionOwnership {
        self.ownership
    }

    pub fn is_active(&self) -> bool {
        self.ownership.active
    }

    pub fn is_quiet(&self, now: Instant) -> bool {
        self.ownership.is_quiet(now, self.quiet_window)
    }

    fn transition(&mut self, to: SessionState, reason: &str) -> bool {
        let from = self.machine.current();
        match self.machine.transition_to(to) {
            Ok(()) => {
                if from != to {
                    log_event(LogEvent::Session {
                        from: format!("{:?}", from),
                        to: format!("{:?}", to),
                        reason: reason.to_string(),
                    });
                }
                true
            }
            Err(e) => {
                log::error!("[SESSION] {}", e);
                false
            }
        }
    }

    /// Run the full claim sequence. Calling it while Active refreshes the claim.
    pub fn claim(&mut self, playback: PlaybackModel, now: Instant, reason: &str) {
        if !self.machine.can_claim() {
            log::debug!("[SESSION] Claim already in progress, folding '{}' into it", reason);
            return;
        }
        if !self.transition(SessionState::Claiming, reason) {
            return;
        }

        // Toggling forces the platform to re-run route selection
        self.platform.set_session_active(false);
        self.platform.set_session_active(true);

        self.platform.attach_volume_surface(playback.volume());
        self.platform.publish_transport_state(TransportSnapshot {
            is_playing: playback.is_playing,
            volume: playback.volume(),
        });

        if let Err(e) = self.platform.request_audio_focus() {
            log::warn!("[SESSION] Audio focus request failed, continuing claim: {}", e);
        }

        if let Err(e) = self.platform.emit_silent_pulse() {
            log::warn!("[SESSION] Silent pulse failed, continuing claim: {}", e);
        }

        if self.transition(SessionState::Active, reason) {
            self.ownership.active = true;
            self.ownership.last_claimed_at = Some(now);
            log::info!("[SESSION] Media session claimed ({})", reason);
        }
    }

    /// Claim unless the session is already owned. Returns whether a claim ran.
    pub fn ensure_active(&mut self, playback: PlaybackModel, now: Instant, reason: &str) -> bool {
        if self.machine.is_owned() {
            return false;
        }
        self.claim(playback, now, reason);
        true
    }

    /// Periodic staleness check. Returns whether a re-claim ran.
    pub fn tick(&mut self, playback: PlaybackModel, now: Instant) -> bool {
        match self.machine.current() {
            SessionState::Active if self.is_quiet(now) => {
                if self.transition(SessionState::Stale, "quiet window elapsed") {
                    self.ownership.active = false;
                }
                self.claim(playback, now, "stale session refresh");
                true
            }
            SessionState::Stale => {
                self.claim(playback, now, "stale session refresh");
                true
            }
            _ => false,
        }
    }

    /// Record a volume callback. A callback arriving after a quiet gap also
    /// re-claims, unless a claim already ran within the window.
    pub fn note_volume_event(&mut self, playback: PlaybackModel, changed: bool, now: Instant) -> bool {
        let recently_claimed = self
            .ownership
            .last_claimed_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.quiet_window);

        let reclaimed = if self.is_quiet(now) && !recently_claimed {
            log::info!("[SESSION] Volume event after quiet gap, refreshing session");
            self.claim(playback, now, "volume after quiet gap");
            true
        } else {
            false
        };

        let heartbeat = match self.heartbeat_policy {
            HeartbeatPolicy::AnyVolumeEvent => true,
            HeartbeatPolicy::ChangedVolumeOnly => changed,
        };
        if heartbeat {
            self.ownership.last_volume_event_at = Some(now);
        }

        reclaimed
    }

    /// Push transport state and display metadata to the platform surface
    pub fn publish(&self, playback: PlaybackModel, display: &DisplayMetadata) {
        if !self.ownership.active {
            return;
        }
        self.platform.publish_transport_state(TransportSnapshot {
            is_playing: playback.is_playing,
            volume: playback.volume(),
        });
        self.platform.set_metadata(display);
    }

    pub fn on_focus_change(&mut self, change: FocusChange) {
        log::debug!("[SESSION] Audio focus changed: {:?}", change);
        if !change.is_permanent_loss() || self.machine.current() == SessionState::Inactive {
            return;
        }

        log::info!("[SESSION] Lost audio focus, re-requesting");
        if let Err(e) = self.platform.request_audio_focus() {
            log::warn!("[SESSION] Failed to re-acquire audio focus: {}", e);
        }
    }

    /// Release focus and the session. No-op when nothing was ever claimed.
    pub fn teardown(&mut self, reason: &str) {
        if self.machine.current() == SessionState::Inactive && !self.ownership.active {
            return;
        }

        self.platform.abandon_audio_focus();
        self.platform.set_session_active(false);
        self.platform.release_session();

        self.transition(SessionState::Inactive, reason);
        self.ownership = SessionOwnership::default();
    }
}
