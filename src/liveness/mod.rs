//! Liveness subsystem: every revival trigger funnels into one gated wake.
//!
//! Route and boot broadcasts arrive as [`PlatformSignal`]s, timers come from
//! the bridge itself or from a [`WakeScheduler`]. All of them end up as a
//! [`WakeSource`] handed to the bridge, which checks [`admit`] before doing
//! anything.

pub mod scheduler;
pub mod signals;

pub use scheduler::{TokioWakeScheduler, WakeScheduler, WakeSink};
pub use signals::{ConnectionState, KeyAction, MediaKey, MediaKeyEvent, PlatformSignal, ScoState};

use crate::state::BridgeState;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeSource {
    BluetoothAudioConnected,
    HeadsetConnected,
    AudioBecomingNoisy,
    CallAudioEnded,
    DeviceConnected,
    Boot,
    /// In-process refresh timer
    PeriodicTimer,
    /// Externally scheduled periodic job
    ScheduledJob,
    BackupAlarm,
    /// Explicit start from the UI layer
    Explicit,
}

impl WakeSource {
    pub const ALL: [WakeSource; 10] = [
        WakeSource::BluetoothAudioConnected,
        WakeSource::HeadsetConnected,
        WakeSource::AudioBecomingNoisy,
        WakeSource::CallAudioEnded,
        WakeSource::DeviceConnected,
        WakeSource::Boot,
        WakeSource::PeriodicTimer,
        WakeSource::ScheduledJob,
        WakeSource::BackupAlarm,
        WakeSource::Explicit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WakeSource::BluetoothAudioConnected => "bluetooth",
            WakeSource::HeadsetConnected => "headset",
            WakeSource::AudioBecomingNoisy => "noisy",
            WakeSource::CallAudioEnded => "call-ended",
            WakeSource::DeviceConnected => "device",
            WakeSource::Boot => "boot",
            WakeSource::PeriodicTimer => "timer",
            WakeSource::ScheduledJob => "scheduled",
            WakeSource::BackupAlarm => "backup",
            WakeSource::Explicit => "start",
        }
    }

    /// In-process timers. While a session is owned these only refresh it
    /// once it went quiet instead of re-running the claim.
    pub fn is_refresh_timer(&self) -> bool {
        matches!(self, WakeSource::PeriodicTimer | WakeSource::BackupAlarm)
    }
}

impl fmt::Display for WakeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WakeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        WakeSource::ALL
            .into_iter()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| format!("Unknown wake source '{}'", s.trim()))
    }
}

/// Whether a wake from `source` may proceed. Closed gates are a normal
/// steady state and are only logged at debug.
pub fn admit(source: WakeSource, state: BridgeState) -> bool {
    if state.is_open() {
        return true;
    }
    log::debug!(
        "[LIVENESS] Ignoring {} wake (enabled: {}, authenticated: {})",
        source,
        state.enabled,
        state.authenticated
    );
    false
}
