use serde::Serialize;
use tokio::time::Instant;

/// Gate read from the configuration store on every entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BridgeState {
    pub enabled: bool,
    pub authenticated: bool,
}

impl BridgeState {
    /// True when the bridge is allowed to claim, route and revive.
    pub fn is_open(&self) -> bool {
        self.enabled && self.authenticated
    }
}

/// In-memory ownership bookkeeping, rebuilt on every process start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOwnership {
    pub active: bool,
    pub last_claimed_at: Option<Instant>,
    pub last_volume_event_at: Option<Instant>,
}

impl SessionOwnership {
    /// Whether `quiet_window` has elapsed since the last volume event.
    /// A session that never saw a volume event is always considered quiet.
    pub fn is_quiet(&self, now: Instant, quiet_window: std::time::Duration) -> bool {
        match self.last_volume_event_at {
            Some(at) => now.saturating_duration_since(at) >= quiet_window,
            None => true,
        }
    }
}

/// Local shadow of the selected remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackModel {
    pub is_playing: bool,
    volume: u8,
}

impl PlaybackModel {
    pub fn new(volume: u8) -> Self {
        Self {
            is_playing: false,
            volume: volume.min(100),
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Set volume clamped into `[0, 100]`; returns whether the value changed.
    pub fn set_volume(&mut self, volume: i32) -> bool {
        let clamped = volume.clamp(0, 100) as u8;
        let changed = clamped != self.volume;
        self.volume = clamped;
        changed
    }
}

/// Index of the currently controlled device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeviceCursor {
    index: usize,
}

impl DeviceCursor {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Selected index if the list is non-empty; an out-of-range cursor is reset to 0 first.
    pub fn selected(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        self.clamp(len);
        Some(self.index)
    }

    /// Index that would be selected, without resetting a stale cursor
    pub fn peek(&self, len: usize) -> Option<usize> {
        match len {
            0 => None,
            _ if self.index >= len => Some(0),
            _ => Some(self.index),
        }
    }

    /// Reset to 0 when the list shrank below the cursor.
    pub fn clamp(&mut self, len: usize) {
        if self.index >= len {
            if len > 0 {
                log::debug!("Cursor {} out of range for {} devices, resetting", self.index, len);
            }
            self.index = 0;
        }
    }

    pub fn next(&mut self, len: usize) -> Option<usize> {
        let current = self.selected(len)?;
        self.index = (current + 1) % len;
        Some(self.index)
    }

    pub fn previous(&mut self, len: usize) -> Option<usize> {
        let current = self.selected(len)?;
        self.index = (current + len - 1) % len;
        Some(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_gate_requires_both_flags() {
        assert!(!BridgeState { enabled: true, authenticated: false }.is_open());
        assert!(!BridgeState { enabled: false, authenticated: true }.is_open());
        assert!(BridgeState { enabled: true, authenticated: true }.is_open());
    }

    #[test]
    fn test_cursor_cycles_back_to_start() {
        for len in 1..=7 {
            for start in 0..len {
                let mut cursor = DeviceCursor { index: start };
                for _ in 0..len {
                    cursor.next(len);
                }
                assert_eq!(cursor.index(), start, "next x{} from {}", len, start);

                for _ in 0..len {
                    cursor.previous(len);
                }
                assert_eq!(cursor.index(), start, "previous x{} from {}", len, start);
            }
        }
    }

    #[test]
    fn test_cursor_wraps_backwards() {
        let mut cursor = DeviceCursor::new();
        assert_eq!(cursor.previous(2), Some(1));
        assert_eq!(cursor.next(2), Some(0));
    }

    #[test]
    fn test_cursor_resets_when_list_shrinks() {
        let mut cursor = DeviceCursor { index: 4 };
        assert_eq!(cursor.selected(3), Some(0));

        let mut cursor = DeviceCursor { index: 2 };
        assert_eq!(cursor.selected(3), Some(2));
        assert_eq!(cursor.selected(0), None);

        let stale = DeviceCursor { index: 4 };
        assert_eq!(stale.peek(2), Some(0));
        assert_eq!(stale.peek(0), None);
        assert_eq!(stale.index(), 4);
        assert_eq!(cursor.next(0), None);
    }

    #[test]
    fn test_volume_clamping() {
        let mut playback = PlaybackModel::new(50);
        assert!(playback.set_volume(150));
        assert_eq!(playback.volume(), 100);
        assert!(!playback.set_volume(100));
        assert!(playback.set_volume(-20));
        assert_eq!(playback.volume(), 0);
        assert_eq!(PlaybackModel::new(200).volume(), 100);
    }

    #[test]
    fn test_quiet_window() {
        let now = Instant::now();
        let mut ownership = SessionOwnership::default();
        assert!(ownership.is_quiet(now, Duration::from_secs(30)));

        ownership.last_volume_event_at = Some(now);
        assert!(!ownership.is_quiet(now + Duration::from_secs(29), Duration::from_secs(30)));
        assert!(ownership.is_quiet(now + Duration::from_secs(30), Duration::from_secs(30)));
    }
}
