/// Timing and policy configuration for the bridge
use std::time::Duration;

/// Quiet window after which an active session is considered possibly evicted
pub const DEFAULT_QUIET_WINDOW_SECS: u64 = 30;

/// Interval of the in-process session refresh timer
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Period of the externally scheduled wake job
pub const DEFAULT_SCHEDULED_WAKE_MINS: u64 = 15;

/// Flex window of the scheduled wake job (fires somewhere in the last `flex` of the period)
pub const DEFAULT_SCHEDULED_WAKE_FLEX_MINS: u64 = 5;

/// Delay of the one-shot backup restart alarm
pub const DEFAULT_BACKUP_ALARM_SECS: u64 = 60;

/// Volume change per unit of adjust direction
pub const DEFAULT_VOLUME_STEP: i32 = 5;

/// Connect and request timeout for remote calls
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Volume assumed before the first remote state fetch
pub const DEFAULT_INITIAL_VOLUME: u8 = 50;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Whether a volume event that leaves the value unchanged still counts as a
/// liveness heartbeat for the quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPolicy {
    /// Every volume callback refreshes the quiet window.
    AnyVolumeEvent,
    /// Only callbacks that change the volume refresh the quiet window.
    ChangedVolumeOnly,
}

impl HeartbeatPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" | "any_volume_event" => Some(Self::AnyVolumeEvent),
            "changed" | "changed_volume_only" => Some(Self::ChangedVolumeOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub quiet_window: Duration,
    pub refresh_interval: Duration,
    pub scheduled_wake_period: Duration,
    pub scheduled_wake_flex: Duration,
    pub backup_alarm_delay: Duration,
    pub volume_step: i32,
    pub http_timeout: Duration,
    pub initial_volume: u8,
    pub heartbeat_policy: HeartbeatPolicy,
    pub notification_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            quiet_window: Duration::from_secs(DEFAULT_QUIET_WINDOW_SECS),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            scheduled_wake_period: Duration::from_secs(DEFAULT_SCHEDULED_WAKE_MINS * 60),
            scheduled_wake_flex: Duration::from_secs(DEFAULT_SCHEDULED_WAKE_FLEX_MINS * 60),
            backup_alarm_delay: Duration::from_secs(DEFAULT_BACKUP_ALARM_SECS),
            volume_step: DEFAULT_VOLUME_STEP,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            initial_volume: DEFAULT_INITIAL_VOLUME,
            heartbeat_policy: HeartbeatPolicy::AnyVolumeEvent,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `HAMB_*` environment variables.
    ///
    /// Values that fail to parse are logged and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("HAMB_QUIET_WINDOW_SECS") {
            config.quiet_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("HAMB_REFRESH_INTERVAL_SECS") {
            config.refresh_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(mins) = env_u64("HAMB_SCHEDULED_WAKE_MINS") {
            config.scheduled_wake_period = Duration::from_secs(mins.max(1).saturating_mul(60));
        }
        if let Some(mins) = env_u64("HAMB_SCHEDULED_WAKE_FLEX_MINS") {
            config.scheduled_wake_flex = Duration::from_secs(mins.saturating_mul(60));
        }
        if let Some(secs) = env_u64("HAMB_BACKUP_ALARM_SECS") {
            config.backup_alarm_delay = Duration::from_secs(secs.max(1));
        }
        if let Some(step) = env_u64("HAMB_VOLUME_STEP") {
            config.volume_step = step.clamp(1, 100) as i32;
        }
        if let Some(secs) = env_u64("HAMB_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs.max(1));
        }
        if let Ok(raw) = std::env::var("HAMB_HEARTBEAT_POLICY") {
            match HeartbeatPolicy::parse(&raw) {
                Some(policy) => config.heartbeat_policy = policy,
                None => log::warn!("Ignoring invalid HAMB_HEARTBEAT_POLICY value '{}'", raw),
            }
        }

        // Flex can never exceed the period itself
        if config.scheduled_wake_flex > config.scheduled_wake_period {
            config.scheduled_wake_flex = config.scheduled_wake_period;
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring invalid {} value '{}'", key, raw);
            None
        }
    }
}
