use serde::Serialize;
use std::time::Instant;

/// Structured logging utilities for the media bridge
///
/// Every wake, claim and remote call ends up as one line in the log so a
/// field report can be reconstructed from `logcat`/journal output alone.
///
/// ### Usage Guidelines
/// - **Claims and wakes**: always logged at info
/// - **Volume callbacks**: hot path, use `log_simple!` (debug builds only)
/// - **Remote calls**: `log_event(LogEvent::Network { .. })` with timing

/// Initialise the global logger once; later calls are ignored.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let result = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();

    if result.is_ok() {
        log::info!(
            "hamediabridge {} ({}) logging initialised",
            env!("CARGO_PKG_VERSION"),
            option_env!("HAMB_BUILD_CHANNEL").unwrap_or("dev")
        );
    }
}

/// Structured log event types
#[derive(Debug, Clone, Serialize)]
pub enum LogEvent {
    Operation {
        name: String,
        phase: OperationPhase,
    },
    Network {
        operation: String,
        status: NetworkStatus,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<NetworkDetails>,
    },
    Session {
        from: String,
        to: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub enum OperationPhase {
    Start,
    Complete { duration_ms: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub enum NetworkStatus {
    Success,
    Timeout { duration_ms: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkDetails {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
}

/// Render one structured event as a log line
pub fn log_event(event: LogEvent) {
    match event {
        LogEvent::Operation { name, phase } => match phase {
            OperationPhase::Start => {
                log::info!("🚀 {} STARTING", name);
            }
            OperationPhase::Complete { duration_ms } => {
                log::info!("✅ {} COMPLETE in {}ms", name, duration_ms);
            }
            OperationPhase::Failed { error } => {
                log::error!("❌ {} FAILED: {}", name, error);
            }
        },
        LogEvent::Network {
            operation,
            status,
            duration_ms,
            details,
        } => {
            let detail_str = details
                .map(|d| format!(" | {} {}", d.method, d.endpoint))
                .unwrap_or_default();
            match status {
                NetworkStatus::Success => {
                    log::info!("🌐 {} SUCCESS in {}ms{}", operation, duration_ms, detail_str);
                }
                NetworkStatus::Timeout { duration_ms: timeout } => {
                    log::error!("⏱️ {} TIMEOUT after {}ms{}", operation, timeout, detail_str);
                }
                NetworkStatus::Failed { error } => {
                    log::error!("❌ {} FAILED: {}{}", operation, error, detail_str);
                }
            }
        }
        LogEvent::Session { from, to, reason } => {
            log::info!("🔄 SESSION {} → {} ({})", from, to, reason);
        }
    }
}

/// Log async function with timing
#[inline]
pub async fn log_async_function<F, Fut, R>(name: &str, f: F) -> R
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = R>,
{
    if log::log_enabled!(log::Level::Info) {
        let start = Instant::now();
        log_event(LogEvent::Operation {
            name: name.to_string(),
            phase: OperationPhase::Start,
        });
        let result = f().await;
        log_event(LogEvent::Operation {
            name: name.to_string(),
            phase: OperationPhase::Complete {
                duration_ms: start.elapsed().as_millis() as u64,
            },
        });
        result
    } else {
        f().await
    }
}

/// Lightweight logging macro for hot paths
#[macro_export]
macro_rules! log_simple {
    ($operation:expr) => {
        #[cfg(debug_assertions)]
        {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("{}", $operation);
            }
        }
    };
    ($operation:expr, $($arg:expr),*) => {
        #[cfg(debug_assertions)]
        {
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("{}: {}", $operation, format!($($arg),*));
            }
        }
    };
}
