use crate::utils::logger::{log_event, LogEvent, NetworkDetails, NetworkStatus};

/// Network error categories for remote call diagnostics
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    Timeout { duration_ms: u64 },
    AuthenticationFailed,
    ConnectionRefused { endpoint: String },
    Unknown { message: String },
}

impl From<NetworkError> for NetworkStatus {
    fn from(error: NetworkError) -> Self {
        match error {
            NetworkError::Timeout { duration_ms } => NetworkStatus::Timeout { duration_ms },
            NetworkError::AuthenticationFailed => NetworkStatus::Failed {
                error: "Authentication failed".to_string(),
            },
            NetworkError::ConnectionRefused { endpoint } => NetworkStatus::Failed {
                error: format!("Connection refused: {}", endpoint),
            },
            NetworkError::Unknown { message } => NetworkStatus::Failed { error: message },
        }
    }
}

/// Categorise a transport-level reqwest failure
pub fn classify_reqwest_error(error: &reqwest::Error, duration_ms: u64) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout { duration_ms }
    } else if error.is_connect() {
        NetworkError::ConnectionRefused {
            endpoint: error
                .url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    } else {
        NetworkError::Unknown {
            message: error.to_string(),
        }
    }
}

/// Log API response with details using structured logging
pub fn log_api_response(
    operation: &str,
    method: &str,
    endpoint: &str,
    status_code: u16,
    duration_ms: u64,
) {
    let status = if (200..300).contains(&status_code) {
        NetworkStatus::Success
    } else {
        NetworkStatus::Failed {
            error: format!("HTTP {}", status_code),
        }
    };

    log_event(LogEvent::Network {
        operation: operation.to_string(),
        status,
        duration_ms,
        details: Some(NetworkDetails {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code: Some(status_code),
        }),
    });

    if duration_ms > 5000 {
        log::warn!("⚠️ SLOW_API_RESPONSE: {}ms for {}", duration_ms, operation);
    }
}

/// Log network error with categorization and timing
pub fn log_network_error_with_duration(operation: &str, error: NetworkError, duration_ms: u64) {
    log_event(LogEvent::Network {
        operation: operation.to_string(),
        status: error.clone().into(),
        duration_ms,
        details: None,
    });

    match error {
        NetworkError::Timeout { .. } => {
            log::error!("  • Suggestion: Check that Home Assistant is reachable from this device");
        }
        NetworkError::AuthenticationFailed => {
            log::error!("  • Suggestion: Sign in to Home Assistant again");
        }
        NetworkError::ConnectionRefused { .. } => {
            log::error!("  • Suggestion: Check the Home Assistant URL and port");
        }
        NetworkError::Unknown { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        let status: NetworkStatus = NetworkError::Timeout { duration_ms: 10_000 }.into();
        assert!(matches!(status, NetworkStatus::Timeout { duration_ms: 10_000 }));

        let status: NetworkStatus = NetworkError::ConnectionRefused {
            endpoint: "http://ha".to_string(),
        }
        .into();
        match status {
            NetworkStatus::Failed { error } => assert!(error.contains("http://ha")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_connect_error() {
        // Nothing listens on port 9 of localhost in the test environment
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/api/")
            .send()
            .await
            .unwrap_err();
        let classified = classify_reqwest_error(&err, 3);
        assert!(matches!(
            classified,
            NetworkError::ConnectionRefused { .. } | NetworkError::Unknown { .. }
        ));
    }
}
