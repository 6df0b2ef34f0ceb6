use super::{
    brightness_to_volume, EntityState, RemoteError, RemoteGateway, DEVICE_LIST_ENTITY,
    EVENT_SOURCE,
};
use crate::store::{device_list, ConfigStore, Device};
use crate::utils::network_diagnostics::{
    classify_reqwest_error, log_api_response, log_network_error_with_duration,
};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Home Assistant REST client.
///
/// URL and token are read from the store on every call so a re-login takes
/// effect without rebuilding the client.
pub struct HomeAssistantClient {
    client: Client,
    store: Arc<dyn ConfigStore>,
}

struct Endpoint {
    base_url: String,
    token: String,
}

impl HomeAssistantClient {
    pub fn new(store: Arc<dyn ConfigStore>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, store })
    }

    fn endpoint(&self) -> Result<Endpoint, RemoteError> {
        let settings = self.store.load();
        let base_url = settings.ha_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RemoteError::NotConfigured);
        }
        let token = match settings.access_token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(RemoteError::NotAuthenticated),
        };
        Ok(Endpoint { base_url, token })
    }

    /// Send a request with auth, timing and diagnostics
    async fn send(
        &self,
        operation: &str,
        method: &str,
        url: &str,
        request: RequestBuilder,
        token: &str,
    ) -> Result<Response, RemoteError> {
        let started = Instant::now();
        let result = request
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .send()
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                log_api_response(operation, method, url, response.status().as_u16(), duration_ms);
                Ok(response)
            }
            Err(e) => {
                let classified = classify_reqwest_error(&e, duration_ms);
                log_network_error_with_duration(operation, classified, duration_ms);
                if e.is_timeout() {
                    Err(RemoteError::Timeout(duration_ms))
                } else {
                    Err(RemoteError::Network(e.to_string()))
                }
            }
        }
    }

    async fn fail_with_body(response: Response) -> RemoteError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .ok()
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| "Unknown error".to_string());
        RemoteError::Http { status, body }
    }

    async fn read_json(response: Response) -> Result<Value, RemoteError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

/// Event payload: the caller's fields plus `source` and a local timestamp.
pub fn event_body(data: Map<String, Value>, now: DateTime<Local>) -> Value {
    let mut body = Map::new();
    body.insert("source".to_string(), json!(EVENT_SOURCE));
    body.insert(
        "timestamp".to_string(),
        json!(now.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()),
    );
    body.extend(data);
    Value::Object(body)
}

/// Parse a `/api/states/<entity>` reply
pub fn parse_entity_state(entity_id: &str, json: &Value) -> Result<EntityState, RemoteError> {
    let state = json
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::InvalidResponse("missing 'state' field".to_string()))?;

    let brightness = json
        .get("attributes")
        .and_then(|attributes| attributes.get("brightness"))
        .and_then(Value::as_f64)
        .and_then(|raw| brightness_to_volume(raw as i64));

    Ok(EntityState {
        entity_id: entity_id.to_string(),
        state: state.to_string(),
        brightness,
    })
}

/// Decode the roster helper state; placeholder states read as an empty roster.
pub fn parse_device_list_state(state: &str) -> Vec<Device> {
    let trimmed = state.trim();
    if trimmed.is_empty() || trimmed == "unknown" || trimmed == "unavailable" {
        return Vec::new();
    }
    device_list::decode(trimmed)
}

#[async_trait]
impl RemoteGateway for HomeAssistantClient {
    async fn fire_event(&self, event_type: &str, data: Map<String, Value>) -> Result<(), RemoteError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/api/events/{}", endpoint.base_url, event_type);
        let body = event_body(data, Local::now());

        log::debug!("Firing event {} with {}", event_type, body);
        let response = self
            .send(
                "HA_FIRE_EVENT",
                "POST",
                &url,
                self.client.post(&url).json(&body),
                &endpoint.token,
            )
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::fail_with_body(response).await)
        }
    }

    async fn get_entity_state(&self, entity_id: &str) -> Result<EntityState, RemoteError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/api/states/{}", endpoint.base_url, entity_id);

        let response = self
            .send("HA_ENTITY_STATE", "GET", &url, self.client.get(&url), &endpoint.token)
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }

        let json = Self::read_json(response).await?;
        let state = parse_entity_state(entity_id, &json)?;
        log::debug!(
            "Entity state: {} = {}, brightness = {:?}",
            state.entity_id,
            state.state,
            state.brightness
        );
        Ok(state)
    }

    async fn get_device_list(&self) -> Result<Vec<Device>, RemoteError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/api/states/{}", endpoint.base_url, DEVICE_LIST_ENTITY);

        let response = self
            .send("HA_GET_DEVICES", "GET", &url, self.client.get(&url), &endpoint.token)
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            log::info!("Device list entity not found in Home Assistant");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::fail_with_body(response).await);
        }

        let json = Self::read_json(response).await?;
        let state = json
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::InvalidResponse("missing 'state' field".to_string()))?;

        let devices = parse_device_list_state(state);
        log::info!("Fetched {} devices from Home Assistant", devices.len());
        Ok(devices)
    }

    async fn set_device_list(&self, devices: &[Device]) -> Result<(), RemoteError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/api/services/input_text/set_value", endpoint.base_url);
        let body = json!({
            "entity_id": DEVICE_LIST_ENTITY,
            "value": device_list::encode(devices),
        });

        let response = self
            .send(
                "HA_SET_DEVICES",
                "POST",
                &url,
                self.client.post(&url).json(&body),
                &endpoint.token,
            )
            .await?;

        if response.status().is_success() {
            log::info!("Pushed {} devices to Home Assistant", devices.len());
            Ok(())
        } else {
            Err(Self::fail_with_body(response).await)
        }
    }

    async fn test_connection(&self) -> Result<(), RemoteError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/api/", endpoint.base_url);

        let response = self
            .send("HA_TEST_CONNECTION", "GET", &url, self.client.get(&url), &endpoint.token)
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::fail_with_body(response).await)
        }
    }
}
