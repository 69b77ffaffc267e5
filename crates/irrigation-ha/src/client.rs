// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use crate::errors::{HaError, HaResult};
use crate::types::{HaEntityState, HaHistoryState, HaLocation};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantClient {
    /// Create a new HA client with custom configuration
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Create HA client using Supervisor API environment variables
    /// This is the standard method for HA addons
    pub fn from_supervisor() -> HaResult<Self> {
        let token = std::env::var("SUPERVISOR_TOKEN").map_err(|_| {
            HaError::ConfigError(
                "SUPERVISOR_TOKEN environment variable not set. Are you running as an HA addon?"
                    .to_string(),
            )
        })?;

        info!("Initializing HA client using Supervisor API");
        Self::new("http://supervisor/core", token)
    }

    /// Create HA client from configuration values
    /// Falls back to environment variables if config values are not set
    pub fn from_config(ha_base_url: Option<String>, ha_token: Option<String>) -> HaResult<Self> {
        let base_url = ha_base_url
            .or_else(|| std::env::var("HA_BASE_URL").ok())
            .unwrap_or_else(|| "http://localhost:8123".to_string());

        let token = ha_token
            .or_else(|| std::env::var("HA_TOKEN").ok())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config or HA_TOKEN environment variable".to_string(),
                )
            })?;

        info!("Initializing HA client from configuration: {}", base_url);
        Self::new(base_url, token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the state of a specific entity
    pub async fn get_state(&self, entity_id: &str) -> HaResult<HaEntityState> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        trace!("🔍 [HA QUERY] Getting state for entity: {}", entity_id);

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let state = response.json::<HaEntityState>().await?;
                trace!("✅ [HA RESULT] Entity: {} = '{}'", entity_id, state.state);
                Ok(state)
            }
            StatusCode::NOT_FOUND => {
                error!("❌ [HA ERROR] Entity not found: {}", entity_id);
                Err(HaError::EntityNotFound(entity_id.to_string()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!(
                    "❌ [HA ERROR] Authentication failed for entity: {}",
                    entity_id
                );
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA ERROR] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Create or overwrite the state of an entity
    ///
    /// HA answers 201 when the entity did not exist before and 200 otherwise.
    pub async fn set_state(
        &self,
        entity_id: &str,
        state: &str,
        attributes: &Value,
    ) -> HaResult<HaEntityState> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        let body = json!({
            "state": state,
            "attributes": attributes,
        });
        debug!("📤 [HA STATE] {} = {}", entity_id, state);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response.json::<HaEntityState>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA STATE] Authentication failed for: {}", entity_id);
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA STATE] Status {} for {}: {}", status, entity_id, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Health check - ping HA API
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url);
        debug!("Performing health check");

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let is_ok = response.status().is_success();
                if is_ok {
                    debug!("Health check passed");
                } else {
                    warn!("Health check failed: status {}", response.status());
                }
                Ok(is_ok)
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Get Home Assistant configuration (timezone, location, units)
    pub async fn get_config(&self) -> HaResult<Value> {
        let url = format!("{}/api/config", self.base_url);
        debug!("Fetching Home Assistant configuration");

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let config = response.json::<Value>().await?;
                debug!("✅ Retrieved HA configuration");
                Ok(config)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HaError::AuthenticationFailed),
            status => Err(HaError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Get Home Assistant timezone
    pub async fn get_timezone(&self) -> HaResult<String> {
        let config = self.get_config().await?;

        config
            .get("time_zone")
            .and_then(|tz| tz.as_str())
            .map(|tz| {
                info!("🌍 Home Assistant timezone: {}", tz);
                tz.to_string()
            })
            .ok_or_else(|| HaError::ConfigError("Timezone not found in HA config".to_string()))
    }

    /// Get the home location configured in Home Assistant
    pub async fn get_location(&self) -> HaResult<HaLocation> {
        let config = self.get_config().await?;
        let number = |key: &str| {
            config
                .get(key)
                .and_then(Value::as_f64)
                .ok_or_else(|| HaError::InvalidResponse(format!("'{}' missing in HA config", key)))
        };

        let location = HaLocation {
            latitude: number("latitude")?,
            longitude: number("longitude")?,
            elevation: number("elevation")?,
        };
        info!(
            "📍 Home Assistant location: {:.4}, {:.4}, {} m",
            location.latitude, location.longitude, location.elevation
        );
        Ok(location)
    }

    /// Get recorded state changes of an entity
    ///
    /// # Arguments
    /// * `entity_id` - Entity ID to fetch history for (e.g., "sensor.garden_wind")
    /// * `start_time` - Start of the time range
    /// * `end_time` - Optional end of the time range (defaults to now)
    ///
    /// Non-numeric states are kept; callers decide what to do with them.
    pub async fn get_history(
        &self,
        entity_id: &str,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> HaResult<Vec<HaHistoryState>> {
        let end = end_time.unwrap_or_else(Utc::now);

        // Format: /api/history/period/{start}?filter_entity_id={entity}&end_time={end}
        let start_str = start_time.to_rfc3339();
        let end_str = end.to_rfc3339();
        let end_encoded = urlencoding::encode(&end_str);

        let url = format!(
            "{}/api/history/period/{}?filter_entity_id={}&end_time={}",
            self.base_url, start_str, entity_id, end_encoded
        );

        debug!("📊 [HA HISTORY] Fetching history for: {}", entity_id);
        debug!("   Time range: {} to {}", start_str, end_str);

        let response = self
            .retry_request(|| async { self.client.get(&url).bearer_auth(&self.token).send().await })
            .await?;

        match response.status() {
            StatusCode::OK => {
                // One inner array per requested entity
                let mut history: Vec<Vec<HaHistoryState>> = response.json().await?;

                if history.is_empty() {
                    debug!("⚠️ [HA HISTORY] No history data returned for {}", entity_id);
                    return Ok(Vec::new());
                }

                let states = history.swap_remove(0);
                info!(
                    "✅ [HA HISTORY] Retrieved {} states for {}",
                    states.len(),
                    entity_id
                );
                Ok(states)
            }
            StatusCode::NOT_FOUND => {
                error!("❌ [HA HISTORY] Entity not found: {}", entity_id);
                Err(HaError::EntityNotFound(entity_id.to_string()))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [HA HISTORY] Authentication failed for: {}", entity_id);
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [HA HISTORY] Status {}: {}", status, error_text);
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> HaResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(HaError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::{Matcher, Server};

    fn entity_body(entity_id: &str, state: &str) -> String {
        json!({
            "entity_id": entity_id,
            "state": state,
            "attributes": {"unit_of_measurement": "°C"},
            "last_changed": "2025-06-01T10:00:00+00:00",
            "last_updated": "2025-06-01T10:00:00+00:00"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_get_state_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/sensor.garden_temperature")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(entity_body("sensor.garden_temperature", "21.4"))
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let state = client.get_state("sensor.garden_temperature").await.unwrap();

        assert_eq!(state.entity_id, "sensor.garden_temperature");
        assert_eq!(state.state, "21.4");
        assert_eq!(state.unit_of_measurement(), Some("°C"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/sensor.nonexistent")
            .with_status(404)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client.get_state("sensor.nonexistent").await;

        assert!(matches!(result, Err(HaError::EntityNotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/states/sensor.garden_temperature")
            .with_status(401)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "wrong").unwrap();
        let result = client.get_state("sensor.garden_temperature").await;

        assert!(matches!(result, Err(HaError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_set_state_posts_state_and_attributes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/states/sensor.lawn_bucket")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "state": "-4.02",
                "attributes": {"unit_of_measurement": "mm"}
            })))
            .with_status(201)
            .with_body(entity_body("sensor.lawn_bucket", "-4.02"))
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let state = client
            .set_state(
                "sensor.lawn_bucket",
                "-4.02",
                &json!({"unit_of_measurement": "mm"}),
            )
            .await
            .unwrap();

        assert_eq!(state.state, "-4.02");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_history_keeps_non_numeric_states() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                Matcher::Regex(r"^/api/history/period/2025-06-01T00:00:00\+00:00.*".to_string()),
            )
            .match_query(Matcher::UrlEncoded(
                "filter_entity_id".into(),
                "sensor.garden_wind".into(),
            ))
            .with_status(200)
            .with_body(
                json!([[
                    {
                        "entity_id": "sensor.garden_wind",
                        "state": "3.5",
                        "attributes": {"unit_of_measurement": "m/s"},
                        "last_changed": "2025-06-01T01:00:00+00:00",
                        "last_updated": "2025-06-01T01:00:00+00:00"
                    },
                    {
                        "entity_id": "sensor.garden_wind",
                        "state": "unavailable",
                        "attributes": {},
                        "last_changed": "2025-06-01T02:00:00+00:00",
                        "last_updated": "2025-06-01T02:00:00+00:00"
                    }
                ]])
                .to_string(),
            )
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let history = client
            .get_history("sensor.garden_wind", start, Some(start + chrono::TimeDelta::hours(12)))
            .await
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].unit_of_measurement(), Some("m/s"));
        assert_eq!(history[1].state, "unavailable");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_history_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/api/history/period/.*".to_string()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let history = client
            .get_history("sensor.garden_wind", Utc::now(), None)
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_get_location_and_timezone() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/config")
            .with_status(200)
            .with_body(
                json!({
                    "latitude": 50.08,
                    "longitude": 14.42,
                    "elevation": 235,
                    "time_zone": "Europe/Prague"
                })
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let location = client.get_location().await.unwrap();
        assert_eq!(location.latitude, 50.08);
        assert_eq!(location.elevation, 235.0);
        assert_eq!(client.get_timezone().await.unwrap(), "Europe/Prague");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        assert!(client.ping().await.unwrap());
        mock.assert_async().await;
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = HomeAssistantClient::new("http://homeassistant.local:8123/", "t").unwrap();
        assert_eq!(client.base_url(), "http://homeassistant.local:8123");
    }
}
