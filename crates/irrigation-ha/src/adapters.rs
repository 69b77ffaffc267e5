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

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::client::HomeAssistantClient;
use irrigation_core::{
    EntityStatePublisher, HistoryDataSource, PublishedState, SensorEvent, SensorStateSource,
    SensorValue,
};

/// Home Assistant adapter implementing SensorStateSource
pub struct HaSensorStateAdapter {
    client: Arc<HomeAssistantClient>,
}

impl HaSensorStateAdapter {
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SensorStateSource for HaSensorStateAdapter {
    async fn current_state(&self, entity_id: &str) -> Result<SensorEvent> {
        let state = self
            .client
            .get_state(entity_id)
            .await
            .with_context(|| format!("Failed to read entity: {}", entity_id))?;

        let timestamp = state.last_updated_utc().with_context(|| {
            format!(
                "Invalid last_updated '{}' on entity {}",
                state.last_updated, entity_id
            )
        })?;

        trace!("📡 [ADAPTER] {} = '{}'", entity_id, state.state);
        Ok(SensorEvent {
            entity_id: entity_id.to_string(),
            timestamp,
            value: SensorValue::parse(Some(&state.state)),
            unit: state.unit_of_measurement().map(str::to_string),
        })
    }

    fn name(&self) -> &str {
        "home_assistant_states"
    }
}

/// Home Assistant adapter implementing HistoryDataSource
pub struct HaHistoryAdapter {
    client: Arc<HomeAssistantClient>,
}

impl HaHistoryAdapter {
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HistoryDataSource for HaHistoryAdapter {
    async fn history_since(&self, entity_id: &str, since: DateTime<Utc>) -> Result<Vec<SensorEvent>> {
        let history = self
            .client
            .get_history(entity_id, since, None)
            .await
            .with_context(|| format!("Failed to fetch history for {}", entity_id))?;

        // Later rows may omit attributes; the unit does not change within a day
        let unit = history
            .iter()
            .find_map(|state| state.unit_of_measurement())
            .map(str::to_string);

        let events: Vec<SensorEvent> = history
            .iter()
            .filter_map(|state| {
                let Some(timestamp) = state.timestamp() else {
                    trace!("Could not parse timestamp: {}", state.last_changed);
                    return None;
                };
                Some(SensorEvent {
                    entity_id: entity_id.to_string(),
                    timestamp,
                    value: SensorValue::parse(Some(&state.state)),
                    unit: unit.clone(),
                })
            })
            .collect();

        debug!(
            "📊 [ADAPTER] {} history rows for {} since {}",
            events.len(),
            entity_id,
            since
        );
        Ok(events)
    }

    fn name(&self) -> &str {
        "home_assistant_history"
    }
}

/// Home Assistant adapter implementing EntityStatePublisher
pub struct HaEntityPublisher {
    client: Arc<HomeAssistantClient>,
}

impl HaEntityPublisher {
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntityStatePublisher for HaEntityPublisher {
    async fn publish(&self, state: &PublishedState) -> Result<()> {
        self.client
            .set_state(
                &state.entity_id,
                &state.state.to_string(),
                &Value::Object(state.attributes.clone()),
            )
            .await
            .with_context(|| format!("Failed to publish {}", state.entity_id))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "home_assistant_entities"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(server: &Server) -> Arc<HomeAssistantClient> {
        Arc::new(HomeAssistantClient::new(server.url(), "test_token").unwrap())
    }

    #[tokio::test]
    async fn test_current_state_classifies_value_and_unit() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/states/sensor.garden_pressure")
            .with_status(200)
            .with_body(
                json!({
                    "entity_id": "sensor.garden_pressure",
                    "state": "29.92",
                    "attributes": {"unit_of_measurement": "inHg"},
                    "last_changed": "2025-06-01T10:00:00+00:00",
                    "last_updated": "2025-06-01T10:05:00+00:00"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = HaSensorStateAdapter::new(client(&server));
        let event = adapter.current_state("sensor.garden_pressure").await.unwrap();

        assert_eq!(event.value, SensorValue::Numeric(29.92));
        assert_eq!(event.unit.as_deref(), Some("inHg"));
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2025, 6, 1, 10, 5, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_current_state_unavailable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/states/sensor.garden_wind")
            .with_status(200)
            .with_body(
                json!({
                    "entity_id": "sensor.garden_wind",
                    "state": "unavailable",
                    "attributes": {},
                    "last_changed": "2025-06-01T10:00:00+00:00",
                    "last_updated": "2025-06-01T10:00:00+00:00"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = HaSensorStateAdapter::new(client(&server));
        let event = adapter.current_state("sensor.garden_wind").await.unwrap();
        assert_eq!(event.value, SensorValue::Unavailable);
        assert_eq!(event.unit, None);
    }

    #[tokio::test]
    async fn test_history_applies_first_known_unit() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/api/history/period/.*".to_string()))
            .with_status(200)
            .with_body(
                json!([[
                    {
                        "entity_id": "sensor.garden_wind",
                        "state": "18",
                        "attributes": {"unit_of_measurement": "km/h"},
                        "last_changed": "2025-06-01T01:00:00+00:00",
                        "last_updated": "2025-06-01T01:00:00+00:00"
                    },
                    {
                        "state": "unknown",
                        "last_changed": "2025-06-01T02:00:00+00:00"
                    },
                    {
                        "state": "9",
                        "last_changed": "not a timestamp"
                    }
                ]])
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = HaHistoryAdapter::new(client(&server));
        let since = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let events = adapter
            .history_since("sensor.garden_wind", since)
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].value, SensorValue::Numeric(18.0));
        assert_eq!(events[1].value, SensorValue::Unknown);
        assert!(events.iter().all(|event| event.unit.as_deref() == Some("km/h")));
    }

    #[tokio::test]
    async fn test_publisher_writes_state() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/states/sensor.lawn_run_time")
            .match_body(Matcher::PartialJson(json!({
                "state": "1987.2",
                "attributes": {"device_class": "duration"}
            })))
            .with_status(200)
            .with_body(
                json!({
                    "entity_id": "sensor.lawn_run_time",
                    "state": "1987.2",
                    "attributes": {"device_class": "duration"},
                    "last_changed": "2025-06-01T00:00:10+00:00",
                    "last_updated": "2025-06-01T00:00:10+00:00"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut attributes = serde_json::Map::new();
        attributes.insert("device_class".to_string(), json!("duration"));
        attributes.insert("unit_of_measurement".to_string(), json!("s"));

        let publisher = HaEntityPublisher::new(client(&server));
        publisher
            .publish(&PublishedState {
                entity_id: "sensor.lawn_run_time".to_string(),
                state: 1987.2,
                attributes,
            })
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
