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

use crate::entities::PublishedState;
use crate::readings::{SensorChannel, SensorReading, SensorValue};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A state change of a host platform entity, before it is routed to a zone.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: SensorValue,
    pub unit: Option<String>,
}

impl SensorEvent {
    /// Reading as seen by a zone that maps this entity to `channel`.
    pub fn reading_for(&self, channel: SensorChannel) -> SensorReading {
        SensorReading {
            channel,
            timestamp: self.timestamp,
            value: self.value.clone(),
            unit: self.unit.clone(),
        }
    }
}

/// Abstract source of current sensor states (the sensor bus)
#[async_trait]
pub trait SensorStateSource: Send + Sync {
    /// Read the current state of an entity
    async fn current_state(&self, entity_id: &str) -> Result<SensorEvent>;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Abstract source of recorded sensor history
#[async_trait]
pub trait HistoryDataSource: Send + Sync {
    /// All recorded state changes of an entity from `since` until now.
    /// Non-numeric states are returned too, classified in `SensorEvent::value`.
    async fn history_since(&self, entity_id: &str, since: DateTime<Utc>) -> Result<Vec<SensorEvent>>;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Abstract sink for published zone entities
#[async_trait]
pub trait EntityStatePublisher: Send + Sync {
    async fn publish(&self, state: &PublishedState) -> Result<()>;

    /// Get publisher name for logging
    fn name(&self) -> &str;
}
