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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaEntityState {
    pub entity_id: String,
    pub state: String,
    pub attributes: serde_json::Value,
    pub last_changed: String,
    pub last_updated: String,
}

impl HaEntityState {
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.attributes
            .get("unit_of_measurement")
            .and_then(|unit| unit.as_str())
    }

    pub fn last_updated_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.last_updated)
    }
}

/// Historical state point from HA history API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaHistoryState {
    #[serde(default)]
    pub entity_id: Option<String>,
    pub state: String,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
    pub last_changed: String,
    /// Omitted by HA when equal to `last_changed`
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl HaHistoryState {
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.attributes
            .as_ref()?
            .get("unit_of_measurement")
            .and_then(|unit| unit.as_str())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.last_updated.as_deref().unwrap_or(&self.last_changed))
    }
}

/// Site location from the HA core configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HaLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level
    pub elevation: f64,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
