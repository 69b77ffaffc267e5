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

//! Sensor readings as they arrive from the host automation platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical weather quantity a sensor entity feeds into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorChannel {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    SolarRadiation,
    Precipitation,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 6] = [
        SensorChannel::Temperature,
        SensorChannel::Humidity,
        SensorChannel::Pressure,
        SensorChannel::WindSpeed,
        SensorChannel::SolarRadiation,
        SensorChannel::Precipitation,
    ];

    /// Unit every reading on this channel is normalized to.
    pub fn canonical_unit(self) -> &'static str {
        match self {
            SensorChannel::Temperature => "°C",
            SensorChannel::Humidity => "%",
            SensorChannel::Pressure => "hPa",
            SensorChannel::WindSpeed => "m/s",
            SensorChannel::SolarRadiation => "W/m²",
            SensorChannel::Precipitation => "mm",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorChannel::Temperature => "temperature",
            SensorChannel::Humidity => "humidity",
            SensorChannel::Pressure => "pressure",
            SensorChannel::WindSpeed => "wind_speed",
            SensorChannel::SolarRadiation => "solar_radiation",
            SensorChannel::Precipitation => "precipitation",
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported state of a sensor, classified before any numeric use.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Numeric(f64),
    Unavailable,
    Unknown,
    /// The entity reported no state at all
    Absent,
    /// A state that could not be read as a finite number
    Invalid(String),
}

impl SensorValue {
    /// Classify a raw state string the way Home Assistant reports it.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return SensorValue::Absent;
        };

        match raw.trim() {
            "" => SensorValue::Absent,
            "unavailable" => SensorValue::Unavailable,
            "unknown" => SensorValue::Unknown,
            other => match other.parse::<f64>() {
                Ok(value) if value.is_finite() => SensorValue::Numeric(value),
                _ => SensorValue::Invalid(other.to_owned()),
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Numeric(value) => Some(*value),
            SensorValue::Unavailable
            | SensorValue::Unknown
            | SensorValue::Absent
            | SensorValue::Invalid(_) => None,
        }
    }
}

/// One timestamped state change of a configured sensor entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub channel: SensorChannel,
    pub timestamp: DateTime<Utc>,
    pub value: SensorValue,
    /// Unit of measurement as declared by the source, if any
    pub unit: Option<String>,
}

impl SensorReading {
    pub fn new(
        channel: SensorChannel,
        timestamp: DateTime<Utc>,
        value: SensorValue,
        unit: Option<&str>,
    ) -> Self {
        Self {
            channel,
            timestamp,
            value,
            unit: unit.map(str::to_owned),
        }
    }

    pub fn numeric(
        channel: SensorChannel,
        timestamp: DateTime<Utc>,
        value: f64,
        unit: Option<&str>,
    ) -> Self {
        Self::new(channel, timestamp, SensorValue::Numeric(value), unit)
    }
}

/// Sample replayed into a tracker from historical storage.
///
/// Values are already normalized to the channel's canonical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    pub value: SensorValue,
}

impl HistorySample {
    pub fn new(timestamp: DateTime<Utc>, value: SensorValue) -> Self {
        Self { timestamp, value }
    }
}
