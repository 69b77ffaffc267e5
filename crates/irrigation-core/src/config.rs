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

//! Per-zone configuration consumed by the water-balance engine.

use crate::errors::ConfigError;
use crate::evapotranspiration::SiteParameters;
use crate::readings::SensorChannel;
use crate::sunshine::DEFAULT_SOLAR_RADIATION_THRESHOLD;
use serde::{Deserialize, Serialize};

/// How the precipitation sensor reports rainfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationMode {
    /// Running daily total, the latest value replaces the day's amount
    #[default]
    Cumulative,
    /// Per-interval amount, sampled and added once an hour
    Hourly,
}

/// How the solar radiation sensor feeds the ET₀ estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolarRadiationMode {
    /// Mean of measured W/m² values
    Direct,
    /// Bright sunshine hours above a radiation threshold
    #[default]
    Sunshine,
}

/// Entity ids of the six weather sensors a zone listens to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSensors {
    pub temperature: String,
    pub humidity: String,
    pub pressure: String,
    pub wind_speed: String,
    pub solar_radiation: String,
    pub precipitation: String,
}

impl ZoneSensors {
    pub fn entity(&self, channel: SensorChannel) -> &str {
        match channel {
            SensorChannel::Temperature => &self.temperature,
            SensorChannel::Humidity => &self.humidity,
            SensorChannel::Pressure => &self.pressure,
            SensorChannel::WindSpeed => &self.wind_speed,
            SensorChannel::SolarRadiation => &self.solar_radiation,
            SensorChannel::Precipitation => &self.precipitation,
        }
    }

    /// Channel an entity id is routed to, if it belongs to this zone.
    pub fn channel_of(&self, entity_id: &str) -> Option<SensorChannel> {
        SensorChannel::ALL
            .into_iter()
            .find(|channel| self.entity(*channel) == entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorChannel, &str)> + '_ {
        SensorChannel::ALL
            .into_iter()
            .map(|channel| (channel, self.entity(channel)))
    }
}

/// Validated configuration of one irrigation zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    pub number_of_sprinklers: u32,
    /// Flow of a single sprinkler, L/min
    pub flow: f64,
    /// Irrigated area, m²
    pub area: f64,
    pub site: SiteParameters,
    pub sensors: ZoneSensors,
    pub precipitation_mode: PrecipitationMode,
    pub solar_radiation_mode: SolarRadiationMode,
    /// W/m² watermark used in sunshine mode
    pub solar_radiation_threshold: f64,
    /// Upper bound on run time in seconds, 0 disables the cap
    pub maximum_duration: f64,
    /// Also replay temperature and humidity history at startup
    pub backfill_temperature_humidity: bool,
}

impl ZoneConfig {
    pub fn new(name: impl Into<String>, site: SiteParameters, sensors: ZoneSensors) -> Self {
        Self {
            name: name.into(),
            number_of_sprinklers: 1,
            flow: 1.0,
            area: 1.0,
            site,
            sensors,
            precipitation_mode: PrecipitationMode::default(),
            solar_radiation_mode: SolarRadiationMode::default(),
            solar_radiation_threshold: DEFAULT_SOLAR_RADIATION_THRESHOLD,
            maximum_duration: 0.0,
            backfill_temperature_humidity: false,
        }
    }

    /// Total flow of all sprinklers, L/min.
    pub fn throughput(&self) -> f64 {
        f64::from(self.number_of_sprinklers) * self.flow
    }

    /// Water depth delivered over the area, mm/h.
    pub fn precipitation_rate(&self) -> f64 {
        self.throughput() * 60.0 / self.area
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let finite_fields = [
            ("flow", self.flow),
            ("area", self.area),
            ("latitude", self.site.latitude),
            ("elevation", self.site.elevation),
            ("wind_measurement_height", self.site.wind_measurement_height),
            ("solar_radiation_threshold", self.solar_radiation_threshold),
            ("maximum_duration", self.maximum_duration),
        ];
        if let Some((field, _)) = finite_fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConfigError::NotFinite { field: *field });
        }

        if self.number_of_sprinklers == 0 {
            return Err(ConfigError::NotPositive {
                field: "number_of_sprinklers",
                value: 0.0,
            });
        }
        for (field, value) in [
            ("flow", self.flow),
            ("area", self.area),
            ("wind_measurement_height", self.site.wind_measurement_height),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [
            ("maximum_duration", self.maximum_duration),
            ("solar_radiation_threshold", self.solar_radiation_threshold),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if !(-90.0..=90.0).contains(&self.site.latitude) {
            return Err(ConfigError::LatitudeOutOfRange(self.site.latitude));
        }

        if let Some((channel, _)) = self.sensors.iter().find(|(_, entity)| entity.trim().is_empty()) {
            return Err(ConfigError::MissingSensor(channel));
        }

        Ok(())
    }
}
