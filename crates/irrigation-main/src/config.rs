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

mod validation;

pub use validation::ValidationResult;

use anyhow::{Context, Result};
use irrigation_core::{
    PrecipitationMode, SiteParameters, SolarRadiationMode, ZoneConfig, ZoneSensors,
    persistence::DEFAULT_STATE_DIR, sunshine::DEFAULT_SOLAR_RADIATION_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub system: SystemSettings,

    /// Site overrides; missing values are read from Home Assistant
    #[serde(default)]
    pub site: SiteSettings,

    /// Irrigation zones (one or more)
    #[serde(default)]
    pub zones: Vec<ZoneSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Home Assistant base URL (optional, defaults to supervisor)
    #[serde(default)]
    pub ha_base_url: Option<String>,

    /// Home Assistant token (optional, uses SUPERVISOR_TOKEN if not set)
    #[serde(default)]
    pub ha_token: Option<String>,

    /// How often sensor states are polled (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Directory holding one state file per zone
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// IANA timezone; taken from Home Assistant when not set
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SiteSettings {
    pub latitude: Option<f64>,
    /// Metres above sea level
    pub elevation: Option<f64>,
}

/// One irrigation zone as written in the options file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub name: String,
    pub number_of_sprinklers: u32,
    /// L/min per sprinkler
    pub flow: f64,
    /// m²
    pub area: f64,
    /// Run time cap in seconds, 0 disables it
    #[serde(default)]
    pub maximum_duration: f64,
    #[serde(default = "default_wind_measurement_height")]
    pub wind_measurement_height: f64,

    pub temperature_sensor: String,
    pub humidity_sensor: String,
    pub pressure_sensor: String,
    pub wind_speed_sensor: String,
    pub solar_radiation_sensor: String,
    pub precipitation_sensor: String,

    /// Use the radiation sensor directly instead of estimating sunshine hours
    #[serde(default)]
    pub accurate_solar_radiation: bool,
    #[serde(default = "default_solar_radiation_threshold")]
    pub solar_radiation_threshold: f64,
    #[serde(default)]
    pub precipitation_sensor_type: PrecipitationMode,
    #[serde(default)]
    pub backfill_temperature_humidity: bool,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_state_dir() -> String {
    DEFAULT_STATE_DIR.to_string()
}

fn default_wind_measurement_height() -> f64 {
    2.0
}

fn default_solar_radiation_threshold() -> f64 {
    DEFAULT_SOLAR_RADIATION_THRESHOLD
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            ha_base_url: None,
            ha_token: None,
            poll_interval_secs: default_poll_interval_secs(),
            state_dir: default_state_dir(),
            timezone: None,
        }
    }
}

impl ZoneSettings {
    fn sensors(&self) -> ZoneSensors {
        ZoneSensors {
            temperature: self.temperature_sensor.clone(),
            humidity: self.humidity_sensor.clone(),
            pressure: self.pressure_sensor.clone(),
            wind_speed: self.wind_speed_sensor.clone(),
            solar_radiation: self.solar_radiation_sensor.clone(),
            precipitation: self.precipitation_sensor.clone(),
        }
    }

    /// Engine configuration of this zone at the given site
    pub fn to_zone_config(&self, latitude: f64, elevation: f64) -> ZoneConfig {
        let site = SiteParameters {
            latitude,
            elevation,
            wind_measurement_height: self.wind_measurement_height,
        };

        let mut config = ZoneConfig::new(self.name.clone(), site, self.sensors());
        config.number_of_sprinklers = self.number_of_sprinklers;
        config.flow = self.flow;
        config.area = self.area;
        config.maximum_duration = self.maximum_duration;
        config.solar_radiation_threshold = self.solar_radiation_threshold;
        config.precipitation_mode = self.precipitation_sensor_type;
        config.solar_radiation_mode = if self.accurate_solar_radiation {
            SolarRadiationMode::Direct
        } else {
            SolarRadiationMode::Sunshine
        };
        config.backfill_temperature_humidity = self.backfill_temperature_humidity;
        config
    }
}

impl AppConfig {
    /// Load configuration from HA addon options or config file
    pub fn load() -> Result<Self> {
        for path in ["/data/options.json", "config.toml", "config.json"] {
            if Path::new(path).exists() {
                let config = Self::load_from(path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML or JSON file, chosen by extension
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut config: AppConfig = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };
        config.apply_env_overrides();

        info!("✅ Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HA_BASE_URL") {
            self.system.ha_base_url = Some(url);
        }
        if let Ok(token) = std::env::var("HA_TOKEN") {
            self.system.ha_token = Some(token);
        }
        if let Ok(interval) = std::env::var("IRRIGATION_POLL_INTERVAL_SECS")
            && let Ok(secs) = interval.parse::<u64>()
        {
            self.system.poll_interval_secs = secs;
        }
        if let Ok(dir) = std::env::var("IRRIGATION_STATE_DIR") {
            self.system.state_dir = dir;
        }
    }

    /// Validate configuration with field-level errors and warnings
    pub fn validate_detailed(&self) -> ValidationResult {
        let mut result = ValidationResult::success();

        if self.zones.is_empty() {
            result.add_error("zones", "Configuration must include at least one zone");
            return result;
        }

        if self.system.poll_interval_secs == 0 {
            result.add_error("system.poll_interval_secs", "Poll interval must be at least 1 second");
        } else if self.system.poll_interval_secs > 300 {
            result.add_warning(
                "system.poll_interval_secs",
                "Polling slower than every 5 minutes makes daily extremes unreliable",
            );
        }

        if let Some(latitude) = self.site.latitude
            && !(-90.0..=90.0).contains(&latitude)
        {
            result.add_error("site.latitude", format!("Latitude {latitude} is outside -90..=90"));
        }

        let mut names = HashSet::new();
        for (idx, zone) in self.zones.iter().enumerate() {
            let prefix = format!("zones[{idx}]");

            if zone.name.trim().is_empty() {
                result.add_error(format!("{prefix}.name"), "Zone name cannot be empty");
            } else if !names.insert(zone.name.trim().to_lowercase()) {
                result.add_error(
                    format!("{prefix}.name"),
                    format!("Duplicate zone name '{}'", zone.name),
                );
            }

            if zone.number_of_sprinklers == 0 {
                result.add_error(
                    format!("{prefix}.number_of_sprinklers"),
                    "At least one sprinkler is required",
                );
            }
            for (field, value) in [
                ("flow", zone.flow),
                ("area", zone.area),
                ("wind_measurement_height", zone.wind_measurement_height),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    result.add_error(format!("{prefix}.{field}"), format!("Must be positive (got {value})"));
                }
            }
            if !(zone.maximum_duration.is_finite() && zone.maximum_duration >= 0.0) {
                result.add_error(
                    format!("{prefix}.maximum_duration"),
                    "Maximum duration cannot be negative",
                );
            }
            if !(zone.solar_radiation_threshold.is_finite() && zone.solar_radiation_threshold >= 0.0) {
                result.add_error(
                    format!("{prefix}.solar_radiation_threshold"),
                    "Threshold cannot be negative",
                );
            }

            for (field, entity) in [
                ("temperature_sensor", &zone.temperature_sensor),
                ("humidity_sensor", &zone.humidity_sensor),
                ("pressure_sensor", &zone.pressure_sensor),
                ("wind_speed_sensor", &zone.wind_speed_sensor),
                ("solar_radiation_sensor", &zone.solar_radiation_sensor),
                ("precipitation_sensor", &zone.precipitation_sensor),
            ] {
                if entity.trim().is_empty() {
                    result.add_error(format!("{prefix}.{field}"), "Sensor entity is required");
                } else if !entity.contains('.') {
                    result.add_warning(
                        format!("{prefix}.{field}"),
                        format!("'{entity}' does not look like an entity id"),
                    );
                }
            }
        }

        result
    }

    /// Validate, logging warnings and failing on the first batch of errors
    pub fn validate(&self) -> Result<()> {
        for warning in self.validate_detailed().into_result()? {
            warn!("⚠️ Config: {}", warning);
        }
        Ok(())
    }

    /// Engine configurations of all zones.
    ///
    /// `location` is the (latitude, elevation) reported by Home Assistant;
    /// values in `site` take precedence.
    pub fn zone_configs(&self, location: Option<(f64, f64)>) -> Result<Vec<ZoneConfig>> {
        let latitude = self
            .site
            .latitude
            .or(location.map(|(latitude, _)| latitude))
            .context("Site latitude is neither configured nor available from Home Assistant")?;
        let elevation = self
            .site
            .elevation
            .or(location.map(|(_, elevation)| elevation))
            .context("Site elevation is neither configured nor available from Home Assistant")?;

        Ok(self
            .zones
            .iter()
            .map(|zone| zone.to_zone_config(latitude, elevation))
            .collect())
    }

    /// Whether both site values are configured locally
    pub fn has_site(&self) -> bool {
        self.site.latitude.is_some() && self.site.elevation.is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.system.poll_interval_secs)
    }
}
