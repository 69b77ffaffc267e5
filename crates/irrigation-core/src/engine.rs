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

//! Daily water-balance state machine for one irrigation zone.
//!
//! Sensor readings are folded into per-day statistics as they arrive. Once a
//! day the statistics are turned into an ET₀ estimate, the difference between
//! rainfall and ET₀ is added to the bucket, and a sprinkler run time is derived
//! from any deficit.

use crate::config::{PrecipitationMode, SolarRadiationMode, ZoneConfig};
use crate::errors::ConfigError;
use crate::evapotranspiration::{DailyWeather, SolarInput, estimate_daily};
use crate::listeners::{ListenerHandle, ListenerRegistry};
use crate::readings::{HistorySample, SensorChannel, SensorReading, SensorValue};
use crate::stats::StatTracker;
use crate::sunshine::SunlightAccumulator;
use crate::units::normalize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

/// Statistics of one tracker at the time a snapshot was taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackerSummary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub count: u64,
}

impl From<&StatTracker> for TrackerSummary {
    fn from(tracker: &StatTracker) -> Self {
        Self {
            min: tracker.min(),
            max: tracker.max(),
            mean: tracker.mean(),
            count: tracker.count(),
        }
    }
}

/// Read-only view of a zone handed to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSnapshot {
    pub zone: String,
    pub evapotranspiration: f64,
    pub precipitation_today: f64,
    pub bucket_delta: f64,
    pub bucket: f64,
    pub run_time: f64,
    pub number_of_sprinklers: u32,
    pub flow: f64,
    pub area: f64,
    pub throughput: f64,
    pub precipitation_rate: f64,
    pub maximum_duration: f64,
    pub temperature: TrackerSummary,
    pub humidity: TrackerSummary,
    pub pressure: TrackerSummary,
    pub wind_speed: TrackerSummary,
    pub solar_radiation: TrackerSummary,
    pub sunshine_hours: f64,
}

/// Result of one daily rollover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloverOutcome {
    /// False when ET₀ was skipped for lack of data and the previous value reused
    pub evapotranspiration_updated: bool,
    pub evapotranspiration: f64,
    pub bucket_delta: f64,
    pub bucket: f64,
    pub run_time: f64,
}

#[derive(Debug)]
pub struct WaterBalanceEngine {
    config: ZoneConfig,

    temperature: StatTracker,
    humidity: StatTracker,
    pressure: StatTracker,
    wind_speed: StatTracker,
    solar_radiation: StatTracker,
    sunshine: SunlightAccumulator,

    evapotranspiration: f64,
    precipitation_today: f64,
    bucket_delta: f64,
    bucket: f64,
    run_time: f64,

    /// Latest precipitation reading, sampled by the hourly step
    latest_precipitation: Option<f64>,
    /// Timestamp of the first live reading per channel; older history is
    /// merged, newer history is already counted
    live_since: HashMap<SensorChannel, DateTime<Utc>>,

    listeners: ListenerRegistry,
}

impl WaterBalanceEngine {
    pub fn new(config: ZoneConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            "💧 [ENGINE] Zone '{}': {} sprinklers × {} L/min over {} m² ({:.2} mm/h)",
            config.name,
            config.number_of_sprinklers,
            config.flow,
            config.area,
            config.precipitation_rate()
        );

        Ok(Self {
            sunshine: SunlightAccumulator::new(config.solar_radiation_threshold),
            config,
            temperature: StatTracker::new(),
            humidity: StatTracker::new(),
            pressure: StatTracker::new(),
            wind_speed: StatTracker::new(),
            solar_radiation: StatTracker::new(),
            evapotranspiration: 0.0,
            precipitation_today: 0.0,
            bucket_delta: 0.0,
            bucket: 0.0,
            run_time: 0.0,
            latest_precipitation: None,
            live_since: HashMap::new(),
            listeners: ListenerRegistry::new(),
        })
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn evapotranspiration(&self) -> f64 {
        self.evapotranspiration
    }

    pub fn precipitation_today(&self) -> f64 {
        self.precipitation_today
    }

    pub fn bucket_delta(&self) -> f64 {
        self.bucket_delta
    }

    pub fn bucket(&self) -> f64 {
        self.bucket
    }

    pub fn run_time(&self) -> f64 {
        self.run_time
    }

    /// Fold one live reading into the day's state.
    ///
    /// Returns false when the reading was dropped: placeholder or
    /// non-numeric state, or a unit that cannot be converted.
    pub fn handle_reading(&mut self, reading: &SensorReading) -> bool {
        let Some(raw) = reading.value.as_f64() else {
            trace!(
                "[ENGINE] {}: dropping {} reading {:?}",
                self.config.name, reading.channel, reading.value
            );
            self.forget_hourly_precipitation(reading.channel);
            return false;
        };

        let value = match normalize(reading.channel, raw, reading.unit.as_deref()) {
            Ok(value) => value,
            Err(e) => {
                warn!("⚠️ [ENGINE] {}: {}", self.config.name, e);
                self.forget_hourly_precipitation(reading.channel);
                return false;
            }
        };

        if reading.channel != SensorChannel::Precipitation {
            self.live_since
                .entry(reading.channel)
                .or_insert(reading.timestamp);
        }

        match reading.channel {
            SensorChannel::Temperature => self.temperature.update(value),
            SensorChannel::Humidity => self.humidity.update(value),
            SensorChannel::Pressure => self.pressure.update(value),
            SensorChannel::WindSpeed => self.wind_speed.update(value),
            SensorChannel::SolarRadiation => match self.config.solar_radiation_mode {
                SolarRadiationMode::Direct => self.solar_radiation.update(value),
                SolarRadiationMode::Sunshine => self.sunshine.update(value, reading.timestamp),
            },
            SensorChannel::Precipitation => match self.config.precipitation_mode {
                PrecipitationMode::Cumulative => self.precipitation_today = value,
                PrecipitationMode::Hourly => self.latest_precipitation = Some(value),
            },
        }

        trace!(
            "[ENGINE] {}: {} = {:.2} {}",
            self.config.name,
            reading.channel,
            value,
            reading.channel.canonical_unit()
        );
        true
    }

    /// The hourly sensor has no current value; skip accumulation until it
    /// reports a number again.
    fn forget_hourly_precipitation(&mut self, channel: SensorChannel) {
        if channel == SensorChannel::Precipitation
            && self.config.precipitation_mode == PrecipitationMode::Hourly
        {
            self.latest_precipitation = None;
        }
    }

    /// Add the current precipitation reading to today's total.
    ///
    /// Only meaningful in hourly mode; a no-op otherwise or when no reading
    /// has been seen yet.
    pub fn accumulate_hourly(&mut self) -> bool {
        if self.config.precipitation_mode != PrecipitationMode::Hourly {
            return false;
        }
        let Some(amount) = self.latest_precipitation else {
            debug!(
                "[ENGINE] {}: no precipitation reading for hourly accumulation",
                self.config.name
            );
            return false;
        };

        self.precipitation_today += amount;
        debug!(
            "🌧️ [ENGINE] {}: +{:.2} mm, {:.2} mm today",
            self.config.name, amount, self.precipitation_today
        );
        self.notify_listeners();
        true
    }

    /// Close the day: ET₀, then bucket, then run time, then notify.
    pub fn update_daily(&mut self, day_of_year: u32) -> RolloverOutcome {
        let evapotranspiration_updated = self.update_evapotranspiration(day_of_year);
        self.update_bucket();
        self.update_run_time();

        info!(
            "🔄 [ROLLOVER] {} (day {}): ET₀ {:.2} mm{}, Δ {:.2} mm, bucket {:.2} mm, run time {:.0} s",
            self.config.name,
            day_of_year,
            self.evapotranspiration,
            if evapotranspiration_updated { "" } else { " (stale)" },
            self.bucket_delta,
            self.bucket,
            self.run_time
        );

        self.notify_listeners();

        RolloverOutcome {
            evapotranspiration_updated,
            evapotranspiration: self.evapotranspiration,
            bucket_delta: self.bucket_delta,
            bucket: self.bucket,
            run_time: self.run_time,
        }
    }

    /// Operator-triggered rollover outside the daily schedule.
    pub fn force_daily_update(&mut self, day_of_year: u32) -> RolloverOutcome {
        info!("⏩ [ROLLOVER] {}: forced daily update", self.config.name);
        self.update_daily(day_of_year)
    }

    /// Clear the deficit and run time, e.g. after manual watering.
    pub fn reset(&mut self) {
        info!(
            "🧹 [ENGINE] {}: bucket reset (was {:.2} mm, {:.0} s)",
            self.config.name, self.bucket, self.run_time
        );
        self.bucket = 0.0;
        self.run_time = 0.0;
        self.notify_listeners();
    }

    fn update_evapotranspiration(&mut self, day_of_year: u32) -> bool {
        let (
            Some(temperature_min),
            Some(temperature_max),
            Some(humidity_min),
            Some(humidity_max),
            Some(pressure),
            Some(wind_speed),
        ) = (
            self.temperature.min(),
            self.temperature.max(),
            self.humidity.min(),
            self.humidity.max(),
            self.pressure.mean(),
            self.wind_speed.mean(),
        )
        else {
            warn!(
                "⚠️ [ROLLOVER] {}: missing data (temperature={}, humidity={}, pressure={}, wind={}), keeping ET₀ {:.2} mm",
                self.config.name,
                self.temperature.count(),
                self.humidity.count(),
                self.pressure.count(),
                self.wind_speed.count(),
                self.evapotranspiration
            );
            return false;
        };

        let solar = match (self.config.solar_radiation_mode, self.solar_radiation.mean()) {
            (SolarRadiationMode::Direct, Some(radiation)) => SolarInput::Radiation(radiation),
            _ => SolarInput::SunshineHours(self.sunshine.hours()),
        };

        let weather = DailyWeather {
            temperature_min,
            temperature_max,
            humidity_min,
            humidity_max,
            pressure,
            wind_speed,
            solar,
        };
        let et0 = estimate_daily(day_of_year, &self.config.site, &weather);
        debug!("[ROLLOVER] {}: {:?} -> ET₀ {}", self.config.name, weather, et0);

        if !et0.is_finite() {
            warn!(
                "⚠️ [ROLLOVER] {}: ET₀ estimate is not finite, keeping {:.2} mm",
                self.config.name, self.evapotranspiration
            );
            return false;
        }
        self.evapotranspiration = (et0 * 100.0).round() / 100.0;

        self.temperature.reset();
        self.humidity.reset();
        self.pressure.reset();
        self.wind_speed.reset();
        self.solar_radiation.reset();
        self.sunshine.reset();
        self.live_since.clear();
        true
    }

    fn update_bucket(&mut self) {
        self.bucket_delta = self.precipitation_today - self.evapotranspiration;
        self.precipitation_today = 0.0;
        self.bucket += self.bucket_delta;
    }

    fn update_run_time(&mut self) {
        self.run_time = if self.bucket < 0.0 {
            let run_time = self.bucket.abs() / self.config.precipitation_rate() * 3600.0;
            if self.config.maximum_duration > 0.0 {
                run_time.min(self.config.maximum_duration)
            } else {
                run_time
            }
        } else {
            0.0
        };
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        ZoneSnapshot {
            zone: self.config.name.clone(),
            evapotranspiration: self.evapotranspiration,
            precipitation_today: self.precipitation_today,
            bucket_delta: self.bucket_delta,
            bucket: self.bucket,
            run_time: self.run_time,
            number_of_sprinklers: self.config.number_of_sprinklers,
            flow: self.config.flow,
            area: self.config.area,
            throughput: self.config.throughput(),
            precipitation_rate: self.config.precipitation_rate(),
            maximum_duration: self.config.maximum_duration,
            temperature: (&self.temperature).into(),
            humidity: (&self.humidity).into(),
            pressure: (&self.pressure).into(),
            wind_speed: (&self.wind_speed).into(),
            solar_radiation: (&self.solar_radiation).into(),
            sunshine_hours: self.sunshine.hours(),
        }
    }

    pub fn add_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&ZoneSnapshot) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_listeners(&self) {
        if !self.listeners.is_empty() {
            self.listeners.notify(&self.snapshot());
        }
    }

    /// Channels whose same-day history is replayed at startup.
    ///
    /// Temperature and humidity extremes normally come back from restored
    /// entity attributes instead.
    pub fn backfill_channels(&self) -> Vec<SensorChannel> {
        let mut channels = vec![SensorChannel::WindSpeed, SensorChannel::Pressure];
        if self.config.solar_radiation_mode == SolarRadiationMode::Direct {
            channels.push(SensorChannel::SolarRadiation);
        }
        if self.config.backfill_temperature_humidity {
            channels.push(SensorChannel::Temperature);
            channels.push(SensorChannel::Humidity);
        }
        channels
    }

    /// Merge historical readings of one channel into its tracker.
    ///
    /// Readings at or after the first live reading of the channel are
    /// already counted and are ignored, so the merge result does not depend
    /// on whether history arrives before or after live updates.
    pub fn apply_history(&mut self, channel: SensorChannel, readings: &[SensorReading]) -> usize {
        let cutoff = self.live_since.get(&channel).copied();
        let samples: Vec<HistorySample> = readings
            .iter()
            .filter(|reading| reading.channel == channel)
            .filter(|reading| cutoff.is_none_or(|cutoff| reading.timestamp < cutoff))
            .map(|reading| {
                let value = match reading.value.as_f64() {
                    Some(raw) => normalize(channel, raw, reading.unit.as_deref())
                        .map_or_else(|e| SensorValue::Invalid(e.to_string()), SensorValue::Numeric),
                    None => reading.value.clone(),
                };
                HistorySample::new(reading.timestamp, value)
            })
            .collect();

        let tracker = match channel {
            SensorChannel::Temperature => &mut self.temperature,
            SensorChannel::Humidity => &mut self.humidity,
            SensorChannel::Pressure => &mut self.pressure,
            SensorChannel::WindSpeed => &mut self.wind_speed,
            SensorChannel::SolarRadiation => &mut self.solar_radiation,
            SensorChannel::Precipitation => {
                debug!(
                    "[ENGINE] {}: precipitation history is not replayed",
                    self.config.name
                );
                return 0;
            }
        };

        let accepted = tracker.load_history(&samples);
        info!(
            "📊 [ENGINE] {}: merged {}/{} historical {} samples",
            self.config.name,
            accepted,
            readings.len(),
            channel
        );
        accepted
    }

    pub fn restore_evapotranspiration(&mut self, value: f64) {
        if value.is_finite() {
            self.evapotranspiration = value;
        }
    }

    pub fn restore_bucket_delta(&mut self, value: f64) {
        if value.is_finite() {
            self.bucket_delta = value;
        }
    }

    pub fn restore_precipitation_today(&mut self, value: f64) {
        if value.is_finite() {
            self.precipitation_today = value;
        }
    }

    pub fn restore_bucket(&mut self, value: f64) {
        if value.is_finite() {
            self.bucket = value;
        }
    }

    pub fn restore_run_time(&mut self, value: f64) {
        if value.is_finite() && value >= 0.0 {
            self.run_time = value;
        }
    }

    /// Seed a tracker's extremes from persisted attributes.
    pub fn restore_tracker_range(&mut self, channel: SensorChannel, min: Option<f64>, max: Option<f64>) {
        let tracker = match channel {
            SensorChannel::Temperature => &mut self.temperature,
            SensorChannel::Humidity => &mut self.humidity,
            SensorChannel::Pressure => &mut self.pressure,
            SensorChannel::WindSpeed => &mut self.wind_speed,
            SensorChannel::SolarRadiation => &mut self.solar_radiation,
            SensorChannel::Precipitation => return,
        };
        for value in [min, max].into_iter().flatten().filter(|v| v.is_finite()) {
            tracker.update(value);
        }
    }

    pub fn restore_sunshine_hours(&mut self, hours: f64) {
        self.sunshine.restore_hours(hours);
    }
}
