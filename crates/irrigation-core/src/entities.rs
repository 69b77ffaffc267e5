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

//! Sensor entities exposed for each zone.
//!
//! A single [`IrrigationSensor`] type covers all four published quantities;
//! what differs between them lives in a static [`SensorDescriptor`].

use crate::engine::{WaterBalanceEngine, ZoneSnapshot};
use crate::readings::SensorChannel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const ICON: &str = "mdi:sprinkler";

pub const ATTR_SUNSHINE_HOURS: &str = "sunshine_hours";
pub const ATTR_MIN_TEMP: &str = "min_temp";
pub const ATTR_MAX_TEMP: &str = "max_temp";
pub const ATTR_MIN_RH: &str = "min_rh";
pub const ATTR_MAX_RH: &str = "max_rh";
pub const ATTR_MEAN_WIND: &str = "mean_wind";
pub const ATTR_MEAN_PRESSURE: &str = "mean_pressure";
pub const ATTR_MEAN_RADIATION: &str = "mean_radiation";
pub const ATTR_PRECIPITATION: &str = "precipitation";
pub const ATTR_THROUGHPUT: &str = "throughput";
pub const ATTR_PRECIPITATION_RATE: &str = "precipitation_rate";

/// Operator actions an entity may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    /// `reset_bucket` service: clear deficit and run time
    Reset,
    /// `force_daily_update` service: immediate rollover
    ForceUpdate,
}

impl EntityAction {
    pub fn service_name(self) -> &'static str {
        match self {
            EntityAction::Reset => "reset_bucket",
            EntityAction::ForceUpdate => "force_daily_update",
        }
    }

    pub fn from_service_name(name: &str) -> Option<Self> {
        match name {
            "reset_bucket" => Some(EntityAction::Reset),
            "force_daily_update" => Some(EntityAction::ForceUpdate),
            _ => None,
        }
    }
}

/// Last persisted state of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoredEntity {
    pub native_value: Option<f64>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RestoredEntity {
    fn attribute(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(Value::as_f64)
    }
}

/// Restore blob for a whole zone, keyed by descriptor key.
pub type ZoneRestoreState = BTreeMap<String, RestoredEntity>;

/// State of one entity ready to be written to the host platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedState {
    pub entity_id: String,
    pub state: f64,
    pub attributes: Map<String, Value>,
}

#[derive(Debug)]
pub struct SensorDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub device_class: Option<&'static str>,
    pub actions: &'static [EntityAction],
    value: fn(&ZoneSnapshot) -> f64,
    attributes: fn(&ZoneSnapshot) -> Map<String, Value>,
    restore: fn(&mut WaterBalanceEngine, &RestoredEntity),
}

fn insert_some(attributes: &mut Map<String, Value>, key: &str, value: Option<f64>) {
    if let Some(value) = value.filter(|v| v.is_finite()) {
        attributes.insert(key.to_owned(), json!(value));
    }
}

fn no_attributes(_: &ZoneSnapshot) -> Map<String, Value> {
    Map::new()
}

fn evapotranspiration_attributes(snapshot: &ZoneSnapshot) -> Map<String, Value> {
    let mut attributes = Map::new();
    insert_some(&mut attributes, ATTR_SUNSHINE_HOURS, Some(snapshot.sunshine_hours));
    insert_some(&mut attributes, ATTR_MIN_TEMP, snapshot.temperature.min);
    insert_some(&mut attributes, ATTR_MAX_TEMP, snapshot.temperature.max);
    insert_some(&mut attributes, ATTR_MIN_RH, snapshot.humidity.min);
    insert_some(&mut attributes, ATTR_MAX_RH, snapshot.humidity.max);
    insert_some(&mut attributes, ATTR_MEAN_WIND, snapshot.wind_speed.mean);
    insert_some(&mut attributes, ATTR_MEAN_PRESSURE, snapshot.pressure.mean);
    insert_some(&mut attributes, ATTR_MEAN_RADIATION, snapshot.solar_radiation.mean);
    attributes
}

fn restore_evapotranspiration(engine: &mut WaterBalanceEngine, restored: &RestoredEntity) {
    if let Some(value) = restored.native_value {
        engine.restore_evapotranspiration(value);
    }
    // Means are rebuilt from history, only extremes come back from here
    engine.restore_tracker_range(
        SensorChannel::Temperature,
        restored.attribute(ATTR_MIN_TEMP),
        restored.attribute(ATTR_MAX_TEMP),
    );
    engine.restore_tracker_range(
        SensorChannel::Humidity,
        restored.attribute(ATTR_MIN_RH),
        restored.attribute(ATTR_MAX_RH),
    );
    if let Some(hours) = restored.attribute(ATTR_SUNSHINE_HOURS) {
        engine.restore_sunshine_hours(hours);
    }
}

fn bucket_delta_attributes(snapshot: &ZoneSnapshot) -> Map<String, Value> {
    let mut attributes = Map::new();
    insert_some(&mut attributes, ATTR_PRECIPITATION, Some(snapshot.precipitation_today));
    attributes
}

fn restore_bucket_delta(engine: &mut WaterBalanceEngine, restored: &RestoredEntity) {
    if let Some(value) = restored.native_value {
        engine.restore_bucket_delta(value);
    }
    if let Some(precipitation) = restored.attribute(ATTR_PRECIPITATION) {
        engine.restore_precipitation_today(precipitation);
    }
}

fn restore_bucket(engine: &mut WaterBalanceEngine, restored: &RestoredEntity) {
    if let Some(value) = restored.native_value {
        engine.restore_bucket(value);
    }
}

fn run_time_attributes(snapshot: &ZoneSnapshot) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("number_of_sprinklers".to_owned(), json!(snapshot.number_of_sprinklers));
    insert_some(&mut attributes, "flow", Some(snapshot.flow));
    insert_some(&mut attributes, ATTR_THROUGHPUT, Some(snapshot.throughput));
    insert_some(&mut attributes, "area", Some(snapshot.area));
    insert_some(&mut attributes, ATTR_PRECIPITATION_RATE, Some(snapshot.precipitation_rate));
    insert_some(&mut attributes, "maximum_duration", Some(snapshot.maximum_duration));
    attributes
}

fn restore_run_time(engine: &mut WaterBalanceEngine, restored: &RestoredEntity) {
    if let Some(value) = restored.native_value {
        engine.restore_run_time(value);
    }
}

pub static EVAPOTRANSPIRATION: SensorDescriptor = SensorDescriptor {
    key: "evapotranspiration",
    name: "evapotranspiration",
    unit: "mm",
    device_class: None,
    actions: &[EntityAction::ForceUpdate],
    value: |snapshot| snapshot.evapotranspiration,
    attributes: evapotranspiration_attributes,
    restore: restore_evapotranspiration,
};

pub static BUCKET_DELTA: SensorDescriptor = SensorDescriptor {
    key: "bucket_delta",
    name: "bucket delta",
    unit: "mm",
    device_class: None,
    actions: &[],
    value: |snapshot| snapshot.bucket_delta,
    attributes: bucket_delta_attributes,
    restore: restore_bucket_delta,
};

pub static BUCKET: SensorDescriptor = SensorDescriptor {
    key: "bucket",
    name: "bucket",
    unit: "mm",
    device_class: None,
    actions: &[EntityAction::Reset],
    value: |snapshot| snapshot.bucket,
    attributes: no_attributes,
    restore: restore_bucket,
};

pub static RUN_TIME: SensorDescriptor = SensorDescriptor {
    key: "run_time",
    name: "run time",
    unit: "s",
    device_class: Some("duration"),
    actions: &[EntityAction::Reset],
    value: |snapshot| snapshot.run_time,
    attributes: run_time_attributes,
    restore: restore_run_time,
};

pub static DESCRIPTORS: [&SensorDescriptor; 4] = [&EVAPOTRANSPIRATION, &BUCKET_DELTA, &BUCKET, &RUN_TIME];

/// Lowercase, underscore-separated form of a zone name for entity ids.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// One published quantity of one zone.
#[derive(Debug, Clone)]
pub struct IrrigationSensor {
    zone: String,
    entity_id: String,
    descriptor: &'static SensorDescriptor,
}

impl IrrigationSensor {
    pub fn new(zone: &str, descriptor: &'static SensorDescriptor) -> Self {
        Self {
            zone: zone.to_owned(),
            entity_id: format!("sensor.{}_{}", slugify(zone), descriptor.key),
            descriptor,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn key(&self) -> &'static str {
        self.descriptor.key
    }

    pub fn friendly_name(&self) -> String {
        format!("{} {}", self.zone, self.descriptor.name)
    }

    pub fn supports(&self, action: EntityAction) -> bool {
        self.descriptor.actions.contains(&action)
    }

    pub fn value(&self, snapshot: &ZoneSnapshot) -> f64 {
        (self.descriptor.value)(snapshot)
    }

    /// State to publish, or `None` if the value is NaN or infinite.
    pub fn state(&self, snapshot: &ZoneSnapshot) -> Option<PublishedState> {
        let value = self.value(snapshot);
        if !value.is_finite() {
            return None;
        }

        let mut attributes = (self.descriptor.attributes)(snapshot);
        attributes.insert("unit_of_measurement".to_owned(), json!(self.descriptor.unit));
        attributes.insert("friendly_name".to_owned(), json!(self.friendly_name()));
        attributes.insert("icon".to_owned(), json!(ICON));
        attributes.insert("state_class".to_owned(), json!("measurement"));
        if let Some(device_class) = self.descriptor.device_class {
            attributes.insert("device_class".to_owned(), json!(device_class));
        }

        Some(PublishedState {
            entity_id: self.entity_id.clone(),
            state: value,
            attributes,
        })
    }

    /// Persistable form of this entity's current state.
    pub fn capture(&self, snapshot: &ZoneSnapshot) -> RestoredEntity {
        let value = self.value(snapshot);
        RestoredEntity {
            native_value: value.is_finite().then_some(value),
            attributes: (self.descriptor.attributes)(snapshot),
        }
    }

    pub fn restore(&self, engine: &mut WaterBalanceEngine, restored: &RestoredEntity) {
        (self.descriptor.restore)(engine, restored);
    }
}

/// The four entities of a zone, in publishing order.
pub fn zone_sensors(zone: &str) -> Vec<IrrigationSensor> {
    DESCRIPTORS
        .iter()
        .copied()
        .map(|descriptor| IrrigationSensor::new(zone, descriptor))
        .collect()
}

pub fn capture_zone(sensors: &[IrrigationSensor], snapshot: &ZoneSnapshot) -> ZoneRestoreState {
    sensors
        .iter()
        .map(|sensor| (sensor.key().to_owned(), sensor.capture(snapshot)))
        .collect()
}

pub fn restore_zone(sensors: &[IrrigationSensor], engine: &mut WaterBalanceEngine, state: &ZoneRestoreState) {
    for sensor in sensors {
        if let Some(restored) = state.get(sensor.key()) {
            sensor.restore(engine, restored);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ZoneConfig, ZoneSensors};
    use crate::evapotranspiration::SiteParameters;
    use crate::readings::SensorReading;
    use chrono::{TimeZone, Utc};

    fn engine() -> WaterBalanceEngine {
        let mut config = ZoneConfig::new(
            "Back Yard / Roses",
            SiteParameters {
                latitude: 49.2,
                elevation: 300.0,
                wind_measurement_height: 10.0,
            },
            ZoneSensors {
                temperature: "sensor.t".to_string(),
                humidity: "sensor.rh".to_string(),
                pressure: "sensor.p".to_string(),
                wind_speed: "sensor.ws".to_string(),
                solar_radiation: "sensor.rad".to_string(),
                precipitation: "sensor.rain".to_string(),
            },
        );
        config.number_of_sprinklers = 3;
        config.flow = 4.0;
        config.area = 18.0;
        config.maximum_duration = 1800.0;
        WaterBalanceEngine::new(config).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Back Yard / Roses"), "back_yard_roses");
        assert_eq!(slugify("  Lawn 2 "), "lawn_2");
        assert_eq!(slugify("Žluté květy"), "lut_kv_ty");
    }

    #[test]
    fn test_entity_ids_and_actions() {
        let sensors = zone_sensors("Back Yard / Roses");
        let ids: Vec<&str> = sensors.iter().map(IrrigationSensor::entity_id).collect();
        assert_eq!(
            ids,
            vec![
                "sensor.back_yard_roses_evapotranspiration",
                "sensor.back_yard_roses_bucket_delta",
                "sensor.back_yard_roses_bucket",
                "sensor.back_yard_roses_run_time",
            ]
        );

        assert!(sensors[0].supports(EntityAction::ForceUpdate));
        assert!(!sensors[0].supports(EntityAction::Reset));
        assert!(!sensors[1].supports(EntityAction::Reset));
        assert!(sensors[2].supports(EntityAction::Reset));
        assert!(sensors[3].supports(EntityAction::Reset));
    }

    #[test]
    fn test_run_time_state_attributes() {
        let engine = engine();
        let state = IrrigationSensor::new("Back Yard / Roses", &RUN_TIME)
            .state(&engine.snapshot())
            .unwrap();

        assert_eq!(state.state, 0.0);
        assert_eq!(state.attributes["number_of_sprinklers"], json!(3));
        assert_eq!(state.attributes[ATTR_THROUGHPUT], json!(12.0));
        assert_eq!(state.attributes[ATTR_PRECIPITATION_RATE], json!(40.0));
        assert_eq!(state.attributes["maximum_duration"], json!(1800.0));
        assert_eq!(state.attributes["device_class"], json!("duration"));
        assert_eq!(state.attributes["unit_of_measurement"], json!("s"));
        assert_eq!(state.attributes["friendly_name"], json!("Back Yard / Roses run time"));
    }

    #[test]
    fn test_non_finite_values_are_not_published() {
        let engine = engine();
        let mut snapshot = engine.snapshot();
        snapshot.bucket = f64::NAN;

        let bucket = IrrigationSensor::new("Back Yard / Roses", &BUCKET);
        assert!(bucket.state(&snapshot).is_none());
        assert_eq!(bucket.capture(&snapshot).native_value, None);
    }

    #[test]
    fn test_capture_and_restore_zone() {
        let mut source_engine = engine();
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 14, 0, 0).unwrap();
        for (channel, value) in [
            (SensorChannel::Temperature, 14.0),
            (SensorChannel::Temperature, 27.5),
            (SensorChannel::Humidity, 41.0),
            (SensorChannel::Humidity, 88.0),
            (SensorChannel::Precipitation, 3.2),
        ] {
            source_engine.handle_reading(&SensorReading::numeric(channel, at, value, None));
        }
        source_engine.restore_evapotranspiration(4.37);
        source_engine.restore_bucket(-12.5);
        source_engine.restore_bucket_delta(-2.1);
        source_engine.restore_run_time(1125.0);
        source_engine.restore_sunshine_hours(6.5);

        let sensors = zone_sensors("Back Yard / Roses");
        let blob = capture_zone(&sensors, &source_engine.snapshot());
        assert_eq!(blob.len(), 4);

        let mut restored = engine();
        restore_zone(&sensors, &mut restored, &blob);

        let before = source_engine.snapshot();
        let after = restored.snapshot();
        assert_eq!(after.evapotranspiration, 4.37);
        assert_eq!(after.bucket, -12.5);
        assert_eq!(after.bucket_delta, -2.1);
        assert_eq!(after.run_time, 1125.0);
        assert_eq!(after.precipitation_today, 3.2);
        assert!((after.sunshine_hours - 6.5).abs() < 1e-9);
        assert_eq!(after.temperature.min, before.temperature.min);
        assert_eq!(after.temperature.max, before.temperature.max);
        assert_eq!(after.humidity.min, Some(41.0));
        assert_eq!(after.humidity.max, Some(88.0));
        // Pressure and wind are rebuilt from history, not restored
        assert!(after.pressure.min.is_none());
    }

    #[test]
    fn test_service_names() {
        assert_eq!(
            EntityAction::from_service_name("reset_bucket"),
            Some(EntityAction::Reset)
        );
        assert_eq!(
            EntityAction::from_service_name(EntityAction::ForceUpdate.service_name()),
            Some(EntityAction::ForceUpdate)
        );
        assert_eq!(EntityAction::from_service_name("water_now"), None);
    }
}
