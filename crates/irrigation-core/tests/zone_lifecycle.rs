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

use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use irrigation_core::*;
use parking_lot::Mutex;
use std::sync::Arc;

fn lawn() -> ZoneConfig {
    let mut config = ZoneConfig::new(
        "Lawn",
        SiteParameters {
            latitude: 45.0,
            elevation: 100.0,
            wind_measurement_height: 2.0,
        },
        ZoneSensors {
            temperature: "sensor.garden_temperature".to_string(),
            humidity: "sensor.garden_humidity".to_string(),
            pressure: "sensor.garden_pressure".to_string(),
            wind_speed: "sensor.garden_wind".to_string(),
            solar_radiation: "sensor.garden_radiation".to_string(),
            precipitation: "sensor.garden_rain".to_string(),
        },
    );
    config.number_of_sprinklers = 2;
    config.flow = 5.0;
    config.area = 60.0;
    config.solar_radiation_mode = SolarRadiationMode::Direct;
    config
}

fn april_10_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 10, 8, 0, 0).unwrap()
}

fn build_app(clock: &IrrigationClock, zones: Vec<ZoneConfig>) -> App {
    let mut app = App::new();
    app.add_plugins(IrrigationCorePlugin)
        .insert_resource(clock.clone())
        .insert_resource(IrrigationZones(zones));
    app
}

fn event(entity_id: &str, at: DateTime<Utc>, value: f64, unit: &str) -> SensorEvent {
    SensorEvent {
        entity_id: entity_id.to_string(),
        timestamp: at,
        value: SensorValue::Numeric(value),
        unit: Some(unit.to_string()),
    }
}

fn send_spring_day(app: &App, at: DateTime<Utc>) {
    let sender = app.world().resource::<SensorEventSender>().clone();
    for event in [
        event("sensor.garden_temperature", at, 10.0, "°C"),
        event("sensor.garden_temperature", at, 20.0, "°C"),
        event("sensor.garden_humidity", at, 30.0, "%"),
        event("sensor.garden_humidity", at, 70.0, "%"),
        event("sensor.garden_pressure", at, 1013.0, "hPa"),
        event("sensor.garden_wind", at, 2.0, "m/s"),
        event("sensor.garden_radiation", at, 500.0, "W/m²"),
    ] {
        sender.send(event).unwrap();
    }
}

type Recorded = Arc<Mutex<Vec<ZoneSnapshot>>>;

fn listen(app: &mut App) -> (ListenerHandle, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();
    let mut query = app.world_mut().query::<&ZoneEngine>();
    let zone = query.single(app.world()).unwrap();
    let handle = zone.0.add_listener(move |snapshot| sink.lock().push(snapshot.clone()));
    (handle, recorded)
}

fn with_engine<R>(app: &mut App, f: impl FnOnce(&WaterBalanceEngine) -> R) -> R {
    let mut query = app.world_mut().query::<&ZoneEngine>();
    let zone = query.single(app.world()).unwrap();
    f(&zone.0)
}

fn triggers_armed(app: &mut App) -> bool {
    let mut query = app.world_mut().query::<&ZoneTriggers>();
    query.single(app.world()).unwrap().0.is_armed()
}

#[test]
fn test_zone_is_idle_until_someone_listens() {
    let clock = IrrigationClock::manual(april_10_morning());
    let mut app = build_app(&clock, vec![lawn()]);
    app.update();

    assert!(!triggers_armed(&mut app));

    // Not subscribed to the sensor bus yet
    send_spring_day(&app, april_10_morning());
    app.update();
    assert_eq!(with_engine(&mut app, |engine| engine.snapshot().temperature.count), 0);

    let (handle, _) = listen(&mut app);
    app.update();
    assert!(triggers_armed(&mut app));

    assert!(handle.unsubscribe());
    app.update();
    assert!(!triggers_armed(&mut app));
}

#[test]
fn test_daily_rollover_runs_at_local_midnight() {
    let clock = IrrigationClock::manual(april_10_morning());
    let mut app = build_app(&clock, vec![lawn()]);
    app.update();
    let (_handle, recorded) = listen(&mut app);
    app.update();

    send_spring_day(&app, april_10_morning());
    app.update();
    assert_eq!(with_engine(&mut app, |engine| engine.snapshot().temperature.count), 2);

    // Just before the rollover nothing changes
    clock.set(Utc.with_ymd_and_hms(2025, 4, 11, 0, 0, 5).unwrap());
    app.update();
    assert_eq!(with_engine(&mut app, |engine| engine.evapotranspiration()), 0.0);

    clock.set(Utc.with_ymd_and_hms(2025, 4, 11, 0, 0, 15).unwrap());
    app.update();

    let (et0, bucket, run_time) = with_engine(&mut app, |engine| {
        (engine.evapotranspiration(), engine.bucket(), engine.run_time())
    });
    // Day 100 at 45°N, see the estimator tests
    assert!((et0 - 5.52).abs() < 1e-9);
    assert!((bucket + 5.52).abs() < 1e-9);
    assert!((run_time - 5.52 / 10.0 * 3600.0).abs() < 1e-6);

    let last = recorded.lock().last().cloned().unwrap();
    assert!((last.bucket + 5.52).abs() < 1e-9);
    assert_eq!(last.temperature.count, 0);
}

#[test]
fn test_entity_refresh_notifies_every_minute() {
    let clock = IrrigationClock::manual(april_10_morning());
    let mut app = build_app(&clock, vec![lawn()]);
    app.update();
    let (_handle, recorded) = listen(&mut app);
    app.update();
    assert!(recorded.lock().is_empty());

    clock.advance(TimeDelta::seconds(41));
    app.update();
    assert_eq!(recorded.lock().len(), 1);

    clock.advance(TimeDelta::seconds(30));
    app.update();
    assert_eq!(recorded.lock().len(), 1);

    clock.advance(TimeDelta::seconds(30));
    app.update();
    assert_eq!(recorded.lock().len(), 2);
}

#[test]
fn test_hourly_mode_accumulates_rain_on_the_hour() {
    let mut config = lawn();
    config.precipitation_mode = PrecipitationMode::Hourly;
    let clock = IrrigationClock::manual(april_10_morning());
    let mut app = build_app(&clock, vec![config]);
    app.update();
    let (_handle, _) = listen(&mut app);
    app.update();

    let sender = app.world().resource::<SensorEventSender>().clone();
    sender
        .send(event("sensor.garden_rain", april_10_morning(), 1.25, "mm"))
        .unwrap();
    app.update();

    clock.set(Utc.with_ymd_and_hms(2025, 4, 10, 9, 0, 1).unwrap());
    app.update();
    clock.set(Utc.with_ymd_and_hms(2025, 4, 10, 10, 0, 1).unwrap());
    app.update();

    let today = with_engine(&mut app, |engine| engine.precipitation_today());
    assert!((today - 2.5).abs() < 1e-9);
}

#[test]
fn test_services_and_commands() {
    let clock = IrrigationClock::manual(april_10_morning());
    let mut app = build_app(&clock, vec![lawn()]);
    app.update();
    let (_handle, _) = listen(&mut app);
    app.update();

    send_spring_day(&app, april_10_morning());
    let commands = app.world().resource::<ZoneCommandSender>().clone();
    commands
        .call_service("sensor.lawn_evapotranspiration", "force_daily_update")
        .unwrap();
    app.update();
    assert!(with_engine(&mut app, |engine| engine.bucket()) < 0.0);

    // The ET₀ entity has no reset service
    commands
        .call_service("sensor.lawn_evapotranspiration", "reset_bucket")
        .unwrap();
    app.update();
    assert!(with_engine(&mut app, |engine| engine.bucket()) < 0.0);

    commands
        .call_service("sensor.lawn_run_time", "reset_bucket")
        .unwrap();
    app.update();
    assert_eq!(
        with_engine(&mut app, |engine| (engine.bucket(), engine.run_time())),
        (0.0, 0.0)
    );

    commands
        .send(ZoneCommand::Remove {
            zone: "Lawn".to_string(),
        })
        .unwrap();
    app.update();
    let mut query = app.world_mut().query::<&ZoneEngine>();
    assert_eq!(query.iter(app.world()).count(), 0);
}

#[test]
fn test_invalid_zone_is_skipped() {
    let mut broken = lawn();
    broken.name = "Broken".to_string();
    broken.area = 0.0;

    let clock = IrrigationClock::manual(april_10_morning());
    let mut app = build_app(&clock, vec![broken, lawn()]);
    app.update();

    let mut query = app.world_mut().query::<&ZoneEngine>();
    let names: Vec<String> = query
        .iter(app.world())
        .map(|zone| zone.0.name().to_string())
        .collect();
    assert_eq!(names, vec!["Lawn".to_string()]);
}
