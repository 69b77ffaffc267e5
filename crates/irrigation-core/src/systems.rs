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

//! Zone lifecycle systems: setup, sensor ingestion, operator commands and
//! time-of-day triggers.

use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::{
    async_systems::{
        poll_history_backfill, spawn_entity_publisher, spawn_history_backfill, spawn_sensor_poller,
    },
    channels::{SensorEventChannel, ZoneCommand, ZoneCommandChannel, ZoneUpdate, ZoneUpdateSender},
    components::{ZoneEngine, ZoneEntities, ZoneTriggers},
    config::{PrecipitationMode, ZoneConfig},
    engine::WaterBalanceEngine,
    entities::{EntityAction, IrrigationSensor, capture_zone, restore_zone, zone_sensors},
    listeners::ListenerHandle,
    resources::{
        EntityPublisherResource, IrrigationClock, IrrigationZones, StatePersistenceResource,
        TimezoneConfig,
    },
    scheduling::{
        DAILY_ROLLOVER, ENTITY_REFRESH, HOURLY_PRECIPITATION, TimeOfDayTrigger, TriggerKind,
        ZoneSchedule, closing_day_of_year, current_day_of_year,
    },
};

/// Registers the zone lifecycle systems
pub struct ZoneSystemsPlugin;

impl Plugin for ZoneSystemsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (spawn_zones, spawn_history_backfill).chain())
            .add_systems(Startup, (spawn_sensor_poller, spawn_entity_publisher))
            .add_systems(
                Update,
                (
                    poll_history_backfill,
                    ingest_sensor_events,
                    process_zone_commands,
                    sync_zone_triggers,
                    run_zone_triggers,
                )
                    .chain(),
            );
    }
}

/// Triggers a zone subscribes to while it has listeners
pub fn zone_triggers(config: &ZoneConfig) -> Vec<TimeOfDayTrigger> {
    let mut triggers = vec![DAILY_ROLLOVER, ENTITY_REFRESH];
    if config.precipitation_mode == PrecipitationMode::Hourly {
        triggers.push(HOURLY_PRECIPITATION);
    }
    triggers
}

/// Forward every notification of `engine` to the entity publisher worker
pub fn subscribe_zone_updates(
    engine: &WaterBalanceEngine,
    sensors: &[IrrigationSensor],
    sender: ZoneUpdateSender,
) -> ListenerHandle {
    let zone = engine.name().to_string();
    let sensors = sensors.to_vec();

    engine.add_listener(move |snapshot| {
        let update = ZoneUpdate {
            zone: zone.clone(),
            states: sensors
                .iter()
                .filter_map(|sensor| sensor.state(snapshot))
                .collect(),
            restore: capture_zone(&sensors, snapshot),
        };
        if let Err(e) = sender.send(update) {
            debug!("[ZONES] {}: update not delivered: {}", zone, e);
        }
    })
}

/// Startup system that creates one ECS entity per configured zone.
///
/// A zone whose configuration is rejected is skipped with an error; the
/// remaining zones still start.
pub fn spawn_zones(
    mut commands: Commands,
    zones: Res<IrrigationZones>,
    persistence: Option<Res<StatePersistenceResource>>,
    publisher: Option<Res<EntityPublisherResource>>,
    update_sender: Res<ZoneUpdateSender>,
) {
    info!("💧 Setting up {} irrigation zone(s)...", zones.0.len());

    for config in &zones.0 {
        let triggers = zone_triggers(config);
        let mut engine = match WaterBalanceEngine::new(config.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                error!("❌ Zone '{}' not created: {}", config.name, e);
                continue;
            }
        };

        let sensors = zone_sensors(engine.name());

        if let Some(persistence) = &persistence {
            match persistence.0.load(engine.name()) {
                Ok(state) if !state.is_empty() => {
                    restore_zone(&sensors, &mut engine, &state);
                    info!(
                        "📂 Zone '{}' restored: bucket {:.2} mm, run time {:.0} s",
                        engine.name(),
                        engine.bucket(),
                        engine.run_time()
                    );
                }
                Ok(_) => debug!("No saved state for zone '{}'", engine.name()),
                Err(e) => warn!(
                    "⚠️ Failed to load state for zone '{}', starting fresh: {}",
                    engine.name(),
                    e
                ),
            }
        }

        let mut subscriptions = Vec::new();
        if publisher.is_some() || persistence.is_some() {
            subscriptions.push(subscribe_zone_updates(
                &engine,
                &sensors,
                update_sender.clone(),
            ));
        }

        // Publish the restored state right away
        engine.notify_listeners();

        info!(
            "✅ Zone '{}' ready with {} entities",
            engine.name(),
            sensors.len()
        );
        commands.spawn((
            ZoneEngine(engine),
            ZoneTriggers(ZoneSchedule::new(triggers)),
            ZoneEntities {
                sensors,
                subscriptions,
            },
        ));
    }
}

/// System that routes sensor events to every zone mapping the entity.
///
/// Zones without listeners are not subscribed to the sensor bus, so their
/// events are dropped.
pub fn ingest_sensor_events(
    mut channel: ResMut<SensorEventChannel>,
    mut zones: Query<&mut ZoneEngine>,
) {
    while let Ok(event) = channel.receiver.try_recv() {
        for mut zone in &mut zones {
            let engine = &mut zone.0;
            let Some(sensor_channel) = engine.config().sensors.channel_of(&event.entity_id) else {
                continue;
            };
            if engine.listener_count() == 0 {
                trace!(
                    "[ZONES] {}: not listening, dropping {} event",
                    engine.name(),
                    event.entity_id
                );
                continue;
            }
            engine.handle_reading(&event.reading_for(sensor_channel));
        }
    }
}

fn apply_action(engine: &mut WaterBalanceEngine, action: EntityAction, day_of_year: u32) {
    match action {
        EntityAction::Reset => engine.reset(),
        EntityAction::ForceUpdate => {
            engine.force_daily_update(day_of_year);
        }
    }
}

fn run_on_zone(
    zones: &mut Query<(Entity, &mut ZoneEngine, &mut ZoneEntities)>,
    zone: &str,
    action: EntityAction,
    day_of_year: u32,
) {
    match zones
        .iter_mut()
        .find(|(_, engine, _)| engine.0.name() == zone)
    {
        Some((_, mut engine, _)) => apply_action(&mut engine.0, action, day_of_year),
        None => warn!("⚠️ Unknown irrigation zone: {}", zone),
    }
}

/// System that executes operator commands
pub fn process_zone_commands(
    mut commands: Commands,
    mut channel: ResMut<ZoneCommandChannel>,
    mut zones: Query<(Entity, &mut ZoneEngine, &mut ZoneEntities)>,
    clock: Res<IrrigationClock>,
    timezone: Res<TimezoneConfig>,
) {
    while let Ok(command) = channel.receiver.try_recv() {
        let day_of_year = current_day_of_year(clock.now(), timezone.tz);

        match command {
            ZoneCommand::Service { entity_id, action } => {
                let target = zones.iter_mut().find_map(|(_, engine, entities)| {
                    let supported = entities.owns(&entity_id)?.supports(action);
                    Some((engine, supported))
                });
                match target {
                    Some((mut engine, true)) => apply_action(&mut engine.0, action, day_of_year),
                    Some((_, false)) => warn!(
                        "⚠️ {} does not support {}",
                        entity_id,
                        action.service_name()
                    ),
                    None => warn!("⚠️ Unknown irrigation entity: {}", entity_id),
                }
            }
            ZoneCommand::Reset { zone } => {
                run_on_zone(&mut zones, &zone, EntityAction::Reset, day_of_year);
            }
            ZoneCommand::ForceDailyUpdate { zone } => {
                run_on_zone(&mut zones, &zone, EntityAction::ForceUpdate, day_of_year);
            }
            ZoneCommand::Remove { zone } => {
                let Some((entity, _, mut entities)) = zones
                    .iter_mut()
                    .find(|(_, engine, _)| engine.0.name() == zone)
                else {
                    warn!("⚠️ Unknown irrigation zone: {}", zone);
                    continue;
                };
                let detached = entities.detach();
                commands.entity(entity).despawn();
                info!(
                    "🗑️ Zone '{}' removed ({} subscription(s) dropped)",
                    zone, detached
                );
            }
        }
    }
}

/// System that arms a zone's triggers once it has a listener and drops
/// them when the last listener leaves
pub fn sync_zone_triggers(
    mut zones: Query<(&ZoneEngine, &mut ZoneTriggers)>,
    clock: Res<IrrigationClock>,
    timezone: Res<TimezoneConfig>,
) {
    for (engine, mut triggers) in &mut zones {
        let listening = engine.0.listener_count() > 0;

        if listening && !triggers.0.is_armed() {
            triggers.0.arm(clock.now(), timezone.tz);
            info!(
                "⏰ Zone '{}' triggers armed, next rollover at {}",
                engine.0.name(),
                triggers
                    .0
                    .next_fire(TriggerKind::DailyRollover)
                    .map(|at| at.with_timezone(&timezone.tz).to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        } else if !listening && triggers.0.is_armed() {
            triggers.0.disarm();
            info!("⏰ Zone '{}' triggers disarmed", engine.0.name());
        }
    }
}

/// System that fires due time-of-day triggers in chronological order
pub fn run_zone_triggers(
    mut zones: Query<(&mut ZoneEngine, &mut ZoneTriggers)>,
    clock: Res<IrrigationClock>,
    timezone: Res<TimezoneConfig>,
) {
    let now = clock.now();

    for (mut engine, mut triggers) in &mut zones {
        let mut due = triggers.0.take_due(now, timezone.tz);
        due.sort_by_key(|(_, fired_at)| *fired_at);

        for (kind, fired_at) in due {
            match kind {
                TriggerKind::DailyRollover => {
                    engine
                        .0
                        .update_daily(closing_day_of_year(fired_at, timezone.tz));
                }
                TriggerKind::HourlyPrecipitation => {
                    engine.0.accumulate_hourly();
                }
                TriggerKind::EntityRefresh => engine.0.notify_listeners(),
            }
        }
    }
}
