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

//! Background workers bridging the host platform and the ECS world.
//!
//! Each worker runs as a tokio task; results come back through channels that
//! ECS systems drain without blocking.

use bevy_ecs::prelude::*;
use chrono::{DateTime, Utc};
use crossbeam_channel::TryRecvError;
use futures_timer::Delay;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

use crate::{
    channels::{SensorEventSender, ZoneUpdateChannel},
    components::{
        EntityPublisher, HistoryBackfill, HistoryBackfillChannel, SensorPoller, ZoneEngine,
    },
    readings::SensorChannel,
    resources::{
        AsyncRuntime, EntityPublisherResource, HistoryDataSourceResource, IrrigationClock, IrrigationZones,
        SensorPollConfig, SensorStateSourceResource, StatePersistenceResource, TimezoneConfig,
    },
    scheduling::start_of_local_day,
};

/// Startup system that fetches today's history for every zone's backfill
/// channels
pub fn spawn_history_backfill(
    mut commands: Commands,
    source: Option<Res<HistoryDataSourceResource>>,
    runtime: Option<Res<AsyncRuntime>>,
    zones: Query<(Entity, &ZoneEngine)>,
    clock: Res<IrrigationClock>,
    timezone: Res<TimezoneConfig>,
) {
    let Some(source) = source else {
        info!("📊 No history source configured, skipping same-day backfill");
        return;
    };
    let Some(runtime) = runtime else {
        warn!("⚠️ No async runtime available, history backfill not started");
        return;
    };

    let since = start_of_local_day(clock.now(), timezone.tz);

    for (entity, zone) in &zones {
        let engine = &zone.0;
        let requests: Vec<(SensorChannel, String)> = engine
            .backfill_channels()
            .into_iter()
            .map(|channel| (channel, engine.config().sensors.entity(channel).to_string()))
            .collect();

        info!(
            "📊 [BACKFILL] {}: fetching {} channel(s) since {}",
            engine.name(),
            requests.len(),
            since
        );

        let (backfill_tx, backfill_rx) = crossbeam_channel::bounded(requests.len().max(1));
        let source = source.0.clone();
        let zone_name = engine.name().to_string();

        runtime.spawn(async move {
            for (channel, entity_id) in requests {
                match source.history_since(&entity_id, since).await {
                    Ok(events) => {
                        let readings = events
                            .iter()
                            .map(|event| event.reading_for(channel))
                            .collect();
                        if backfill_tx
                            .send(HistoryBackfill { channel, readings })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => warn!(
                        "⚠️ [BACKFILL] {}: history of {} unavailable: {}",
                        zone_name, entity_id, e
                    ),
                }
            }
            debug!("[BACKFILL] {}: worker finished", zone_name);
        });

        commands
            .entity(entity)
            .insert(HistoryBackfillChannel {
                receiver: backfill_rx,
            });
    }
}

/// System that merges fetched history into zone trackers and drops the
/// channel once its worker is done
pub fn poll_history_backfill(
    mut commands: Commands,
    mut zones: Query<(Entity, &mut ZoneEngine, &HistoryBackfillChannel)>,
) {
    for (entity, mut zone, channel) in &mut zones {
        loop {
            match channel.receiver.try_recv() {
                Ok(backfill) => {
                    zone.0.apply_history(backfill.channel, &backfill.readings);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("✅ [BACKFILL] {}: complete", zone.0.name());
                    commands.entity(entity).remove::<HistoryBackfillChannel>();
                    break;
                }
            }
        }
    }
}

/// Startup system that polls the current state of every mapped sensor and
/// forwards changes to the sensor bus
pub fn spawn_sensor_poller(
    mut commands: Commands,
    source: Option<Res<SensorStateSourceResource>>,
    runtime: Option<Res<AsyncRuntime>>,
    poll_config: Res<SensorPollConfig>,
    zones: Res<IrrigationZones>,
    sender: Res<SensorEventSender>,
) {
    let Some(source) = source else {
        info!("📡 No sensor source configured, waiting for pushed events only");
        return;
    };
    let Some(runtime) = runtime else {
        warn!("⚠️ No async runtime available, sensor poller not started");
        return;
    };

    let entity_ids: BTreeSet<String> = zones
        .0
        .iter()
        .flat_map(|zone| zone.sensors.iter().map(|(_, entity_id)| entity_id.to_string()))
        .collect();
    let interval = poll_config.interval;
    let source = source.0.clone();
    let sender = sender.clone();

    commands.spawn(SensorPoller {
        source_name: source.name().to_string(),
        entity_count: entity_ids.len(),
    });

    runtime.spawn(async move {
        info!(
            "📡 Sensor poller started: {} entities every {}s via {}",
            entity_ids.len(),
            interval.as_secs(),
            source.name()
        );
        let mut last_seen: HashMap<String, DateTime<Utc>> = HashMap::new();

        loop {
            for entity_id in &entity_ids {
                match source.current_state(entity_id).await {
                    Ok(event) => {
                        if last_seen.get(entity_id) == Some(&event.timestamp) {
                            continue;
                        }
                        last_seen.insert(entity_id.clone(), event.timestamp);
                        if sender.send(event).is_err() {
                            info!("📡 Sensor bus closed, poller stopping");
                            return;
                        }
                    }
                    Err(e) => warn!("⚠️ Failed to read {}: {}", entity_id, e),
                }
            }
            Delay::new(interval).await;
        }
    });
}

/// Startup system that publishes zone updates and saves zone state
pub fn spawn_entity_publisher(
    mut commands: Commands,
    publisher: Option<Res<EntityPublisherResource>>,
    persistence: Option<Res<StatePersistenceResource>>,
    runtime: Option<Res<AsyncRuntime>>,
    mut channel: ResMut<ZoneUpdateChannel>,
) {
    if publisher.is_none() && persistence.is_none() {
        info!("📤 No entity publisher or state persistence configured");
        return;
    }
    let Some(runtime) = runtime else {
        warn!("⚠️ No async runtime available, entity publisher not started");
        return;
    };
    let Some(mut receiver) = channel.receiver.take() else {
        warn!("⚠️ Zone update receiver already taken");
        return;
    };

    let publisher = publisher.map(|publisher| publisher.0.clone());
    let persistence = persistence.map(|persistence| persistence.0.clone());

    commands.spawn(EntityPublisher {
        target_name: publisher.as_ref().map(|publisher| publisher.name().to_string()),
        persists_state: persistence.is_some(),
    });

    runtime.spawn(async move {
        info!("📤 Entity publisher started");

        while let Some(update) = receiver.recv().await {
            if let Some(publisher) = &publisher {
                for state in &update.states {
                    if let Err(e) = publisher.publish(state).await {
                        warn!("⚠️ Failed to publish {}: {}", state.entity_id, e);
                    }
                }
            }

            if let Some(persistence) = &persistence
                && let Err(e) = persistence.save(&update.zone, &update.restore)
            {
                error!("❌ Failed to save state of zone '{}': {}", update.zone, e);
            }
        }

        info!("📤 Entity publisher stopped");
    });
}
