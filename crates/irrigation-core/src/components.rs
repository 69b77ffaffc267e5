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

use crate::engine::WaterBalanceEngine;
use crate::entities::IrrigationSensor;
use crate::listeners::ListenerHandle;
use crate::readings::{SensorChannel, SensorReading};
use crate::scheduling::ZoneSchedule;
use bevy_ecs::prelude::*;

/// Water-balance state of one irrigation zone
#[derive(Component, Debug)]
pub struct ZoneEngine(pub WaterBalanceEngine);

/// Time-of-day triggers of a zone; armed only while the zone has listeners
#[derive(Component, Debug, Default)]
pub struct ZoneTriggers(pub ZoneSchedule);

/// Entity adapters of a zone and their listener subscriptions
#[derive(Component, Debug, Default)]
pub struct ZoneEntities {
    pub sensors: Vec<IrrigationSensor>,
    pub subscriptions: Vec<ListenerHandle>,
}

impl ZoneEntities {
    pub fn owns(&self, entity_id: &str) -> Option<&IrrigationSensor> {
        self.sensors
            .iter()
            .find(|sensor| sensor.entity_id() == entity_id)
    }

    /// Drop every listener subscription held for this zone
    pub fn detach(&mut self) -> usize {
        self.subscriptions
            .drain(..)
            .map(ListenerHandle::unsubscribe)
            .filter(|removed| *removed)
            .count()
    }
}

/// One channel's worth of same-day history fetched at startup
#[derive(Debug, Clone)]
pub struct HistoryBackfill {
    pub channel: SensorChannel,
    pub readings: Vec<SensorReading>,
}

/// Receiving end of a zone's history backfill worker
#[derive(Component)]
pub struct HistoryBackfillChannel {
    pub receiver: crossbeam_channel::Receiver<HistoryBackfill>,
}

/// Marker for the sensor poller worker entity
#[derive(Component, Debug, Clone)]
pub struct SensorPoller {
    pub source_name: String,
    pub entity_count: usize,
}

/// Marker for the entity publisher worker entity
#[derive(Component, Debug, Clone)]
pub struct EntityPublisher {
    pub target_name: Option<String>,
    pub persists_state: bool,
}
