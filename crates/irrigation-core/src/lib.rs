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

//! Daily FAO-56 reference evapotranspiration and water-balance engine for
//! irrigation zones, wired into a Bevy ECS app.

pub mod async_systems;
pub mod channels;
pub mod components;
pub mod config;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod evapotranspiration;
pub mod listeners;
pub mod persistence;
pub mod readings;
pub mod resources;
pub mod scheduling;
pub mod stats;
pub mod sunshine;
pub mod systems;
pub mod traits;
pub mod units;

use bevy_app::prelude::*;
pub use channels::*;
pub use components::*;
pub use config::{PrecipitationMode, SolarRadiationMode, ZoneConfig, ZoneSensors};
pub use engine::{RolloverOutcome, TrackerSummary, WaterBalanceEngine, ZoneSnapshot};
pub use entities::{
    EntityAction, IrrigationSensor, PublishedState, RestoredEntity, ZoneRestoreState,
};
pub use errors::{ConfigError, IrrigationError, IrrigationResult};
pub use evapotranspiration::{DailyWeather, SiteParameters, SolarInput, estimate_daily};
pub use listeners::ListenerHandle;
pub use persistence::ZoneStatePersistence;
pub use readings::{HistorySample, SensorChannel, SensorReading, SensorValue};
pub use resources::*;
pub use stats::StatTracker;
pub use sunshine::SunlightAccumulator;
pub use systems::ZoneSystemsPlugin;
pub use traits::{EntityStatePublisher, HistoryDataSource, SensorEvent, SensorStateSource};

/// Core plugin that registers irrigation resources, channels and systems.
///
/// Collaborators (sensor source, history source, entity publisher, state
/// persistence) are optional resources inserted by the host before startup.
pub struct IrrigationCorePlugin;

impl Plugin for IrrigationCorePlugin {
    fn build(&self, app: &mut App) {
        let (event_sender, event_channel) = SensorEventSender::new();
        let (command_sender, command_channel) = ZoneCommandSender::new();
        let (update_sender, update_channel) = ZoneUpdateSender::new();

        app.init_resource::<IrrigationZones>()
            .init_resource::<TimezoneConfig>()
            .init_resource::<IrrigationClock>()
            .init_resource::<SensorPollConfig>()
            .insert_resource(event_sender)
            .insert_resource(event_channel)
            .insert_resource(command_sender)
            .insert_resource(command_channel)
            .insert_resource(update_sender)
            .insert_resource(update_channel)
            .add_plugins(ZoneSystemsPlugin);

        if !app.world().contains_resource::<AsyncRuntime>()
            && let Some(runtime) = AsyncRuntime::current()
        {
            app.insert_resource(runtime);
        }
    }
}
