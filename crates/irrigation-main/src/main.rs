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

mod config;

use anyhow::{Context, Result};
use bevy_app::{ScheduleRunnerPlugin, TaskPoolPlugin, prelude::*};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use irrigation_core::{
    AsyncRuntime, EntityPublisherResource, EntityStatePublisher, HistoryDataSource,
    HistoryDataSourceResource, IrrigationCorePlugin, IrrigationZones, SensorPollConfig,
    SensorStateSource, SensorStateSourceResource, StatePersistenceResource, TimezoneConfig,
    ZoneStatePersistence,
};
use irrigation_ha::{HaEntityPublisher, HaHistoryAdapter, HaSensorStateAdapter, HomeAssistantClient};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("FluxION Irrigation - ET₀ water balance for Home Assistant");
                println!("Version: {}", VERSION);
                println!();
                println!("Usage: fluxion-irrigation [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{}", VERSION);
                return Ok(());
            }
            _ => {}
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    // Run Bevy app in a blocking task so tokio can keep running async tasks
    runtime.block_on(async {
        tokio::task::spawn_blocking(initialize_and_run)
            .await
            .context("Irrigation task panicked")?
    })
}

fn initialize_and_run() -> Result<()> {
    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")?;

    let config = AppConfig::load()?;

    info!("🚀 Starting FluxION Irrigation v{}", VERSION);
    info!("📋 Configuration Summary:");
    info!("   Zones: {}", config.zones.len());
    for zone in &config.zones {
        info!(
            "     - {}: {} × {} L/min over {} m², cap {} s",
            zone.name, zone.number_of_sprinklers, zone.flow, zone.area, zone.maximum_duration
        );
    }
    info!("   Poll interval: {}s", config.system.poll_interval_secs);
    info!("   State directory: {}", config.system.state_dir);

    let ha_client = if std::env::var("SUPERVISOR_TOKEN").is_ok() {
        info!("🏠 Initializing HA client using Supervisor API...");
        Arc::new(HomeAssistantClient::from_supervisor()?)
    } else {
        info!("🏠 Initializing HA client from configuration...");
        Arc::new(HomeAssistantClient::from_config(
            config.system.ha_base_url.clone(),
            config.system.ha_token.clone(),
        )?)
    };

    let runtime_handle = tokio::runtime::Handle::current();

    if !runtime_handle.block_on(ha_client.ping()).unwrap_or(false) {
        warn!("⚠️ Home Assistant is not reachable yet, continuing anyway");
    }

    let timezone_config = match &config.system.timezone {
        Some(timezone) => TimezoneConfig::from_name(Some(timezone.as_str())),
        None => match runtime_handle.block_on(ha_client.get_timezone()) {
            Ok(timezone) => TimezoneConfig::from_name(Some(timezone.as_str())),
            Err(e) => {
                warn!("⚠️ Failed to fetch timezone from HA, scheduling in UTC: {}", e);
                TimezoneConfig::default()
            }
        },
    };

    let location = if config.has_site() {
        None
    } else {
        match runtime_handle.block_on(ha_client.get_location()) {
            Ok(location) => Some((location.latitude, location.elevation)),
            Err(e) => {
                warn!("⚠️ Failed to fetch location from HA: {}", e);
                None
            }
        }
    };
    let zones = config.zone_configs(location)?;

    let sensor_source: Arc<dyn SensorStateSource> =
        Arc::new(HaSensorStateAdapter::new(ha_client.clone()));
    let history_source: Arc<dyn HistoryDataSource> =
        Arc::new(HaHistoryAdapter::new(ha_client.clone()));
    let publisher: Arc<dyn EntityStatePublisher> =
        Arc::new(HaEntityPublisher::new(ha_client));
    info!("📡 Sensor source: {}", sensor_source.name());
    info!("📊 History source: {}", history_source.name());
    info!("📤 Entity publisher: {}", publisher.name());

    let persistence = ZoneStatePersistence::new(&config.system.state_dir);

    info!("🎮 Starting ECS application...");

    let mut app = App::new();
    app.add_plugins(TaskPoolPlugin::default())
        .add_plugins(ScheduleRunnerPlugin::run_loop(Duration::from_millis(100)))
        .add_plugins(IrrigationCorePlugin)
        .insert_resource(AsyncRuntime::new(runtime_handle))
        .insert_resource(IrrigationZones(zones))
        .insert_resource(timezone_config)
        .insert_resource(SensorPollConfig {
            interval: config.poll_interval(),
        })
        .insert_resource(StatePersistenceResource(persistence))
        .insert_resource(SensorStateSourceResource(sensor_source))
        .insert_resource(HistoryDataSourceResource(history_source))
        .insert_resource(EntityPublisherResource(publisher));

    info!("✅ Starting main loop...");
    app.run();

    Ok(())
}
