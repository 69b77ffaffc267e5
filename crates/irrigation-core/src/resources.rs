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

use crate::config::ZoneConfig;
use crate::persistence::ZoneStatePersistence;
use crate::traits::{EntityStatePublisher, HistoryDataSource, SensorStateSource};
use bevy_ecs::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Zones to set up at startup
#[derive(Resource, Debug, Clone, Default)]
pub struct IrrigationZones(pub Vec<ZoneConfig>);

/// Local timezone used for every time-of-day trigger
#[derive(Resource, Debug, Clone, Copy)]
pub struct TimezoneConfig {
    pub tz: Tz,
}

impl TimezoneConfig {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA timezone name, falling back to UTC
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::parse::<Tz>) {
            Some(Ok(tz)) => {
                info!("🌍 Using timezone: {}", tz);
                Self { tz }
            }
            Some(Err(e)) => {
                warn!("⚠️ Invalid timezone ({}), falling back to UTC", e);
                Self::default()
            }
            None => Self::default(),
        }
    }
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

/// Wall clock read by the scheduling systems
#[derive(Resource, Debug, Clone, Default)]
pub enum IrrigationClock {
    #[default]
    System,
    /// Externally driven time, shared between clones
    Manual(Arc<RwLock<DateTime<Utc>>>),
}

impl IrrigationClock {
    pub fn manual(start: DateTime<Utc>) -> Self {
        IrrigationClock::Manual(Arc::new(RwLock::new(start)))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            IrrigationClock::System => Utc::now(),
            IrrigationClock::Manual(now) => *now.read(),
        }
    }

    /// Move a manual clock; no effect on the system clock
    pub fn set(&self, time: DateTime<Utc>) {
        if let IrrigationClock::Manual(now) = self {
            *now.write() = time;
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        if let IrrigationClock::Manual(now) = self {
            let mut now = now.write();
            *now += by;
        }
    }
}

/// Handle of the tokio runtime the background workers are spawned on.
///
/// Captured when the plugin is built, so systems running on ECS worker
/// threads can still reach the runtime.
#[derive(Resource, Clone, Debug)]
pub struct AsyncRuntime {
    handle: tokio::runtime::Handle,
}

impl AsyncRuntime {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Runtime of the calling thread, if any
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }

    /// Spawn an async task; the returned handle can be detached
    pub fn spawn<T>(&self, future: impl Future<Output = T> + Send + 'static) -> tokio::task::JoinHandle<T>
    where
        T: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

/// How often the sensor poller reads entity states
#[derive(Resource, Debug, Clone)]
pub struct SensorPollConfig {
    pub interval: Duration,
}

impl Default for SensorPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct StatePersistenceResource(pub ZoneStatePersistence);

#[derive(Resource, Clone)]
pub struct SensorStateSourceResource(pub Arc<dyn SensorStateSource>);

#[derive(Resource, Clone)]
pub struct HistoryDataSourceResource(pub Arc<dyn HistoryDataSource>);

#[derive(Resource, Clone)]
pub struct EntityPublisherResource(pub Arc<dyn EntityStatePublisher>);

impl std::fmt::Debug for SensorStateSourceResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SensorStateSourceResource")
            .field(&self.0.name())
            .finish()
    }
}

impl std::fmt::Debug for HistoryDataSourceResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HistoryDataSourceResource")
            .field(&self.0.name())
            .finish()
    }
}

impl std::fmt::Debug for EntityPublisherResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntityPublisherResource")
            .field(&self.0.name())
            .finish()
    }
}
