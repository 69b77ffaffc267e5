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

//! Channels between async adapters and the ECS world
//!
//! Sensor events and operator commands flow into the world; zone updates
//! flow out of the engine listeners towards the entity publisher.

use crate::entities::{EntityAction, PublishedState, ZoneRestoreState};
use crate::traits::SensorEvent;
use bevy_ecs::prelude::*;
use tokio::sync::mpsc;

/// Operator commands addressed to a zone or to one of its entities
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneCommand {
    /// Service invoked on a published entity, validated against the entity's actions
    Service {
        entity_id: String,
        action: EntityAction,
    },
    Reset { zone: String },
    ForceDailyUpdate { zone: String },
    /// Tear down a zone: unsubscribe its entities and despawn it
    Remove { zone: String },
}

/// Everything an entity adapter needs after the engine notified its listeners
#[derive(Debug, Clone)]
pub struct ZoneUpdate {
    pub zone: String,
    pub states: Vec<PublishedState>,
    pub restore: ZoneRestoreState,
}

#[derive(Resource)]
pub struct SensorEventChannel {
    pub receiver: mpsc::UnboundedReceiver<SensorEvent>,
}

#[derive(Resource)]
pub struct ZoneCommandChannel {
    pub receiver: mpsc::UnboundedReceiver<ZoneCommand>,
}

/// Receiving end of zone updates, taken by the publisher worker at startup
#[derive(Resource, Default)]
pub struct ZoneUpdateChannel {
    pub receiver: Option<mpsc::UnboundedReceiver<ZoneUpdate>>,
}

/// Clonable sender for sensor state changes
#[derive(Resource, Clone)]
pub struct SensorEventSender {
    sender: mpsc::UnboundedSender<SensorEvent>,
}

/// Clonable sender for operator commands
#[derive(Resource, Clone)]
pub struct ZoneCommandSender {
    sender: mpsc::UnboundedSender<ZoneCommand>,
}

/// Clonable sender used by zone listeners
#[derive(Resource, Clone)]
pub struct ZoneUpdateSender {
    sender: mpsc::UnboundedSender<ZoneUpdate>,
}

impl std::fmt::Debug for SensorEventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorEventSender").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ZoneCommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneCommandSender").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ZoneUpdateSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneUpdateSender").finish_non_exhaustive()
    }
}

/// Error when the receiving side of a channel is gone
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} channel closed")]
pub struct ChannelClosed(pub &'static str);

impl SensorEventSender {
    /// Create a new sender/receiver pair
    pub fn new() -> (Self, SensorEventChannel) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, SensorEventChannel { receiver })
    }

    pub fn send(&self, event: SensorEvent) -> Result<(), ChannelClosed> {
        self.sender
            .send(event)
            .map_err(|_| ChannelClosed("sensor event"))
    }
}

impl ZoneCommandSender {
    /// Create a new sender/receiver pair
    pub fn new() -> (Self, ZoneCommandChannel) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, ZoneCommandChannel { receiver })
    }

    pub fn send(&self, command: ZoneCommand) -> Result<(), ChannelClosed> {
        self.sender
            .send(command)
            .map_err(|_| ChannelClosed("zone command"))
    }

    /// Invoke an entity service by its registered name
    pub fn call_service(&self, entity_id: &str, service: &str) -> Result<(), ChannelClosed> {
        match EntityAction::from_service_name(service) {
            Some(action) => self.send(ZoneCommand::Service {
                entity_id: entity_id.to_string(),
                action,
            }),
            None => {
                tracing::warn!("Unknown irrigation service '{}' for {}", service, entity_id);
                Ok(())
            }
        }
    }
}

impl ZoneUpdateSender {
    /// Create a new sender/receiver pair
    pub fn new() -> (Self, ZoneUpdateChannel) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self { sender },
            ZoneUpdateChannel {
                receiver: Some(receiver),
            },
        )
    }

    pub fn send(&self, update: ZoneUpdate) -> Result<(), ChannelClosed> {
        self.sender
            .send(update)
            .map_err(|_| ChannelClosed("zone update"))
    }
}
