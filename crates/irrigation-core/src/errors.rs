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

use crate::readings::SensorChannel;
use thiserror::Error;

/// Irrigation engine error types
#[derive(Error, Debug)]
pub enum IrrigationError {
    #[error("Invalid zone configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported unit '{unit}' for {channel} sensor")]
    UnsupportedUnit { channel: SensorChannel, unit: String },
}

/// Faults detected while validating a zone before its engine is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("zone name cannot be empty")]
    EmptyName,

    #[error("{field} must be greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} cannot be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("latitude {0} is outside -90..=90 degrees")]
    LatitudeOutOfRange(f64),

    #[error("missing sensor entity for {0}")]
    MissingSensor(SensorChannel),
}

pub type IrrigationResult<T> = Result<T, IrrigationError>;
