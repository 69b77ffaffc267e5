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

//! Conversion of Home Assistant units of measurement to canonical engine units.

use crate::errors::{IrrigationError, IrrigationResult};
use crate::readings::SensorChannel;

/// Convert `value` reported in `unit` to the canonical unit of `channel`.
///
/// A missing or empty unit is taken to already be canonical.
pub fn normalize(channel: SensorChannel, value: f64, unit: Option<&str>) -> IrrigationResult<f64> {
    let unit = unit.map(str::trim).unwrap_or_default();
    if unit.is_empty() || unit == channel.canonical_unit() {
        return Ok(value);
    }

    let converted = match channel {
        SensorChannel::Temperature => match unit {
            "C" | "℃" => Some(value),
            "°F" | "F" | "℉" => Some((value - 32.0) * 5.0 / 9.0),
            "K" => Some(value - 273.15),
            _ => None,
        },
        SensorChannel::Humidity => None,
        SensorChannel::Pressure => match unit {
            "mbar" => Some(value),
            "Pa" => Some(value / 100.0),
            "kPa" => Some(value * 10.0),
            "bar" => Some(value * 1000.0),
            "cbar" => Some(value * 100.0),
            "mmHg" => Some(value * 1.333_223_874),
            "inHg" => Some(value * 33.863_886_67),
            "psi" => Some(value * 68.947_572_93),
            _ => None,
        },
        SensorChannel::WindSpeed => match unit {
            "km/h" => Some(value / 3.6),
            "mph" => Some(value * 0.44704),
            "kn" => Some(value * 0.514_444_444),
            "ft/s" => Some(value * 0.3048),
            "mm/s" => Some(value / 1000.0),
            _ => None,
        },
        SensorChannel::SolarRadiation => match unit {
            "W/m2" | "W m-2" => Some(value),
            "kW/m²" | "kW/m2" => Some(value * 1000.0),
            _ => None,
        },
        SensorChannel::Precipitation => match unit {
            "cm" => Some(value * 10.0),
            "m" => Some(value * 1000.0),
            "in" => Some(value * 25.4),
            _ => None,
        },
    };

    converted.ok_or_else(|| IrrigationError::UnsupportedUnit {
        channel,
        unit: unit.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_canonical_and_missing_units_pass_through() {
        assert_eq!(normalize(SensorChannel::Temperature, 21.0, Some("°C")).unwrap(), 21.0);
        assert_eq!(normalize(SensorChannel::Humidity, 55.0, None).unwrap(), 55.0);
        assert_eq!(normalize(SensorChannel::Pressure, 1013.0, Some("")).unwrap(), 1013.0);
    }

    #[test]
    fn test_temperature_conversions() {
        assert!(close(normalize(SensorChannel::Temperature, 68.0, Some("°F")).unwrap(), 20.0));
        assert!(close(normalize(SensorChannel::Temperature, 293.15, Some("K")).unwrap(), 20.0));
    }

    #[test]
    fn test_pressure_conversions() {
        assert!(close(normalize(SensorChannel::Pressure, 101.3, Some("kPa")).unwrap(), 1013.0));
        assert!(close(normalize(SensorChannel::Pressure, 101_300.0, Some("Pa")).unwrap(), 1013.0));
        assert!(close(normalize(SensorChannel::Pressure, 29.92, Some("inHg")).unwrap(), 1013.2076));
    }

    #[test]
    fn test_wind_and_precipitation_conversions() {
        assert!(close(normalize(SensorChannel::WindSpeed, 18.0, Some("km/h")).unwrap(), 5.0));
        assert!(close(normalize(SensorChannel::WindSpeed, 10.0, Some("mph")).unwrap(), 4.4704));
        assert!(close(normalize(SensorChannel::Precipitation, 0.5, Some("in")).unwrap(), 12.7));
        assert!(close(normalize(SensorChannel::Precipitation, 1.2, Some("cm")).unwrap(), 12.0));
    }

    #[test]
    fn test_unsupported_unit_is_rejected() {
        let err = normalize(SensorChannel::SolarRadiation, 40_000.0, Some("lx")).unwrap_err();
        assert!(matches!(err, IrrigationError::UnsupportedUnit { channel: SensorChannel::SolarRadiation, .. }));

        assert!(normalize(SensorChannel::Humidity, 0.5, Some("ratio")).is_err());
    }
}
