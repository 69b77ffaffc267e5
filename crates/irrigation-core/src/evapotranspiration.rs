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

//! FAO-56 Penman-Monteith daily reference evapotranspiration.
//!
//! Every function here is pure. Units follow FAO Irrigation and Drainage
//! Paper 56: temperatures in °C, pressures in kPa, radiation in
//! MJ m⁻² day⁻¹, angles in radians.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Solar constant [MJ m⁻² min⁻¹]
const SOLAR_CONSTANT: f64 = 0.0820;
/// Stefan-Boltzmann constant [MJ K⁻⁴ m⁻² day⁻¹]
const STEFAN_BOLTZMANN: f64 = 4.903e-9;
/// Albedo of the hypothetical grass reference crop
pub const REFERENCE_ALBEDO: f64 = 0.23;
/// W/m² averaged over a day to MJ m⁻² day⁻¹
const WATTS_TO_MJ_PER_DAY: f64 = 0.0864;

/// Static location of the weather station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteParameters {
    /// Degrees, north positive
    pub latitude: f64,
    /// Metres above sea level
    pub elevation: f64,
    /// Height of the anemometer above ground, metres
    pub wind_measurement_height: f64,
}

/// Radiation input for one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolarInput {
    /// Mean measured solar radiation, W/m²
    Radiation(f64),
    /// Bright sunshine duration, hours
    SunshineHours(f64),
}

/// Daily weather summary fed to [`estimate_daily`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyWeather {
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    /// Mean absolute pressure, hPa
    pub pressure: f64,
    /// Mean wind speed at measurement height, m/s
    pub wind_speed: f64,
    pub solar: SolarInput,
}

pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees * (PI / 180.0)
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + 273.15
}

/// Saturation vapour pressure at a temperature [kPa] (FAO-56 eq. 11).
pub fn saturation_vapour_pressure(temperature: f64) -> f64 {
    0.6108 * ((17.27 * temperature) / (temperature + 237.3)).exp()
}

/// Mean saturation vapour pressure from daily extremes [kPa] (eq. 12).
pub fn mean_saturation_vapour_pressure(temperature_min: f64, temperature_max: f64) -> f64 {
    (saturation_vapour_pressure(temperature_min) + saturation_vapour_pressure(temperature_max))
        / 2.0
}

/// Actual vapour pressure from min/max relative humidity [kPa] (eq. 17).
pub fn actual_vapour_pressure(
    svp_temperature_min: f64,
    svp_temperature_max: f64,
    humidity_min: f64,
    humidity_max: f64,
) -> f64 {
    let at_min = svp_temperature_min * (humidity_max / 100.0);
    let at_max = svp_temperature_max * (humidity_min / 100.0);
    (at_min + at_max) / 2.0
}

/// Slope of the saturation vapour pressure curve [kPa °C⁻¹] (eq. 13).
pub fn svp_slope(temperature: f64) -> f64 {
    4098.0 * saturation_vapour_pressure(temperature) / (temperature + 237.3).powi(2)
}

/// Psychrometric constant from atmospheric pressure in kPa (eq. 8).
pub fn psychrometric_constant(pressure_kpa: f64) -> f64 {
    0.000665 * pressure_kpa
}

/// Solar declination [rad] (eq. 24).
pub fn solar_declination(day_of_year: u32) -> f64 {
    0.409 * ((2.0 * PI / 365.0) * f64::from(day_of_year) - 1.39).sin()
}

/// Inverse relative Earth-Sun distance (eq. 23).
pub fn inverse_relative_distance(day_of_year: u32) -> f64 {
    1.0 + 0.033 * ((2.0 * PI / 365.0) * f64::from(day_of_year)).cos()
}

/// Sunset hour angle [rad] (eq. 25).
///
/// The acos argument is clamped so polar day and polar night stay defined.
pub fn sunset_hour_angle(latitude: f64, declination: f64) -> f64 {
    (-latitude.tan() * declination.tan()).clamp(-1.0, 1.0).acos()
}

/// Maximum possible daylight hours (eq. 34).
pub fn daylight_hours(sunset_hour_angle: f64) -> f64 {
    (24.0 / PI) * sunset_hour_angle
}

/// Extraterrestrial radiation [MJ m⁻² day⁻¹] (eq. 21).
pub fn extraterrestrial_radiation(
    latitude: f64,
    declination: f64,
    sunset_hour_angle: f64,
    inverse_distance: f64,
) -> f64 {
    let angles = sunset_hour_angle * latitude.sin() * declination.sin()
        + latitude.cos() * declination.cos() * sunset_hour_angle.sin();
    (24.0 * 60.0 / PI) * SOLAR_CONSTANT * inverse_distance * angles
}

/// Solar radiation from relative sunshine duration, Angström formula (eq. 35).
pub fn solar_radiation_from_sunshine(
    daylight_hours: f64,
    sunshine_hours: f64,
    extraterrestrial_radiation: f64,
) -> f64 {
    (0.5 * sunshine_hours / daylight_hours + 0.25) * extraterrestrial_radiation
}

/// Clear-sky radiation from station elevation (eq. 37).
pub fn clear_sky_radiation(elevation: f64, extraterrestrial_radiation: f64) -> f64 {
    (0.00002 * elevation + 0.75) * extraterrestrial_radiation
}

/// Net incoming shortwave radiation (eq. 38).
pub fn net_shortwave_radiation(solar_radiation: f64, albedo: f64) -> f64 {
    (1.0 - albedo) * solar_radiation
}

/// Net outgoing longwave radiation (eq. 39). Temperatures in Kelvin.
pub fn net_longwave_radiation(
    temperature_min_k: f64,
    temperature_max_k: f64,
    solar_radiation: f64,
    clear_sky_radiation: f64,
    actual_vapour_pressure: f64,
) -> f64 {
    let blackbody = STEFAN_BOLTZMANN * ((temperature_min_k.powi(4) + temperature_max_k.powi(4)) / 2.0);
    let humidity_correction = 0.34 - 0.14 * actual_vapour_pressure.sqrt();
    let cloudiness = 1.35 * (solar_radiation / clear_sky_radiation) - 0.35;
    blackbody * humidity_correction * cloudiness
}

/// Wind speed at 2 m from a measurement at `height` metres (eq. 47).
pub fn wind_speed_2m(wind_speed: f64, height: f64) -> f64 {
    wind_speed * (4.87 / (67.8 * height - 5.42).ln())
}

/// FAO-56 Penman-Monteith equation (eq. 6).
///
/// `temperature_k` is the mean daily air temperature at 2 m in Kelvin and
/// `soil_heat_flux` is zero for daily steps.
#[expect(clippy::too_many_arguments)]
pub fn penman_monteith(
    net_radiation: f64,
    temperature_k: f64,
    wind_speed_2m: f64,
    saturation_vapour_pressure: f64,
    actual_vapour_pressure: f64,
    svp_slope: f64,
    psychrometric_constant: f64,
    soil_heat_flux: f64,
) -> f64 {
    let radiation_term = 0.408 * (net_radiation - soil_heat_flux) * svp_slope;
    let aerodynamic_term = psychrometric_constant * (900.0 / temperature_k)
        * wind_speed_2m
        * (saturation_vapour_pressure - actual_vapour_pressure);
    (radiation_term + aerodynamic_term)
        / (svp_slope + psychrometric_constant * (1.0 + 0.34 * wind_speed_2m))
}

/// Daily ET₀ in mm for one site and one day of weather.
///
/// Non-physical input yields NaN or infinity rather than a panic.
pub fn estimate_daily(day_of_year: u32, site: &SiteParameters, weather: &DailyWeather) -> f64 {
    let temperature_mean = (weather.temperature_min + weather.temperature_max) / 2.0;

    let svp_min = saturation_vapour_pressure(weather.temperature_min);
    let svp_max = saturation_vapour_pressure(weather.temperature_max);
    let svp = (svp_min + svp_max) / 2.0;
    let avp = actual_vapour_pressure(svp_min, svp_max, weather.humidity_min, weather.humidity_max);

    let latitude = deg_to_rad(site.latitude);
    let declination = solar_declination(day_of_year);
    let sha = sunset_hour_angle(latitude, declination);
    let et_radiation = extraterrestrial_radiation(
        latitude,
        declination,
        sha,
        inverse_relative_distance(day_of_year),
    );

    let solar_radiation = match weather.solar {
        SolarInput::Radiation(watts) => watts * WATTS_TO_MJ_PER_DAY,
        SolarInput::SunshineHours(hours) => {
            solar_radiation_from_sunshine(daylight_hours(sha), hours, et_radiation)
        }
    };

    let shortwave = net_shortwave_radiation(solar_radiation, REFERENCE_ALBEDO);
    let longwave = net_longwave_radiation(
        celsius_to_kelvin(weather.temperature_min),
        celsius_to_kelvin(weather.temperature_max),
        solar_radiation,
        clear_sky_radiation(site.elevation, et_radiation),
        avp,
    );
    let net_radiation = shortwave - longwave;

    let wind_2m = wind_speed_2m(weather.wind_speed, site.wind_measurement_height);
    let psy = psychrometric_constant(weather.pressure / 10.0);

    penman_monteith(
        net_radiation,
        celsius_to_kelvin(temperature_mean),
        wind_2m,
        svp,
        avp,
        svp_slope(temperature_mean),
        psy,
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    fn spring_site() -> SiteParameters {
        SiteParameters {
            latitude: 45.0,
            elevation: 100.0,
            wind_measurement_height: 2.0,
        }
    }

    fn spring_weather(solar: SolarInput) -> DailyWeather {
        DailyWeather {
            temperature_min: 10.0,
            temperature_max: 20.0,
            humidity_min: 30.0,
            humidity_max: 70.0,
            pressure: 1013.0,
            wind_speed: 2.0,
            solar,
        }
    }

    #[test]
    fn test_vapour_pressure_chain() {
        assert_close(saturation_vapour_pressure(24.5), 3.0747, 1e-3);
        assert_close(svp_slope(24.5), 0.1838, 1e-3);
        assert_close(mean_saturation_vapour_pressure(10.0, 20.0), 1.7831, 1e-3);

        let avp = actual_vapour_pressure(
            saturation_vapour_pressure(10.0),
            saturation_vapour_pressure(20.0),
            30.0,
            70.0,
        );
        assert_close(avp, 0.7805, 1e-3);
    }

    #[test]
    fn test_psychrometric_constant_and_wind_height() {
        assert_close(psychrometric_constant(81.8), 0.0544, 1e-4);
        assert_close(wind_speed_2m(3.2, 10.0), 2.393, 1e-3);
        assert_close(wind_speed_2m(2.0, 2.0), 2.0004, 1e-3);
    }

    #[test]
    fn test_extraterrestrial_radiation_southern_hemisphere() {
        // 20°S on 3 September
        let latitude = deg_to_rad(-20.0);
        let declination = solar_declination(246);
        let sha = sunset_hour_angle(latitude, declination);

        assert_close(declination, 0.1197, 1e-3);
        assert_close(sha, 1.527, 1e-3);
        assert_close(inverse_relative_distance(246), 0.9848, 1e-3);
        assert_close(
            extraterrestrial_radiation(latitude, declination, sha, inverse_relative_distance(246)),
            32.2,
            0.05,
        );
        assert_close(daylight_hours(sha), 11.67, 0.01);
    }

    #[test]
    fn test_sunset_hour_angle_polar_extremes() {
        let declination = solar_declination(172);
        assert_close(sunset_hour_angle(deg_to_rad(80.0), declination), PI, 1e-9);
        assert_close(sunset_hour_angle(deg_to_rad(-80.0), declination), 0.0, 1e-9);
    }

    #[test]
    fn test_estimate_with_measured_radiation() {
        let et0 = estimate_daily(100, &spring_site(), &spring_weather(SolarInput::Radiation(500.0)));
        assert!(et0.is_finite());
        assert!(et0 > 0.0);
        assert_close(et0, 5.519, 0.01);
    }

    #[test]
    fn test_estimate_with_sunshine_hours() {
        let bright = estimate_daily(100, &spring_site(), &spring_weather(SolarInput::SunshineHours(8.0)));
        let overcast = estimate_daily(100, &spring_site(), &spring_weather(SolarInput::SunshineHours(0.0)));

        assert_close(bright, 3.690, 0.01);
        assert_close(overcast, 2.983, 0.01);
        assert!(bright > overcast);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let weather = spring_weather(SolarInput::Radiation(500.0));
        let first = estimate_daily(100, &spring_site(), &weather);
        let second = estimate_daily(100, &spring_site(), &weather);
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_brussels_july_reference_day() {
        // FAO-56 worked example: Uccle, 6 July, wind measured at 10 m
        let site = SiteParameters {
            latitude: 50.8,
            elevation: 100.0,
            wind_measurement_height: 10.0,
        };
        let weather = DailyWeather {
            temperature_min: 12.3,
            temperature_max: 21.5,
            humidity_min: 63.0,
            humidity_max: 84.0,
            pressure: 1001.0,
            wind_speed: 2.78,
            solar: SolarInput::SunshineHours(9.25),
        };

        assert_close(estimate_daily(187, &site, &weather), 3.9, 0.05);
    }

    #[test]
    fn test_invalid_input_does_not_panic() {
        let mut weather = spring_weather(SolarInput::Radiation(500.0));
        weather.humidity_min = f64::NAN;
        assert!(estimate_daily(100, &spring_site(), &weather).is_nan());

        let site = SiteParameters {
            wind_measurement_height: 0.0,
            ..spring_site()
        };
        let et0 = estimate_daily(100, &site, &spring_weather(SolarInput::Radiation(500.0)));
        assert!(et0.is_nan());
    }
}
