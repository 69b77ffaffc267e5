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

//! Bright-sunshine duration derived from a radiation intensity signal.

use chrono::{DateTime, TimeDelta, Utc};

/// Default radiation watermark separating "bright sunshine" from diffuse light.
pub const DEFAULT_SOLAR_RADIATION_THRESHOLD: f64 = 3500.0;

/// Integrates the time a radiation signal spends at or above a threshold.
///
/// Each interval between two samples is credited to the total only when the
/// sample that opened the interval met the threshold. [`reset`] clears the
/// accumulated duration but keeps the last sample, so a tracker in continuous
/// service credits the interval that straddles the reset to the new cycle.
///
/// [`reset`]: SunlightAccumulator::reset
#[derive(Debug, Clone, PartialEq)]
pub struct SunlightAccumulator {
    threshold: f64,
    last_sample: Option<(DateTime<Utc>, f64)>,
    accumulated: TimeDelta,
}

impl SunlightAccumulator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_sample: None,
            accumulated: TimeDelta::zero(),
        }
    }

    pub fn update(&mut self, value: f64, now: DateTime<Utc>) {
        let Some((last_at, last_value)) = self.last_sample else {
            self.last_sample = Some((now, value));
            return;
        };

        if now <= last_at {
            // Out-of-order sample: no credit, keep the later timestamp
            self.last_sample = Some((last_at, value));
            return;
        }

        if last_value >= self.threshold {
            self.accumulated += now - last_at;
        }
        self.last_sample = Some((now, value));
    }

    pub fn reset(&mut self) {
        self.accumulated = TimeDelta::zero();
    }

    /// Accumulated bright sunshine in hours.
    pub fn hours(&self) -> f64 {
        self.accumulated.num_milliseconds() as f64 / 3_600_000.0
    }

    /// Seed the accumulated duration, e.g. from a restored attribute.
    pub fn restore_hours(&mut self, hours: f64) {
        if hours.is_finite() && hours >= 0.0 {
            self.accumulated = TimeDelta::milliseconds((hours * 3_600_000.0).round() as i64);
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn last_sample_at(&self) -> Option<DateTime<Utc>> {
        self.last_sample.map(|(at, _)| at)
    }
}

impl Default for SunlightAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_SOLAR_RADIATION_THRESHOLD)
    }
}
