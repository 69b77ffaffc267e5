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

//! Running min/max/mean over a single physical quantity.

use crate::readings::HistorySample;
use serde::{Deserialize, Serialize};

/// Incremental min/max/mean accumulator for one daily cycle.
///
/// `min`, `max` and `mean` are all `None` exactly when no value has been
/// accepted since construction or the last [`StatTracker::reset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatTracker {
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    count: u64,
}

impl StatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one value. Callers filter out non-finite input.
    pub fn update(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
        self.sum += value;
        self.count += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Replay historical samples, skipping anything that is not a number.
    ///
    /// Returns how many samples were accepted.
    pub fn load_history<'a>(&mut self, samples: impl IntoIterator<Item = &'a HistorySample>) -> usize {
        let mut accepted = 0;
        for sample in samples {
            if let Some(value) = sample.value.as_f64() {
                self.update(value);
                accepted += 1;
            }
        }
        accepted
    }

    pub fn is_tracking(&self) -> bool {
        self.count > 0
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Arithmetic mean of accepted values.
    pub fn mean(&self) -> Option<f64> {
        let (min, max) = (self.min?, self.max?);
        // Summation rounding must not push the mean outside [min, max]
        Some((self.sum / self.count as f64).clamp(min, max))
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
