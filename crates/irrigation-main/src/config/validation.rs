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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of configuration validation, split into blocking errors and
/// warnings that are only logged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Fail with every error joined, or hand back the warnings
    pub fn into_result(self) -> anyhow::Result<Vec<ValidationIssue>> {
        if self.has_errors() {
            let joined = self
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            anyhow::bail!("Invalid configuration: {}", joined);
        }
        Ok(self.warnings)
    }
}

/// A validation issue tied to a config field path (e.g. "zones[0].area")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_fail_and_warnings_pass_through() {
        let mut result = ValidationResult::success();
        result.add_warning("system.poll_interval_secs", "very short");
        let warnings = result.clone().into_result().unwrap();
        assert_eq!(warnings.len(), 1);

        result.add_error("zones[0].area", "must be positive");
        result.add_error("zones[1].name", "duplicate");
        let err = result.into_result().unwrap_err().to_string();
        assert_eq!(
            err,
            "Invalid configuration: zones[0].area: must be positive; zones[1].name: duplicate"
        );
    }
}
