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

//! Restore-state persistence for zone entities.
//!
//! Each zone gets one JSON document holding the last value and attributes of
//! its entities, so a restart mid-season resumes with the same bucket.

use crate::entities::{ZoneRestoreState, slugify};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default directory for zone state files.
/// Relative so it works both in development and inside the HA addon.
pub const DEFAULT_STATE_DIR: &str = "./data/irrigation";

#[derive(Debug, Clone)]
pub struct ZoneStatePersistence {
    state_dir: PathBuf,
}

impl ZoneStatePersistence {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn default_production() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }

    pub fn dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn path_for(&self, zone: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", slugify(zone)))
    }

    /// Load a zone's restore state. A missing file yields an empty state.
    pub fn load(&self, zone: &str) -> Result<ZoneRestoreState> {
        let path = self.path_for(zone);
        if !path.exists() {
            info!(
                "No saved state for zone '{}' at {}, starting fresh",
                zone,
                path.display()
            );
            return Ok(ZoneRestoreState::new());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read zone state from {}", path.display()))?;
        let state: ZoneRestoreState = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse zone state from {}", path.display()))?;

        info!(
            "Loaded state for zone '{}' ({} entities) from {}",
            zone,
            state.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save a zone's restore state using an atomic temp-file rename.
    pub fn save(&self, zone: &str, state: &ZoneRestoreState) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).with_context(|| {
                format!("Failed to create directory {}", self.state_dir.display())
            })?;
        }

        let path = self.path_for(zone);
        let json = serde_json::to_string_pretty(state).context("Failed to serialize zone state")?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to rename temp file to {}", path.display()))?;

        debug!("Saved state for zone '{}' to {}", zone, path.display());
        Ok(())
    }

    pub fn exists(&self, zone: &str) -> bool {
        self.path_for(zone).exists()
    }
}

impl Default for ZoneStatePersistence {
    fn default() -> Self {
        Self::default_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::RestoredEntity;
    use serde_json::{Map, json};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let persistence = ZoneStatePersistence::new(dir.path());

        let state = persistence.load("Front Lawn").unwrap();
        assert!(state.is_empty());
        assert!(!persistence.exists("Front Lawn"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let persistence = ZoneStatePersistence::new(dir.path().join("nested"));

        let mut attributes = Map::new();
        attributes.insert("precipitation".to_string(), json!(2.4));
        let mut state = ZoneRestoreState::new();
        state.insert(
            "bucket_delta".to_string(),
            RestoredEntity {
                native_value: Some(-1.6),
                attributes,
            },
        );
        state.insert(
            "bucket".to_string(),
            RestoredEntity {
                native_value: Some(-8.25),
                attributes: Map::new(),
            },
        );

        persistence.save("Front Lawn", &state).unwrap();
        assert!(persistence.exists("Front Lawn"));
        assert_eq!(
            persistence.path_for("Front Lawn"),
            dir.path().join("nested").join("front_lawn.json")
        );
        assert!(!persistence.path_for("Front Lawn").with_extension("tmp").exists());

        let loaded = persistence.load("Front Lawn").unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let dir = tempdir().unwrap();
        let persistence = ZoneStatePersistence::new(dir.path());
        fs::write(persistence.path_for("lawn"), "{ not json").unwrap();

        let err = persistence.load("lawn").unwrap_err();
        assert!(err.to_string().contains("Failed to parse zone state"));
    }
}
