use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::config::{
    self, TrackerConfig, IDLE_THRESHOLD_SECS, LOOP_INTERVAL_SECS, TARGET_SECONDS_PER_DAY,
};

/// User-tunable overrides for the compiled-in defaults. Loaded once at
/// startup from `settings.json` in the app data dir; absent or malformed
/// files fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    pub target_seconds: u64,
    pub loop_interval_secs: u64,
    pub idle_threshold_secs: u64,
    pub daw_process_names: Vec<String>,
    pub blocked_sites: Vec<String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            target_seconds: TARGET_SECONDS_PER_DAY,
            loop_interval_secs: LOOP_INTERVAL_SECS,
            idle_threshold_secs: IDLE_THRESHOLD_SECS,
            daw_process_names: config::DAW_PROCESS_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            blocked_sites: config::SITES_TO_BLOCK
                .iter()
                .map(|site| site.to_string())
                .collect(),
        }
    }
}

impl TrackerSettings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;

        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                log::warn!("Ignoring malformed settings at {}: {err}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            target_seconds: self.target_seconds,
            loop_interval: Duration::from_secs(self.loop_interval_secs.max(1)),
            idle_threshold: Duration::from_secs(self.idle_threshold_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = TrackerSettings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.target_seconds, TARGET_SECONDS_PER_DAY);
        assert_eq!(settings.loop_interval_secs, LOOP_INTERVAL_SECS);
        assert!(!settings.daw_process_names.is_empty());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "targetSeconds": 600 }"#).unwrap();

        let settings = TrackerSettings::load(&path).unwrap();
        assert_eq!(settings.target_seconds, 600);
        assert_eq!(settings.idle_threshold_secs, IDLE_THRESHOLD_SECS);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json at all").unwrap();

        let settings = TrackerSettings::load(&path).unwrap();
        assert_eq!(settings.target_seconds, TARGET_SECONDS_PER_DAY);
    }

    #[test]
    fn loop_interval_is_never_zero() {
        let settings = TrackerSettings {
            loop_interval_secs: 0,
            ..TrackerSettings::default()
        };
        assert_eq!(
            settings.tracker_config().loop_interval,
            Duration::from_secs(1)
        );
    }
}
