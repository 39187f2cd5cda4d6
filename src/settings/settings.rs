// Settings management and persistence
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::Volume;

/// Observer cadence bounds in milliseconds
const MIN_TICK_INTERVAL_MS: u64 = 250;
const MAX_TICK_INTERVAL_MS: u64 = 1000;

/// Default skip used by the forward/backward buttons
const DEFAULT_SEEK_STEP_SECS: u64 = 15;

/// Player preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub version: i32, // Settings schema version for future migrations
    pub volume: f32,
    pub tick_interval_ms: u64, // 250-1000ms
    pub seek_step_secs: u64,
    pub event_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            volume: 1.0,
            tick_interval_ms: MIN_TICK_INTERVAL_MS,
            seek_step_secs: DEFAULT_SEEK_STEP_SECS,
            event_capacity: 64,
        }
    }
}

impl PlayerSettings {
    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("player_settings.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            tracing::info!("[Settings] No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;

        let settings: PlayerSettings =
            serde_json::from_str(&content).context("Failed to parse settings")?;

        tracing::info!("[Settings] Loaded settings from {:?}", path);
        Ok(settings.sanitized())
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        // Ensure directory exists
        fs::create_dir_all(app_dir).context("Failed to create settings directory")?;

        let path = Self::get_settings_path(app_dir);
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings file {:?}", path))?;

        tracing::info!("[Settings] Saved settings to {:?}", path);
        Ok(())
    }

    /// Pull every field back into its valid range
    pub fn sanitized(mut self) -> Self {
        self.volume = Volume::new(self.volume).get();
        self.tick_interval_ms = self
            .tick_interval_ms
            .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS);
        if self.seek_step_secs == 0 {
            self.seek_step_secs = DEFAULT_SEEK_STEP_SECS;
        }
        self.event_capacity = self.event_capacity.max(1);
        self
    }

    pub fn volume(&self) -> Volume {
        Volume::new(self.volume)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms
                .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS),
        )
    }

    pub fn seek_step(&self) -> Duration {
        Duration::from_secs(self.seek_step_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.seek_step(), Duration::from_secs(15));
        assert_eq!(settings.tick_interval(), Duration::from_millis(250));
        assert_eq!(settings.volume(), Volume::FULL);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlayerSettings::load(dir.path()).unwrap();
        assert_eq!(settings.seek_step_secs, 15);
    }

    #[test]
    fn test_save_and_reload_volume() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlayerSettings {
            volume: 0.35,
            ..PlayerSettings::default()
        };
        settings.save(dir.path()).unwrap();

        let loaded = PlayerSettings::load(dir.path()).unwrap();
        assert!((loaded.volume - 0.35).abs() < f32::EPSILON);
    }

    #[test]
    fn test_out_of_range_values_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            PlayerSettings::get_settings_path(dir.path()),
            r#"{"volume": 3.0, "tick_interval_ms": 10, "seek_step_secs": 0}"#,
        )
        .unwrap();

        let loaded = PlayerSettings::load(dir.path()).unwrap();
        assert_eq!(loaded.volume, 1.0);
        assert_eq!(loaded.tick_interval_ms, 250);
        assert_eq!(loaded.seek_step_secs, 15);
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(PlayerSettings::get_settings_path(dir.path()), "{not json").unwrap();
        assert!(PlayerSettings::load(dir.path()).is_err());
    }
}
