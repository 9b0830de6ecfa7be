//! Scenario configuration.
//!
//! Provides the arena layout, tick rates, the voice gate interval and the
//! target dummy's behavior. Configuration can be loaded from and saved to a
//! TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "rampart.toml";

/// One wave of the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveConfig {
    /// Variant names (`grunt`, `mook`, `aero`, `ground`), one per slot
    pub agents: Vec<String>,
    /// Respawns allowed per slot
    #[serde(default)]
    pub respawns: u32,
}

/// Simulation scenario parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Simulation Settings ===
    /// Simulated duration in seconds
    pub duration_secs: f64,
    /// Variable (render) ticks per second
    pub render_fps: u32,
    /// Fixed (physics) ticks per second
    pub physics_hz: u32,
    /// Seed for clip selection
    pub seed: u64,

    // === Arena Settings ===
    /// Half the distance between the two arena walls
    pub arena_half_width: f32,
    /// Gravity applied to walking agents, in units per second squared
    pub gravity: f32,
    /// Delay before a dead slot respawns, in seconds
    pub respawn_delay: f64,
    /// Optional RON profile overrides, applied to every spawn of their variant
    pub profiles: Vec<PathBuf>,

    // === Audio Settings ===
    /// Minimum seconds between two voice lines across the population
    pub voice_interval: f64,
    /// Half extents of the camera centered on the dummy
    pub camera_half_width: f32,
    /// Half height of the camera
    pub camera_half_height: f32,

    // === Dummy Settings ===
    /// Dummy hit points before it is knocked out
    pub dummy_health: u32,
    /// Horizontal reach of the dummy's swing
    pub dummy_reach: f32,
    /// Seconds between two swings
    pub dummy_swing_interval: f64,
    /// Damage of one swing
    pub dummy_damage: u32,
    /// Every n-th swing is a powered attack (0 = never)
    pub powered_every: u32,
    /// Seconds the dummy stays down after being knocked out
    pub dummy_revive_delay: f64,

    // === Waves ===
    /// Waves, in order
    pub waves: Vec<WaveConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            // Simulation
            duration_secs: 90.0,
            render_fps: 60,
            physics_hz: 50,
            seed: 0x5eed,

            // Arena
            arena_half_width: 14.0,
            gravity: 25.0,
            respawn_delay: 3.0,
            profiles: Vec::new(),

            // Audio
            voice_interval: 1.0,
            camera_half_width: 12.0,
            camera_half_height: 7.0,

            // Dummy
            dummy_health: 30,
            dummy_reach: 2.5,
            dummy_swing_interval: 0.8,
            dummy_damage: 1,
            powered_every: 4,
            dummy_revive_delay: 2.0,

            // Waves
            waves: vec![
                WaveConfig {
                    agents: vec!["grunt".into(), "grunt".into()],
                    respawns: 1,
                },
                WaveConfig {
                    agents: vec!["mook".into(), "aero".into(), "ground".into()],
                    respawns: 0,
                },
            ],
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values to sane ranges.
    pub fn validate(&mut self) {
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            self.duration_secs = 0.0;
        }
        self.render_fps = self.render_fps.clamp(1, 1000);
        self.physics_hz = self.physics_hz.clamp(1, 1000);
        self.arena_half_width = self.arena_half_width.clamp(4.0, 500.0);
        self.gravity = self.gravity.clamp(0.0, 200.0);
        self.respawn_delay = self.respawn_delay.clamp(0.0, 600.0);
        self.voice_interval = self.voice_interval.clamp(0.0, 60.0);
        self.camera_half_width = self.camera_half_width.max(1.0);
        self.camera_half_height = self.camera_half_height.max(1.0);
        self.dummy_health = self.dummy_health.max(1);
        self.dummy_reach = self.dummy_reach.clamp(0.1, 50.0);
        self.dummy_swing_interval = self.dummy_swing_interval.clamp(0.05, 60.0);
        self.dummy_revive_delay = self.dummy_revive_delay.clamp(0.0, 600.0);
    }

    /// Seconds per fixed tick.
    #[must_use]
    pub fn fixed_dt(&self) -> f64 {
        1.0 / f64::from(self.physics_hz.max(1))
    }

    /// Seconds per variable tick.
    #[must_use]
    pub fn frame_dt(&self) -> f64 {
        1.0 / f64::from(self.render_fps.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.render_fps, 60);
        assert_eq!(config.physics_hz, 50);
        assert_eq!(config.waves.len(), 2);
        assert!((config.voice_interval - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("scenario").join(CONFIG_FILE);

        let mut config = SimConfig::default();
        config.seed = 42;
        config.dummy_health = 12;
        config.waves = vec![WaveConfig {
            agents: vec!["aero".into()],
            respawns: 3,
        }];

        config.save_to(&config_path).expect("Failed to save config");
        let loaded = SimConfig::load_from(&config_path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_nonexistent() {
        let config = SimConfig::load_from("/nonexistent/path/rampart.toml");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_load_invalid_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "render_fps = \"fast\"").expect("write");

        assert_eq!(SimConfig::load_from(&config_path), SimConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            "seed = 7\n\n[[waves]]\nagents = [\"mook\"]\n",
        )
        .expect("write");

        let config = SimConfig::load_from(&config_path);
        assert_eq!(config.seed, 7);
        assert_eq!(config.render_fps, 60);
        assert_eq!(config.waves.len(), 1);
        assert_eq!(config.waves[0].respawns, 0);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = SimConfig {
            duration_secs: f64::NAN,
            render_fps: 0,
            physics_hz: 5000,
            dummy_health: 0,
            dummy_swing_interval: 0.0,
            ..SimConfig::default()
        };
        config.validate();

        assert!(config.duration_secs.abs() < f64::EPSILON);
        assert_eq!(config.render_fps, 1);
        assert_eq!(config.physics_hz, 1000);
        assert_eq!(config.dummy_health, 1);
        assert!((config.dummy_swing_interval - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tick_lengths() {
        let config = SimConfig::default();
        assert!((config.fixed_dt() - 0.02).abs() < 1e-12);
        assert!((config.frame_dt() - 1.0 / 60.0).abs() < 1e-12);
    }
}
