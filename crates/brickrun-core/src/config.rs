use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Default fixed simulation rate.
pub const TICK_RATE_HZ: f64 = 60.0;
/// Frames slower than this rate are treated as degenerate (tab backgrounded, debugger pause).
pub const MIN_FPS: f64 = 4.0;
/// Gravity acceleration (units/s^2, downward). One unit is one tile.
pub const GRAVITY: f32 = -30.0;
pub const VELOCITY_ITERATIONS: usize = 6;
pub const POSITION_ITERATIONS: usize = 2;

/// Scheduler cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_rate_hz: f64,
    pub min_fps: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: TICK_RATE_HZ,
            min_fps: MIN_FPS,
        }
    }
}

impl TimingConfig {
    /// Fixed tick length in seconds.
    pub fn tick_secs(&self) -> f64 {
        if self.tick_rate_hz > 0.0 {
            1.0 / self.tick_rate_hz
        } else {
            1.0 / TICK_RATE_HZ
        }
    }
}

/// Rigid-body solver tuning. Iteration counts are constants, never derived at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec2,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, GRAVITY),
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,
        }
    }
}

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub physics: PhysicsConfig,
}

impl EngineConfig {
    /// Load config from a TOML file. Falls back to defaults if the file is missing
    /// or unparseable.
    pub fn load() -> Self {
        let path = std::env::var("BRICKRUN_CONFIG")
            .unwrap_or_else(|_| "config/brickrun.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    Self::default()
                },
            },
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml(
            r#"
            [timing]
            tick_rate_hz = 120.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timing.tick_rate_hz, 120.0);
        assert_eq!(cfg.timing.min_fps, MIN_FPS);
        assert_eq!(cfg.physics.velocity_iterations, 6);
        assert_eq!(cfg.physics.position_iterations, 2);
    }

    #[test]
    fn gravity_parses_as_array() {
        let cfg = EngineConfig::from_toml(
            r#"
            [physics]
            gravity = [0.0, -10.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.physics.gravity, Vec2::new(0.0, -10.0));
    }

    #[test]
    fn zero_tick_rate_falls_back() {
        let timing = TimingConfig {
            tick_rate_hz: 0.0,
            ..Default::default()
        };
        assert!((timing.tick_secs() - 1.0 / 60.0).abs() < 1e-12);
    }
}
