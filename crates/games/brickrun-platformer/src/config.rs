use serde::{Deserialize, Serialize};

use brickrun_core::config::EngineConfig;

/// Horizontal walk speed (tiles/s).
pub const WALK_SPEED: f32 = 6.0;
/// Horizontal speed while `run` is held.
pub const RUN_SPEED: f32 = 9.5;
/// Horizontal acceleration toward the target speed (tiles/s^2).
pub const ACCELERATION: f32 = 40.0;
/// Jump initial velocity.
pub const JUMP_VELOCITY: f32 = 15.0;
/// Upward velocity after stomping an enemy.
pub const STOMP_BOUNCE: f32 = 10.0;
/// Invulnerability after being hurt.
pub const HURT_INVULNERABLE_SECS: f32 = 2.0;
/// Falling below this height is death.
pub const FALL_DEATH_Y: f32 = -10.0;
/// Delay between death and restart.
pub const RESTART_DELAY_SECS: f32 = 2.5;
pub const STARTING_LIVES: u32 = 3;

/// Player movement tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub acceleration: f32,
    pub jump_velocity: f32,
    pub stomp_bounce: f32,
    pub fall_death_y: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            walk_speed: WALK_SPEED,
            run_speed: RUN_SPEED,
            acceleration: ACCELERATION,
            jump_velocity: JUMP_VELOCITY,
            stomp_bounce: STOMP_BOUNCE,
            fall_death_y: FALL_DEATH_Y,
        }
    }
}

/// Viewport in world units (tiles).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: f32,
    pub height: f32,
    /// Fraction of the viewport width the player may cover before scrolling.
    pub dead_zone: f32,
    /// Whether the camera may scroll back to the left.
    pub allow_backtrack: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 20.0,
            height: 15.0,
            dead_zone: 0.1,
            allow_backtrack: false,
        }
    }
}

/// Top-level platformer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformerConfig {
    pub engine: EngineConfig,
    pub player: PlayerConfig,
    pub camera: CameraConfig,
    pub starting_lives: u32,
    pub restart_delay_secs: f32,
}

impl Default for PlatformerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            player: PlayerConfig::default(),
            camera: CameraConfig::default(),
            starting_lives: STARTING_LIVES,
            restart_delay_secs: RESTART_DELAY_SECS,
        }
    }
}

impl PlatformerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file is missing
    /// or unparseable.
    pub fn load() -> Self {
        let path = std::env::var("BRICKRUN_PLATFORMER_CONFIG")
            .unwrap_or_else(|_| "config/platformer.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<PlatformerConfig>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    PlatformerConfig::default()
                },
            },
            Err(_) => PlatformerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_tables_override_selectively() {
        let cfg: PlatformerConfig = toml::from_str(
            r#"
            starting_lives = 5

            [player]
            run_speed = 12.0

            [engine.timing]
            tick_rate_hz = 120.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.starting_lives, 5);
        assert_eq!(cfg.player.run_speed, 12.0);
        assert_eq!(cfg.player.walk_speed, WALK_SPEED);
        assert_eq!(cfg.engine.timing.tick_rate_hz, 120.0);
        assert!(!cfg.camera.allow_backtrack);
    }

    #[test]
    fn missing_file_uses_defaults() {
        // SAFETY: tests in this crate do not read this variable concurrently.
        unsafe {
            std::env::set_var("BRICKRUN_PLATFORMER_CONFIG", "/nonexistent/platformer.toml");
        }
        assert_eq!(PlatformerConfig::load(), PlatformerConfig::default());
    }
}
