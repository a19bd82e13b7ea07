use glam::Vec2;

use crate::config::CameraConfig;

/// Vertical catch-up rate (1/s).
const VERTICAL_LERP_RATE: f32 = 5.0;

/// Side-scrolling camera. Horizontally it tracks the player through a dead
/// zone and, unless configured otherwise, never scrolls back to the left.
#[derive(Debug, Clone)]
pub struct Camera {
    config: CameraConfig,
    center: Vec2,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            center: Vec2::ZERO,
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Jump straight to `target` (level start, teleports).
    pub fn snap(&mut self, target: Vec2) {
        self.center = target;
    }

    pub fn follow(&mut self, target: Vec2, dt: f32) {
        let half_zone = self.config.width * self.config.dead_zone / 2.0;
        let dx = target.x - self.center.x;
        if dx > half_zone {
            self.center.x = target.x - half_zone;
        } else if dx < -half_zone && self.config.allow_backtrack {
            self.center.x = target.x + half_zone;
        }
        let lerp = (VERTICAL_LERP_RATE * dt).min(1.0);
        self.center.y += (target.y - self.center.y) * lerp;
    }

    /// Lower-left and upper-right corners of the visible area.
    pub fn viewport(&self) -> (Vec2, Vec2) {
        let half = Vec2::new(self.config.width, self.config.height) / 2.0;
        (self.center - half, self.center + half)
    }

    /// Whether `pos` is on screen, allowing `margin` units around the edges.
    pub fn is_visible(&self, pos: Vec2, margin: f32) -> bool {
        let (min, max) = self.viewport();
        let margin = Vec2::splat(margin);
        pos.cmpge(min - margin).all() && pos.cmple(max + margin).all()
    }
}
