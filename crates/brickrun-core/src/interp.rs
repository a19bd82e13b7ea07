use std::f32::consts::{PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Render-side pose of a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpState {
    pub position: Vec2,
    pub angle: f32,
}

impl InterpState {
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }
}

/// Exponential smoothing of a simulated pose toward the physics truth.
///
/// Each render frame moves a fraction `dt / fixed_dt` (clamped to 1) of the way.
/// Never extrapolates past the target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Interpolated {
    last: InterpState,
}

impl Interpolated {
    pub fn new(initial: InterpState) -> Self {
        Self { last: initial }
    }

    pub fn last(&self) -> InterpState {
        self.last
    }

    /// Jump straight to `state` (spawn, teleport).
    pub fn snap(&mut self, state: InterpState) {
        self.last = state;
    }

    pub fn advance(&mut self, dt: f32, fixed_dt: f32, target: InterpState) -> InterpState {
        let alpha = if fixed_dt > 0.0 {
            (dt / fixed_dt).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.last = if alpha >= 1.0 {
            target
        } else {
            InterpState {
                position: self.last.position.lerp(target.position, alpha),
                angle: lerp_angle(self.last.angle, target.angle, alpha),
            }
        };
        self.last
    }
}

/// Interpolate along the shorter arc between two angles (radians).
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let delta = (to - from + PI).rem_euclid(TAU) - PI;
    from + delta * t
}
