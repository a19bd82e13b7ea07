use std::collections::HashSet;

/// Named action state fed by the host's key bindings.
///
/// `hold` is true while the action is down; `click` only on the frame it went
/// down. The world clears per-frame state after each `update`.
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    held: HashSet<String>,
    pressed: HashSet<String>,
    released: HashSet<String>,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, action: &str) {
        if self.held.insert(action.to_string()) {
            self.pressed.insert(action.to_string());
        }
    }

    pub fn release(&mut self, action: &str) {
        if self.held.remove(action) {
            self.released.insert(action.to_string());
        }
    }

    pub fn hold(&self, action: &str) -> bool {
        self.held.contains(action)
    }

    pub fn click(&self, action: &str) -> bool {
        self.pressed.contains(action)
    }

    pub fn just_released(&self, action: &str) -> bool {
        self.released.contains(action)
    }

    /// Horizontal axis from the `left`/`right` actions: -1, 0 or 1.
    pub fn axis_x(&self) -> f32 {
        let mut axis = 0.0;
        if self.hold("left") {
            axis -= 1.0;
        }
        if self.hold("right") {
            axis += 1.0;
        }
        axis
    }

    /// Clear per-frame state. Held actions persist.
    pub fn end_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }

    /// Drop everything, e.g. on focus loss.
    pub fn clear(&mut self) {
        self.held.clear();
        self.pressed.clear();
        self.released.clear();
    }
}
