use serde::{Deserialize, Serialize};

use brickrun_core::powerup;

use crate::config::HURT_INVULNERABLE_SECS;

/// Timed effects on the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Kills enemies on touch.
    Star,
    /// Grace period after being hurt.
    Invulnerable,
}

pub const STAR_SECS: f32 = 10.0;

impl powerup::EffectKind for Effect {
    fn duration(&self) -> f32 {
        match self {
            Effect::Star => STAR_SECS,
            Effect::Invulnerable => HURT_INVULNERABLE_SECS,
        }
    }
}

pub type EffectSet = powerup::EffectSet<Effect>;

/// Player growth stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Power {
    #[default]
    Small,
    Big,
    Fire,
}

impl Power {
    pub fn is_big(self) -> bool {
        self != Power::Small
    }

    /// Stage after eating a mushroom.
    pub fn grow(self) -> Self {
        match self {
            Power::Small => Power::Big,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_expires() {
        let mut set = EffectSet::default();
        set.apply(Effect::Star);
        assert!(set.tick(STAR_SECS - 0.1).is_empty());
        assert_eq!(set.tick(0.2), vec![Effect::Star]);
        assert!(set.is_empty());
    }

    #[test]
    fn hurt_grace_is_shorter_than_star() {
        let mut set = EffectSet::default();
        set.apply(Effect::Star);
        set.apply(Effect::Invulnerable);
        let expired = set.tick(HURT_INVULNERABLE_SECS + 0.01);
        assert_eq!(expired, vec![Effect::Invulnerable]);
        assert!(set.has(Effect::Star));
    }

    #[test]
    fn mushroom_never_downgrades_fire() {
        assert_eq!(Power::Small.grow(), Power::Big);
        assert_eq!(Power::Fire.grow(), Power::Fire);
        assert!(!Power::Small.is_big());
    }
}
