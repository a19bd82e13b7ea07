//! Hit-from-below detection and bump animation shared by block kinds.

use std::f32::consts::PI;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use brickrun_core::contact::{Contact, ContactLatch, OneShot, hit_from_below};
use brickrun_core::object::ObjectId;

use crate::entity::roles;
use crate::ids::GameObjectId;

pub const BUMP_SECS: f32 = 0.2;
pub const BUMP_HEIGHT: f32 = 0.3;
/// Blocks are one tile.
pub const BLOCK_SIZE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHit {
    pub by: ObjectId,
    /// The hitter was big enough to break bricks.
    pub big: bool,
}

/// What a block releases when hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockItem {
    Coin,
    Mushroom,
    OneUp,
    Star,
}

impl BlockItem {
    /// The object to spawn. Mushrooms turn into flowers for a big hitter;
    /// coins are scored directly and spawn nothing.
    pub fn spawn_kind(self, big: bool) -> Option<GameObjectId> {
        match self {
            BlockItem::Coin => None,
            BlockItem::Mushroom if big => Some(GameObjectId::FireFlower),
            BlockItem::Mushroom => Some(GameObjectId::Mushroom),
            BlockItem::OneUp => Some(GameObjectId::OneUp),
            BlockItem::Star => Some(GameObjectId::Star),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockCore {
    hit: OneShot<BlockHit>,
    latch: ContactLatch,
    bump: f32,
}

impl BlockCore {
    pub fn on_contact(&mut self, contact: &Contact) {
        if !contact.is_presolve()
            || !contact.enabled
            || contact.other.kind != GameObjectId::Player.tag()
            || !roles::is_body(contact.other.role)
        {
            return;
        }
        let Some(normal) = contact.normal else {
            return;
        };
        let by = contact.other_owner();
        if !hit_from_below(normal) {
            self.latch.touch(by, contact.step);
            return;
        }
        if self.latch.engage(by, contact.step) {
            self.hit.offer(BlockHit {
                by,
                big: contact.other.role == roles::BODY_BIG,
            });
        }
    }

    pub fn take_hit(&mut self) -> Option<BlockHit> {
        self.hit.take()
    }

    pub fn start_bump(&mut self) {
        self.bump = BUMP_SECS;
    }

    pub fn is_bumping(&self) -> bool {
        self.bump > 0.0
    }

    /// Advance the bump animation and return the visual displacement.
    pub fn tick(&mut self, dt: f32) -> Vec2 {
        self.bump = (self.bump - dt).max(0.0);
        self.offset()
    }

    pub fn offset(&self) -> Vec2 {
        if self.bump <= 0.0 {
            return Vec2::ZERO;
        }
        let t = 1.0 - self.bump / BUMP_SECS;
        Vec2::new(0.0, (PI * t).sin() * BUMP_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun_core::physics::FixtureTag;
    use brickrun_core::test_helpers::{presolve, tag};

    fn block() -> FixtureTag {
        tag(1, GameObjectId::QuestionBlock.tag())
    }

    fn player(big: bool) -> FixtureTag {
        let role = if big { roles::BODY_BIG } else { roles::BODY };
        tag(2, GameObjectId::Player.tag()).with_role(role)
    }

    #[test]
    fn only_hits_from_below_count() {
        let mut core = BlockCore::default();
        core.on_contact(&presolve(block(), player(false), Vec2::Y));
        assert_eq!(core.take_hit(), None);

        core.on_contact(&presolve(block(), player(true), Vec2::NEG_Y).at_step(5));
        assert_eq!(
            core.take_hit(),
            Some(BlockHit {
                by: ObjectId(2),
                big: true
            })
        );
    }

    #[test]
    fn resolved_contact_hits_once() {
        let mut core = BlockCore::default();
        for step in 1..6 {
            core.on_contact(&presolve(block(), player(false), Vec2::NEG_Y).at_step(step));
        }
        assert!(core.take_hit().is_some());
        core.on_contact(&presolve(block(), player(false), Vec2::NEG_Y).at_step(6));
        assert!(core.take_hit().is_none());
    }

    #[test]
    fn bump_rises_and_settles() {
        let mut core = BlockCore::default();
        core.start_bump();
        let mid = core.tick(BUMP_SECS / 2.0);
        assert!((mid.y - BUMP_HEIGHT).abs() < 1e-4);
        assert_eq!(core.tick(BUMP_SECS), Vec2::ZERO);
        assert!(!core.is_bumping());
    }

    #[test]
    fn mushroom_upgrades_for_big_hitters() {
        assert_eq!(BlockItem::Coin.spawn_kind(true), None);
        assert_eq!(BlockItem::Mushroom.spawn_kind(false), Some(GameObjectId::Mushroom));
        assert_eq!(BlockItem::Mushroom.spawn_kind(true), Some(GameObjectId::FireFlower));
    }
}
