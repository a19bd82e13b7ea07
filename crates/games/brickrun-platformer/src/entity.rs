//! State shared by every object that owns a body.

use glam::Vec2;

use brickrun_core::error::CreateError;
use brickrun_core::interp::{InterpState, Interpolated};
use brickrun_core::object::{ObjectId, Visual};
use brickrun_core::physics::{
    BodyDef, BodyHandle, CollisionFilter, FixtureDef, FixtureHandle, FixtureTag, PhysicsWorld,
};
use brickrun_core::world::WorldCtx;

use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub type Ctx<'a> = WorldCtx<'a, GameEvent>;

/// Collision group bits.
pub mod groups {
    pub const GEOMETRY: u32 = 1;
    pub const PLAYER: u32 = 1 << 1;
    pub const ENEMY: u32 = 1 << 2;
    pub const ITEM: u32 = 1 << 3;
    pub const PROJECTILE: u32 = 1 << 4;
    /// Hazards and the flag: only the player reacts to them.
    pub const TRIGGER: u32 = 1 << 5;
}

/// Fixture roles, stored in the fixture tag so the receiver of a contact
/// knows which part of the other party it touched.
pub mod roles {
    pub const BODY: u8 = 0;
    /// Player body while big or fire.
    pub const BODY_BIG: u8 = 1;
    pub const FOOT: u8 = 2;
    pub const LEFT_PROBE: u8 = 3;
    pub const RIGHT_PROBE: u8 = 4;
    pub const PICKUP: u8 = 5;

    pub fn is_body(role: u8) -> bool {
        role == BODY || role == BODY_BIG
    }
}

pub fn filter(membership: u32, filter: u32) -> CollisionFilter {
    CollisionFilter { membership, filter }
}

pub fn geometry_filter() -> CollisionFilter {
    filter(groups::GEOMETRY, u32::MAX)
}

pub fn player_filter() -> CollisionFilter {
    filter(
        groups::PLAYER,
        groups::GEOMETRY | groups::ENEMY | groups::ITEM | groups::TRIGGER,
    )
}

pub fn enemy_filter() -> CollisionFilter {
    filter(
        groups::ENEMY,
        groups::GEOMETRY | groups::PLAYER | groups::ENEMY | groups::PROJECTILE,
    )
}

/// Ground probes and walking items only see level geometry.
pub fn ground_sensor_filter(membership: u32) -> CollisionFilter {
    filter(membership, groups::GEOMETRY)
}

pub fn pickup_filter() -> CollisionFilter {
    filter(groups::ITEM, groups::PLAYER)
}

pub fn projectile_filter() -> CollisionFilter {
    filter(groups::PROJECTILE, groups::GEOMETRY | groups::ENEMY)
}

pub fn trigger_filter() -> CollisionFilter {
    filter(groups::TRIGGER, groups::PLAYER)
}

/// Body handle, render state and interpolation history of one object.
#[derive(Debug, Clone)]
pub struct EntityCore {
    id: ObjectId,
    body: Option<BodyHandle>,
    interp: Interpolated,
    pub visual: Visual,
}

impl EntityCore {
    pub fn new(sprite: &'static str, at: Vec2) -> Self {
        let mut visual = Visual::new(sprite);
        visual.position = at;
        Self {
            id: ObjectId(0),
            body: None,
            interp: Interpolated::new(InterpState::new(at, 0.0)),
            visual,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn tag(&self, kind: GameObjectId) -> FixtureTag {
        FixtureTag::new(self.id, kind.tag())
    }

    /// Record the world-assigned id. Call before building fixture tags.
    pub fn bind(&mut self, id: ObjectId) {
        self.id = id;
    }

    /// Create the body and its fixtures in one go.
    pub fn build(
        &mut self,
        physics: &mut PhysicsWorld,
        def: &BodyDef,
        fixtures: &[FixtureDef],
    ) -> Result<Vec<FixtureHandle>, CreateError> {
        let (body, handles) = physics.create_body_with(def, fixtures)?;
        self.body = Some(body);
        self.snap(def.position);
        Ok(handles)
    }

    /// Physics position, or the last rendered one when the body is gone.
    pub fn position(&self, physics: &PhysicsWorld) -> Vec2 {
        self.body
            .and_then(|b| physics.position(b))
            .unwrap_or(self.visual.position)
    }

    pub fn velocity(&self, physics: &PhysicsWorld) -> Vec2 {
        self.body
            .and_then(|b| physics.linvel(b))
            .unwrap_or(Vec2::ZERO)
    }

    pub fn set_velocity(&self, physics: &mut PhysicsWorld, velocity: Vec2) {
        if let Some(body) = self.body {
            physics.set_linvel(body, velocity);
        }
    }

    pub fn set_vy(&self, physics: &mut PhysicsWorld, vy: f32) {
        let v = self.velocity(physics);
        self.set_velocity(physics, Vec2::new(v.x, vy));
    }

    /// Move the rendered pose toward the physics pose.
    pub fn interpolate(&mut self, dt: f32, physics: &PhysicsWorld) {
        let Some(body) = self.body else {
            return;
        };
        let (Some(position), Some(angle)) = (physics.position(body), physics.angle(body)) else {
            return;
        };
        let state = self
            .interp
            .advance(dt, physics.fixed_dt(), InterpState::new(position, angle));
        self.visual.position = state.position;
        self.visual.angle = state.angle;
    }

    pub fn snap(&mut self, at: Vec2) {
        self.interp.snap(InterpState::new(at, 0.0));
        self.visual.position = at;
        self.visual.angle = 0.0;
    }

    /// Instantly move the body and the rendered pose.
    pub fn teleport(&mut self, physics: &mut PhysicsWorld, to: Vec2) {
        if let Some(body) = self.body {
            physics.set_position(body, to, 0.0);
            physics.set_linvel(body, Vec2::ZERO);
        }
        self.snap(to);
    }

    /// Queue the body for destruction.
    pub fn destroy(&mut self, physics: &mut PhysicsWorld) {
        if let Some(body) = self.body.take() {
            physics.queue_destroy(body);
        }
    }
}

/// Move `current` toward `target` by at most `step`.
pub fn approach(current: f32, target: f32, step: f32) -> f32 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun_core::config::EngineConfig;
    use brickrun_core::physics::{BodyKind, Shape};

    fn physics() -> PhysicsWorld {
        let config = EngineConfig::default();
        PhysicsWorld::new(&config.physics, config.timing.tick_secs() as f32)
    }

    #[test]
    fn approach_never_overshoots() {
        assert_eq!(approach(0.0, 5.0, 2.0), 2.0);
        assert_eq!(approach(4.5, 5.0, 2.0), 5.0);
        assert_eq!(approach(0.0, -1.0, 2.0), -1.0);
    }

    #[test]
    fn groups_pair_up_as_intended() {
        let interacts = |a: CollisionFilter, b: CollisionFilter| {
            a.membership & b.filter != 0 && b.membership & a.filter != 0
        };
        let item_body = ground_sensor_filter(groups::ITEM);
        assert!(interacts(player_filter(), pickup_filter()));
        assert!(!interacts(player_filter(), item_body));
        assert!(interacts(item_body, geometry_filter()));
        assert!(!interacts(ground_sensor_filter(groups::ENEMY), player_filter()));
        assert!(interacts(projectile_filter(), enemy_filter()));
        assert!(!interacts(projectile_filter(), player_filter()));
        assert!(!interacts(trigger_filter(), enemy_filter()));
    }

    #[test]
    fn core_follows_body_and_forgets_it_on_destroy() {
        let mut physics = physics();
        let mut core = EntityCore::new("thing", Vec2::new(1.0, 2.0));
        core.bind(ObjectId(4));
        let tag = core.tag(GameObjectId::Goomba);
        assert_eq!(tag.owner, ObjectId(4));
        core.build(
            &mut physics,
            &BodyDef::new(BodyKind::Dynamic, Vec2::new(1.0, 2.0)),
            &[FixtureDef::new(Shape::rect(1.0, 1.0), tag)],
        )
        .unwrap();
        assert_eq!(core.position(&physics), Vec2::new(1.0, 2.0));

        core.teleport(&mut physics, Vec2::new(5.0, 5.0));
        assert_eq!(core.visual.position, Vec2::new(5.0, 5.0));

        core.destroy(&mut physics);
        assert!(core.body().is_none());
        assert_eq!(physics.pending_destroy_count(), 1);
        // falls back to the last rendered position
        assert_eq!(core.position(&physics), Vec2::new(5.0, 5.0));
    }
}
