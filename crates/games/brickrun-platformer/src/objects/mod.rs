pub mod blocks;
pub mod fireball;
pub mod flag;
pub mod hazards;
pub mod items;
pub mod piranha;
pub mod player;
pub mod terrain;
pub mod walkers;

use glam::Vec2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use brickrun_core::error::CreateError;
use brickrun_core::physics::{BodyDef, BodyKind, FixtureDef, FixtureFlags, FixtureTag, GhostMode, Shape};
use brickrun_core::registry::CommonParams;

use crate::entity::{Ctx, EntityCore, enemy_filter, roles};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

/// Side length of walking enemies.
pub const ENEMY_SIZE: f32 = 0.9;
/// Upward kick given to an enemy knocked out by a piercing party.
pub const KNOCK_OUT_VY: f32 = 8.0;
/// How long a knocked-out enemy falls before it is removed.
pub const KNOCK_OUT_SECS: f32 = 2.0;
/// Anything that falls below this is gone for good.
pub const OUT_OF_WORLD_Y: f32 = -20.0;

/// A single position. Most click-placed kinds need nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub pos: Vec2,
}

/// Position plus initial walking direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkerParams {
    pub pos: Vec2,
    #[serde(default = "default_facing")]
    pub facing: f32,
}

fn default_facing() -> f32 {
    -1.0
}

impl WalkerParams {
    pub fn from_params(params: &CommonParams) -> Result<Self, CreateError> {
        let facing = params.number("facing")?.unwrap_or(-1.0);
        Ok(Self {
            pos: params.pos,
            facing: if facing < 0.0 { -1.0 } else { 1.0 },
        })
    }
}

/// Read an optional property holding a serde enum spelled as text.
pub(crate) fn choice<T: DeserializeOwned>(
    params: &CommonParams,
    name: &str,
) -> Result<Option<T>, CreateError> {
    match params.properties.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| CreateError::InvalidProperty {
                name: name.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Axis-aligned rectangle spanned by the drag, as a polygon outline.
pub(crate) fn drag_rect(params: &CommonParams) -> Vec<Vec2> {
    let (a, b) = (params.drag_start, params.drag_end);
    vec![a, Vec2::new(b.x, a.y), b, Vec2::new(a.x, b.y)]
}

/// Dynamic body with its origin at the bottom center.
pub(crate) fn walker_body(pos: Vec2) -> BodyDef {
    BodyDef::new(BodyKind::Dynamic, pos).with_fixed_rotation(true)
}

/// Square enemy hull sitting on the body origin.
pub(crate) fn enemy_hull(tag: FixtureTag) -> FixtureDef {
    FixtureDef::new(
        Shape::rect(ENEMY_SIZE, ENEMY_SIZE),
        tag.with_role(roles::BODY).with_flags(FixtureFlags::ENEMY),
    )
    .with_offset(Vec2::new(0.0, ENEMY_SIZE / 2.0))
    .with_filter(enemy_filter())
}

/// Knock an enemy out: it stops colliding and falls off screen.
pub(crate) fn knock_out(core: &mut EntityCore, kind: GameObjectId, ctx: &mut Ctx<'_>) {
    ctx.physics.set_ghost(core.id(), GhostMode::Ghost);
    let v = core.velocity(ctx.physics);
    core.set_velocity(ctx.physics, Vec2::new(v.x.signum(), KNOCK_OUT_VY));
    ctx.emit(GameEvent::EnemyKilled {
        kind,
        at: core.position(ctx.physics),
    });
}

/// Release physics state of a body-owning object.
pub(crate) fn release(core: &mut EntityCore, ctx: &mut Ctx<'_>) {
    ctx.physics.set_ghost(core.id(), GhostMode::Solid);
    core.destroy(ctx.physics);
}
