use glam::Vec2;
use serde::{Deserialize, Serialize};

use brickrun_core::contact::{Contact, OneShot, Touch};
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureFlags, Shape};
use brickrun_core::registry::{ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::{OUT_OF_WORLD_Y, release};
use crate::entity::{Ctx, EntityCore, projectile_filter, roles};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const FIREBALL_RADIUS: f32 = 0.2;
pub const FIREBALL_SPEED: f32 = 12.0;
pub const FIREBALL_BOUNCE_VY: f32 = 6.0;
pub const FIREBALL_LIFETIME_SECS: f32 = 3.0;

static FIREBALL_PROPS: [PropertySpec; 1] =
    [PropertySpec::optional("direction", PropertyKind::Number)];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireballParams {
    pub pos: Vec2,
    /// -1 or 1.
    pub direction: f32,
}

/// Bounces along the floor and kills the first enemy it meets.
pub struct Fireball {
    params: FireballParams,
    core: EntityCore,
    bounce: OneShot<()>,
    dead: bool,
    age: f32,
}

impl Fireball {
    pub fn new(params: FireballParams) -> Self {
        Self {
            core: EntityCore::new("fireball", params.pos),
            bounce: OneShot::new(),
            dead: false,
            age: 0.0,
            params,
        }
    }

    pub fn thrown(pos: Vec2, direction: f32) -> Self {
        let direction = if direction < 0.0 { -1.0 } else { 1.0 };
        Self::new(FireballParams { pos, direction })
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Fireball.tag(),
            name: GameObjectId::Fireball.name(),
            meta: ObjectMeta::transient().with_properties(&FIREBALL_PROPS),
            construct: |params| {
                let direction = params.number("direction")?.unwrap_or(1.0);
                Ok(Box::new(Fireball::thrown(params.pos, direction)))
            },
            deserialize: |data| Ok(Box::new(Fireball::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    pub fn direction(&self) -> f32 {
        self.params.direction
    }

    pub fn is_spent(&self) -> bool {
        self.dead
    }
}

impl GameObject<GameEvent> for Fireball {
    fn kind(&self) -> KindTag {
        GameObjectId::Fireball.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let ball = FixtureDef::new(
            Shape::Circle {
                radius: FIREBALL_RADIUS,
            },
            self.core
                .tag(GameObjectId::Fireball)
                .with_role(roles::BODY)
                .with_flags(FixtureFlags::PIERCING),
        )
        .with_friction(0.0)
        .with_filter(projectile_filter());
        let def = BodyDef::new(BodyKind::Dynamic, self.params.pos)
            .with_fixed_rotation(true)
            .with_linvel(Vec2::new(self.params.direction * FIREBALL_SPEED, 0.0));
        self.core.build(ctx.physics, &def, &[ball])?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        self.core.interpolate(dt, ctx.physics);
        self.core.visual.sprite.frame = (ctx.tick() / 4 % 4) as u32;
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        self.age += ctx.fixed_dt();
        let fell = self.core.position(ctx.physics).y < OUT_OF_WORLD_Y;
        if self.dead || fell || self.age >= FIREBALL_LIFETIME_SECS {
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
            return;
        }
        let vy = if self.bounce.take().is_some() {
            FIREBALL_BOUNCE_VY
        } else {
            self.core.velocity(ctx.physics).y
        };
        self.core.set_velocity(
            ctx.physics,
            Vec2::new(self.params.direction * FIREBALL_SPEED, vy),
        );
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for Fireball {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Fireball {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for Fireball {
    fn on_contact(&mut self, contact: &Contact) {
        if !contact.is_presolve() || self.dead {
            return;
        }
        // the gate lets it pass through enemies, so this pre-solve arrives disabled
        if contact.other.flags.contains(FixtureFlags::ENEMY) {
            self.dead = true;
            return;
        }
        if !contact.enabled {
            return;
        }
        match contact.touch() {
            Some(Touch::Landed) => {
                self.bounce.offer(());
            },
            Some(_) => self.dead = true,
            None => {},
        }
    }
}
