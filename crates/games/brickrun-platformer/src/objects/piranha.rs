use glam::Vec2;

use brickrun_core::contact::Contact;
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureFlags, Shape};
use brickrun_core::registry::{ObjectMeta, ObjectVTable};

use super::{Placement, release};
use crate::enemy::{EnemyCore, EnemyEvent};
use crate::entity::{Ctx, EntityCore, enemy_filter, roles};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const PLANT_WIDTH: f32 = 0.8;
pub const PLANT_HEIGHT: f32 = 1.2;
/// Extra depth below the pipe top while hidden.
const HIDE_DEPTH: f32 = 0.1;
/// The plant will not come out while the player stands this close.
pub const SHY_DISTANCE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantPhase {
    Hidden,
    Rising,
    Exposed,
    Sinking,
}

impl PlantPhase {
    fn duration(self) -> f32 {
        match self {
            PlantPhase::Hidden | PlantPhase::Exposed => 1.5,
            PlantPhase::Rising | PlantPhase::Sinking => 1.0,
        }
    }

    fn next(self) -> Self {
        match self {
            PlantPhase::Hidden => PlantPhase::Rising,
            PlantPhase::Rising => PlantPhase::Exposed,
            PlantPhase::Exposed => PlantPhase::Sinking,
            PlantPhase::Sinking => PlantPhase::Hidden,
        }
    }
}

/// Rises out of a pipe and sinks back in a fixed cycle. `pos` is the center
/// of the pipe's top edge.
pub struct PiranhaPlant {
    params: Placement,
    core: EntityCore,
    enemy: EnemyCore,
    phase: PlantPhase,
    elapsed: f32,
}

impl PiranhaPlant {
    pub fn new(params: Placement) -> Self {
        Self {
            core: EntityCore::new("piranha_plant", params.pos),
            enemy: EnemyCore::new(1.0, 0.0),
            phase: PlantPhase::Hidden,
            elapsed: 0.0,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::PiranhaPlant.tag(),
            name: GameObjectId::PiranhaPlant.name(),
            meta: ObjectMeta::placed(),
            construct: |params| Ok(Box::new(PiranhaPlant::new(Placement { pos: params.pos }))),
            deserialize: |data| {
                Ok(Box::new(PiranhaPlant::new(serde_json::from_value(
                    data.clone(),
                )?)))
            },
            drag_preview: None,
        }
    }

    pub fn phase(&self) -> PlantPhase {
        self.phase
    }

    /// How far out of the pipe the plant is, from 0 to 1.
    pub fn extension(&self) -> f32 {
        let t = (self.elapsed / self.phase.duration()).clamp(0.0, 1.0);
        match self.phase {
            PlantPhase::Hidden => 0.0,
            PlantPhase::Rising => t,
            PlantPhase::Exposed => 1.0,
            PlantPhase::Sinking => 1.0 - t,
        }
    }

    fn body_position(&self) -> Vec2 {
        self.params.pos - Vec2::new(0.0, (1.0 - self.extension()) * (PLANT_HEIGHT + HIDE_DEPTH))
    }

    fn player_nearby(&self, ctx: &Ctx<'_>) -> bool {
        ctx.directory
            .first_of_kind(GameObjectId::Player.tag())
            .and_then(|player| ctx.position_of(player))
            .is_some_and(|p| (p.x - self.params.pos.x).abs() < SHY_DISTANCE)
    }
}

impl GameObject<GameEvent> for PiranhaPlant {
    fn kind(&self) -> KindTag {
        GameObjectId::PiranhaPlant.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let hull = FixtureDef::new(
            Shape::rect(PLANT_WIDTH, PLANT_HEIGHT),
            self.core
                .tag(GameObjectId::PiranhaPlant)
                .with_role(roles::BODY)
                .with_flags(FixtureFlags::ENEMY),
        )
        .with_offset(Vec2::new(0.0, PLANT_HEIGHT / 2.0))
        .with_filter(enemy_filter());
        let def = BodyDef::new(BodyKind::Kinematic, self.body_position());
        self.core.build(ctx.physics, &def, &[hull])?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        if let Some(EnemyEvent::Pierced { .. }) = self.enemy.take_event() {
            ctx.emit(GameEvent::EnemyKilled {
                kind: GameObjectId::PiranhaPlant,
                at: self.core.position(ctx.physics),
            });
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
        }
        self.core.interpolate(dt, ctx.physics);
        self.core.visual.sprite.frame = (ctx.tick() / 10 % 2) as u32;
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        if self.phase == PlantPhase::Hidden && self.player_nearby(ctx) {
            self.elapsed = 0.0;
        } else {
            self.elapsed += ctx.fixed_dt();
            if self.elapsed >= self.phase.duration() {
                self.elapsed = 0.0;
                self.phase = self.phase.next();
            }
        }
        if let Some(body) = self.core.body() {
            ctx.physics
                .set_next_kinematic_position(body, self.body_position());
        }
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for PiranhaPlant {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for PiranhaPlant {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for PiranhaPlant {
    fn on_contact(&mut self, contact: &Contact) {
        self.enemy.on_contact(contact);
    }
}
