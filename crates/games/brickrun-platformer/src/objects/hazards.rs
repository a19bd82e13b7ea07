//! Spikes and lava. Both are passive: the player decides what touching them means.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureFlags, Shape};
use brickrun_core::registry::{CommonParams, ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::{drag_rect, release};
use crate::entity::{Ctx, EntityCore, trigger_filter};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const SPIKE_HEIGHT: f32 = 0.5;

static SPIKE_PROPS: [PropertySpec; 1] = [PropertySpec::optional("width", PropertyKind::Number)];

fn default_spike_width() -> f32 {
    1.0
}

/// A row of spikes. `pos` is the center of the base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikesParams {
    pub pos: Vec2,
    #[serde(default = "default_spike_width")]
    pub width: f32,
}

pub struct Spikes {
    params: SpikesParams,
    core: EntityCore,
}

impl Spikes {
    pub fn new(params: SpikesParams) -> Self {
        Self {
            core: EntityCore::new("spikes", params.pos),
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Spikes.tag(),
            name: GameObjectId::Spikes.name(),
            meta: ObjectMeta::placed().with_properties(&SPIKE_PROPS),
            construct: |params| {
                let width = params.number("width")?.unwrap_or_else(default_spike_width);
                if width <= 0.0 {
                    return Err(CreateError::InvalidProperty {
                        name: "width".to_string(),
                        reason: "must be positive".to_string(),
                    });
                }
                Ok(Box::new(Spikes::new(SpikesParams {
                    pos: params.pos,
                    width,
                })))
            },
            deserialize: |data| Ok(Box::new(Spikes::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }
}

impl GameObject<GameEvent> for Spikes {
    fn kind(&self) -> KindTag {
        GameObjectId::Spikes.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        // solid so the player gets pre-solve contacts, but never pushed
        let fixture = FixtureDef::new(
            Shape::rect(self.params.width, SPIKE_HEIGHT),
            self.core
                .tag(GameObjectId::Spikes)
                .with_flags(FixtureFlags::NO_RESPONSE),
        )
        .with_offset(Vec2::new(0.0, SPIKE_HEIGHT / 2.0))
        .with_filter(trigger_filter());
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[fixture],
        )?;
        Ok(())
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite);
}

impl HasBody for Spikes {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Spikes {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

/// A lava pool. `pos` is the center of the rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LavaParams {
    pub pos: Vec2,
    pub size: Vec2,
}

pub struct Lava {
    params: LavaParams,
    core: EntityCore,
}

impl Lava {
    pub fn new(params: LavaParams) -> Self {
        Self {
            core: EntityCore::new("lava", params.pos),
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Lava.tag(),
            name: GameObjectId::Lava.name(),
            meta: ObjectMeta::dragged(),
            construct: |params| {
                let size = params.drag()?.abs();
                if size.x <= f32::EPSILON || size.y <= f32::EPSILON {
                    return Err(CreateError::ZeroLengthDrag);
                }
                Ok(Box::new(Lava::new(LavaParams {
                    pos: (params.drag_start + params.drag_end) / 2.0,
                    size,
                })))
            },
            deserialize: |data| Ok(Box::new(Lava::new(serde_json::from_value(data.clone())?))),
            drag_preview: Some(|params: &CommonParams| drag_rect(params)),
        }
    }
}

impl GameObject<GameEvent> for Lava {
    fn kind(&self) -> KindTag {
        GameObjectId::Lava.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let fixture = FixtureDef::new(
            Shape::rect(self.params.size.x, self.params.size.y),
            self.core.tag(GameObjectId::Lava),
        )
        .with_filter(trigger_filter())
        .sensor();
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[fixture],
        )?;
        Ok(())
    }

    fn update(&mut self, _dt: f32, ctx: &mut Ctx<'_>) {
        self.core.visual.sprite.frame = (ctx.tick() / 20 % 3) as u32;
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite);
}

impl HasBody for Lava {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Lava {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun_core::test_helpers::test_world;
    use brickrun_core::world::World;

    use crate::objects::player::{Player, PlayerParams, PlayerPhase};
    use crate::objects::terrain::{Ground, GroundParams};
    use crate::powerups::Power;

    fn floor(world: &mut World<GameEvent>) {
        world
            .add_entity(Ground::new(GroundParams {
                vertices: vec![
                    Vec2::new(-10.0, -1.0),
                    Vec2::new(10.0, -1.0),
                    Vec2::new(10.0, 0.0),
                    Vec2::new(-10.0, 0.0),
                ],
            }))
            .unwrap();
    }

    fn settle(world: &mut World<GameEvent>, player: ObjectId) -> PlayerPhase {
        for _ in 0..30 {
            world.fixed_update();
            world.update(1.0 / 60.0);
        }
        world.get_as::<Player>(player).unwrap().phase()
    }

    #[test]
    fn landing_on_spikes_kills() {
        let mut world = test_world::<GameEvent>();
        floor(&mut world);
        world
            .add_entity(Spikes::new(SpikesParams {
                pos: Vec2::ZERO,
                width: 2.0,
            }))
            .unwrap();
        let player = world
            .add_entity(Player::new(PlayerParams {
                pos: Vec2::new(0.0, 1.5),
                power: Power::Big,
            }))
            .unwrap();
        assert_eq!(settle(&mut world, player), PlayerPhase::Dying);
        assert!(world.take_events().contains(&GameEvent::PlayerDied));
    }

    #[test]
    fn walking_into_lava_kills() {
        let mut world = test_world::<GameEvent>();
        floor(&mut world);
        world
            .add_entity(Lava::new(LavaParams {
                pos: Vec2::new(0.0, 0.5),
                size: Vec2::new(2.0, 1.0),
            }))
            .unwrap();
        let player = world
            .add_entity(Player::new(PlayerParams {
                pos: Vec2::ZERO,
                power: Power::Small,
            }))
            .unwrap();
        assert_eq!(settle(&mut world, player), PlayerPhase::Dying);
    }

    #[test]
    fn lava_needs_an_area() {
        let flat = CommonParams::dragged(Vec2::ZERO, Vec2::new(3.0, 0.0));
        assert!(matches!(
            (Lava::vtable().construct)(&flat),
            Err(CreateError::ZeroLengthDrag)
        ));
    }
}
