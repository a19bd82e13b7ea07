use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use brickrun_core::contact::{Contact, OneShot};
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, Shape};
use brickrun_core::registry::{ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::release;
use crate::entity::{Ctx, EntityCore, roles, trigger_filter};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const POLE_WIDTH: f32 = 0.2;
/// Flag descent speed once the pole was grabbed, in units per second.
pub const LOWER_SPEED: f32 = 4.0;
/// Where the flag stops, above the pole base.
const FLAG_REST: f32 = 0.5;

static FLAG_PROPS: [PropertySpec; 1] = [PropertySpec::optional("height", PropertyKind::Number)];

fn default_pole_height() -> f32 {
    8.0
}

/// `pos` is the base of the pole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagPoleParams {
    pub pos: Vec2,
    #[serde(default = "default_pole_height")]
    pub height: f32,
}

/// End of the level. Once grabbed, the flag slides down while the world is paused.
pub struct FlagPole {
    params: FlagPoleParams,
    core: EntityCore,
    reached: OneShot<()>,
    lowering: bool,
    lowered: bool,
    /// Flag height above the base.
    flag: f32,
}

impl FlagPole {
    pub fn new(params: FlagPoleParams) -> Self {
        let mut core = EntityCore::new("flag_pole", params.pos);
        core.visual.offset = Vec2::new(0.0, params.height);
        Self {
            core,
            reached: OneShot::new(),
            lowering: false,
            lowered: false,
            flag: params.height,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::FlagPole.tag(),
            name: GameObjectId::FlagPole.name(),
            meta: ObjectMeta::placed().with_max(1).with_properties(&FLAG_PROPS),
            construct: |params| {
                let height = params.number("height")?.unwrap_or_else(default_pole_height);
                if height <= FLAG_REST {
                    return Err(CreateError::InvalidProperty {
                        name: "height".to_string(),
                        reason: format!("must exceed {FLAG_REST}"),
                    });
                }
                Ok(Box::new(FlagPole::new(FlagPoleParams {
                    pos: params.pos,
                    height,
                })))
            },
            deserialize: |data| Ok(Box::new(FlagPole::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    /// Grab height as a fraction of the pole, 0 at the base and 1 at the top.
    pub fn height_fraction(&self, y: f32) -> f32 {
        ((y - self.params.pos.y) / self.params.height).clamp(0.0, 1.0)
    }

    pub fn flag_height(&self) -> f32 {
        self.flag
    }

    pub fn is_lowered(&self) -> bool {
        self.lowered
    }
}

impl GameObject<GameEvent> for FlagPole {
    fn kind(&self) -> KindTag {
        GameObjectId::FlagPole.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let sensor = FixtureDef::new(
            Shape::rect(POLE_WIDTH, self.params.height),
            self.core.tag(GameObjectId::FlagPole),
        )
        .with_offset(Vec2::new(0.0, self.params.height / 2.0))
        .with_filter(trigger_filter())
        .sensor();
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[sensor],
        )?;
        Ok(())
    }

    fn update(&mut self, _dt: f32, _ctx: &mut Ctx<'_>) {
        if self.reached.take().is_some() {
            self.lowering = true;
        }
    }

    fn paused_update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        if self.reached.take().is_some() {
            self.lowering = true;
        }
        if !self.lowering || self.lowered {
            return;
        }
        self.flag = (self.flag - LOWER_SPEED * dt).max(FLAG_REST);
        self.core.visual.offset = Vec2::new(0.0, self.flag);
        if self.flag <= FLAG_REST {
            self.lowered = true;
            debug!(pole = %self.core.id(), "flag lowered");
            ctx.emit(GameEvent::FlagLowered);
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

impl HasBody for FlagPole {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for FlagPole {
    /// `offset.y` carries the flag's height above the base.
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for FlagPole {
    fn on_contact(&mut self, contact: &Contact) {
        if contact.is_begin()
            && contact.other.kind == GameObjectId::Player
            && roles::is_body(contact.other.role)
        {
            self.reached.offer(());
        }
    }
}
