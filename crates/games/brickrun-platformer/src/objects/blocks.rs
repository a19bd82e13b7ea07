use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use brickrun_core::contact::Contact;
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureFlags, Shape};
use brickrun_core::registry::{CommonParams, ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::items::PowerItem;
use super::{choice, release};
use crate::block::{BLOCK_SIZE, BlockCore, BlockHit, BlockItem};
use crate::entity::{Ctx, EntityCore, geometry_filter, roles};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

/// Released items appear just above the block's top edge.
const ITEM_SPAWN_OFFSET: f32 = BLOCK_SIZE / 2.0 + 0.01;

static BLOCK_PROPS: [PropertySpec; 1] = [PropertySpec::optional(
    "item",
    PropertyKind::Choice(&["coin", "mushroom", "one_up", "star"]),
)];

/// `pos` is the block center. `item: None` means nothing inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockParams {
    pub pos: Vec2,
    pub item: Option<BlockItem>,
}

fn question_default() -> Option<BlockItem> {
    Some(BlockItem::Coin)
}

#[derive(Serialize, Deserialize)]
struct QuestionRecord {
    pos: Vec2,
    #[serde(default = "question_default")]
    item: Option<BlockItem>,
}

#[derive(Serialize, Deserialize)]
struct BrickRecord {
    pos: Vec2,
    #[serde(default)]
    item: Option<BlockItem>,
}

fn block_fixture(core: &EntityCore, kind: GameObjectId) -> FixtureDef {
    FixtureDef::new(
        Shape::rect(BLOCK_SIZE, BLOCK_SIZE),
        core.tag(kind)
            .with_role(roles::BODY)
            .with_flags(FixtureFlags::TERRAIN),
    )
    .with_filter(geometry_filter())
}

/// Hand out the block's item: coins are scored on the spot, everything else
/// spawns on top of the block.
fn release_item(item: BlockItem, hit: BlockHit, pos: Vec2, ctx: &mut Ctx<'_>) {
    match item.spawn_kind(hit.big) {
        None => ctx.emit(GameEvent::CoinCollected {
            at: pos + Vec2::new(0.0, BLOCK_SIZE),
        }),
        Some(kind) => {
            let at = pos + Vec2::new(0.0, ITEM_SPAWN_OFFSET);
            ctx.spawn(Box::new(PowerItem::emerging(kind, at)));
            debug!(?kind, %at, "block released item");
        },
    }
}

// ============================================================================
// Question block
// ============================================================================

pub struct QuestionBlock {
    params: BlockParams,
    core: EntityCore,
    block: BlockCore,
    used: bool,
}

impl QuestionBlock {
    pub fn new(params: BlockParams) -> Self {
        Self {
            core: EntityCore::new("question_block", params.pos),
            block: BlockCore::default(),
            used: false,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::QuestionBlock.tag(),
            name: GameObjectId::QuestionBlock.name(),
            meta: ObjectMeta::placed().with_properties(&BLOCK_PROPS),
            construct: |params: &CommonParams| {
                let item = match params.properties.get("item") {
                    None => question_default(),
                    Some(_) => choice(params, "item")?,
                };
                Ok(Box::new(QuestionBlock::new(BlockParams {
                    pos: params.pos,
                    item,
                })))
            },
            deserialize: |data| {
                let record: QuestionRecord = serde_json::from_value(data.clone())?;
                Ok(Box::new(QuestionBlock::new(BlockParams {
                    pos: record.pos,
                    item: record.item,
                })))
            },
            drag_preview: None,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used
    }
}

impl GameObject<GameEvent> for QuestionBlock {
    fn kind(&self) -> KindTag {
        GameObjectId::QuestionBlock.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let fixture = block_fixture(&self.core, GameObjectId::QuestionBlock);
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[fixture],
        )?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        if let Some(hit) = self.block.take_hit()
            && !self.used
            && let Some(item) = self.params.item
        {
            release_item(item, hit, self.params.pos, ctx);
            self.used = true;
            self.block.start_bump();
            self.core.visual.sprite.name = "block_empty";
            ctx.emit(GameEvent::BlockBumped {
                at: self.params.pos,
            });
        }
        self.core.visual.offset = self.block.tick(dt);
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(QuestionRecord {
            pos: self.params.pos,
            item: self.params.item,
        })
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for QuestionBlock {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for QuestionBlock {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for QuestionBlock {
    fn on_contact(&mut self, contact: &Contact) {
        self.block.on_contact(contact);
    }
}

// ============================================================================
// Brick block
// ============================================================================

/// Breaks under a big player unless it holds an item.
pub struct BrickBlock {
    params: BlockParams,
    core: EntityCore,
    block: BlockCore,
    used: bool,
}

impl BrickBlock {
    pub fn new(params: BlockParams) -> Self {
        Self {
            core: EntityCore::new("brick_block", params.pos),
            block: BlockCore::default(),
            used: false,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::BrickBlock.tag(),
            name: GameObjectId::BrickBlock.name(),
            meta: ObjectMeta::placed().with_properties(&BLOCK_PROPS),
            construct: |params| {
                Ok(Box::new(BrickBlock::new(BlockParams {
                    pos: params.pos,
                    item: choice(params, "item")?,
                })))
            },
            deserialize: |data| {
                let record: BrickRecord = serde_json::from_value(data.clone())?;
                Ok(Box::new(BrickBlock::new(BlockParams {
                    pos: record.pos,
                    item: record.item,
                })))
            },
            drag_preview: None,
        }
    }

    fn react(&mut self, hit: BlockHit, ctx: &mut Ctx<'_>) {
        if self.used {
            return;
        }
        let at = self.params.pos;
        if let Some(item) = self.params.item {
            release_item(item, hit, at, ctx);
            self.used = true;
            self.core.visual.sprite.name = "block_empty";
        } else if hit.big {
            ctx.emit(GameEvent::BrickBroken { at });
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
            return;
        }
        self.block.start_bump();
        ctx.emit(GameEvent::BlockBumped { at });
    }
}

impl GameObject<GameEvent> for BrickBlock {
    fn kind(&self) -> KindTag {
        GameObjectId::BrickBlock.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let fixture = block_fixture(&self.core, GameObjectId::BrickBlock);
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[fixture],
        )?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        if let Some(hit) = self.block.take_hit() {
            self.react(hit, ctx);
        }
        self.core.visual.offset = self.block.tick(dt);
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(BrickRecord {
            pos: self.params.pos,
            item: self.params.item,
        })
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for BrickBlock {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for BrickBlock {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for BrickBlock {
    fn on_contact(&mut self, contact: &Contact) {
        self.block.on_contact(contact);
    }
}
