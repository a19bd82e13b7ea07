//! The game's registration table: one entry per [`GameObjectId`], in editor
//! palette order.

use brickrun_core::registry::ObjectRegistry;

use crate::events::GameEvent;
use crate::objects::blocks::{BrickBlock, QuestionBlock};
use crate::objects::fireball::Fireball;
use crate::objects::flag::FlagPole;
use crate::objects::hazards::{Lava, Spikes};
use crate::objects::items::{Coin, PowerItem};
use crate::objects::piranha::PiranhaPlant;
use crate::objects::player::Player;
use crate::objects::terrain::{Ground, MovingPlatform, Pipe, Platform};
use crate::objects::walkers::{Goomba, Koopa, Shell};

pub type Registry = ObjectRegistry<GameEvent>;

pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Player::vtable());

    registry.register(Goomba::vtable());
    registry.register(Koopa::vtable());
    registry.register(Shell::vtable());
    registry.register(PiranhaPlant::vtable());

    registry.register(Coin::vtable());
    registry.register(PowerItem::mushroom_vtable());
    registry.register(PowerItem::one_up_vtable());
    registry.register(PowerItem::fire_flower_vtable());
    registry.register(PowerItem::star_vtable());

    registry.register(QuestionBlock::vtable());
    registry.register(BrickBlock::vtable());

    registry.register(Ground::vtable());
    registry.register(Platform::vtable());
    registry.register(MovingPlatform::vtable());
    registry.register(Pipe::vtable());

    registry.register(Spikes::vtable());
    registry.register(Lava::vtable());
    registry.register(FlagPole::vtable());
    registry.register(Fireball::vtable());
    registry
}
