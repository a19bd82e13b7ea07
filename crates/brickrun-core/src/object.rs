use std::any::Any;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::contact::Contact;
use crate::error::CreateError;
use crate::physics::BodyHandle;
use crate::world::WorldCtx;

/// Identity of a live object, unique within one `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Numeric image of a game's object-type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KindTag(pub u16);

/// Sprite selection handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteState {
    pub name: &'static str,
    pub frame: u32,
    pub flip_x: bool,
}

impl SpriteState {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            frame: 0,
            flip_x: false,
        }
    }
}

/// Everything the renderer needs to draw one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visual {
    pub position: Vec2,
    pub angle: f32,
    /// Extra displacement applied after interpolation (block bump, squash).
    pub offset: Vec2,
    pub sprite: SpriteState,
    pub visible: bool,
}

impl Visual {
    pub fn new(sprite: &'static str) -> Self {
        Self {
            position: Vec2::ZERO,
            angle: 0.0,
            offset: Vec2::ZERO,
            sprite: SpriteState::new(sprite),
            visible: true,
        }
    }
}

/// Why an object is leaving the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveCause {
    /// Killed, collected, broken.
    Gameplay,
    /// Level cleared or reloaded.
    Unload,
    /// Deleted in the level editor.
    Editor,
}

/// Objects that own exactly one rigid body, present between `create` and `remove`.
pub trait HasBody {
    fn body(&self) -> Option<BodyHandle>;
}

/// Objects the renderer draws.
pub trait HasSprite {
    fn visual(&self) -> Visual;
}

/// Objects that receive contacts during dispatch.
///
/// Receives only the contact: record what happened (usually into a
/// [`OneShot`](crate::contact::OneShot)) and act on it in `update`.
pub trait ContactReactive {
    fn on_contact(&mut self, contact: &Contact);
}

/// A live member of a `World`, generic over the world's game event type.
///
/// Lifecycle: `create` exactly once when added, then any number of
/// `update`/`fixed_update` calls, then `remove` exactly once.
pub trait GameObject<E>: Any {
    fn kind(&self) -> KindTag;

    /// Build physics state. `id` is the identity the world assigned.
    fn create(&mut self, id: ObjectId, ctx: &mut WorldCtx<'_, E>) -> Result<(), CreateError>;

    /// Once per render frame.
    fn update(&mut self, _dt: f32, _ctx: &mut WorldCtx<'_, E>) {}

    /// Once per render frame instead of `update` while the world is paused.
    fn paused_update(&mut self, _dt: f32, _ctx: &mut WorldCtx<'_, E>) {}

    /// Once per fixed tick, after contacts were dispatched.
    fn fixed_update(&mut self, _ctx: &mut WorldCtx<'_, E>) {}

    /// Release physics state. Body destruction must go through the queue.
    fn remove(&mut self, ctx: &mut WorldCtx<'_, E>, cause: RemoveCause);

    /// Construction parameters for the level file.
    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn as_body(&self) -> Option<&dyn HasBody> {
        None
    }

    fn as_sprite(&self) -> Option<&dyn HasSprite> {
        None
    }

    fn as_contact_reactive(&mut self) -> Option<&mut dyn ContactReactive> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Generates the `as_any`/`as_any_mut` pair plus capability accessors for the
/// listed capabilities (`body`, `sprite`, `contact`).
#[macro_export]
macro_rules! game_object_boilerplate {
    (@cap body) => {
        fn as_body(&self) -> Option<&dyn $crate::object::HasBody> {
            Some(self)
        }
    };
    (@cap sprite) => {
        fn as_sprite(&self) -> Option<&dyn $crate::object::HasSprite> {
            Some(self)
        }
    };
    (@cap contact) => {
        fn as_contact_reactive(&mut self) -> Option<&mut dyn $crate::object::ContactReactive> {
            Some(self)
        }
    };
    ($($cap:ident),* $(,)?) => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }

        $($crate::game_object_boilerplate!(@cap $cap);)*
    };
}
