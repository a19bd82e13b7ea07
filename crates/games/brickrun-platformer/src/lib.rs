//! Brickrun's side-scrolling platformer: the concrete game objects, their
//! registration table and the [`Level`] controller that plays them.

pub mod block;
pub mod camera;
pub mod config;
pub mod enemy;
pub mod entity;
pub mod events;
pub mod ids;
pub mod level;
pub mod objects;
pub mod powerups;
pub mod registry;
pub mod scoring;

pub use config::PlatformerConfig;
pub use events::{GameEvent, LevelEvent};
pub use ids::GameObjectId;
pub use level::{Level, LevelState};
pub use registry::default_registry;
