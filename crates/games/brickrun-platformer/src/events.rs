use glam::Vec2;

use brickrun_core::object::ObjectId;

use crate::ids::GameObjectId;

/// Gameplay facts emitted by objects into the world outbox and consumed by
/// the [`Level`](crate::level::Level) after each pass.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    CoinCollected { at: Vec2 },
    PowerUpCollected { kind: GameObjectId },
    /// Defeated by a stomp; scored with the running combo.
    EnemyStomped { kind: GameObjectId, at: Vec2 },
    /// Defeated by a shell, fireball or star.
    EnemyKilled { kind: GameObjectId, at: Vec2 },
    BlockBumped { at: Vec2 },
    BrickBroken { at: Vec2 },
    PlayerLanded,
    PlayerHurt,
    PlayerDied,
    FireballThrown,
    PipeEntered { player: ObjectId, pipe: ObjectId },
    FlagReached { pole: ObjectId, y: f32 },
    FlagLowered,
}

/// What the level reports to its host.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelEvent {
    ScoreChanged { score: u32 },
    CoinsChanged { coins: u32 },
    LivesChanged { lives: u32 },
    Teleported { to: Vec2 },
    Restarted,
    Completed { score: u32 },
    GameOver { score: u32 },
}
