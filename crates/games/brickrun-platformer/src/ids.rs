use brickrun_core::object::KindTag;

/// Every concrete object kind of the game. The discriminant is the
/// [`KindTag`] stored in fixture user data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum GameObjectId {
    Player = 1,
    Goomba,
    Koopa,
    Shell,
    PiranhaPlant,
    Coin,
    Mushroom,
    OneUp,
    FireFlower,
    Star,
    QuestionBlock,
    BrickBlock,
    Ground,
    Platform,
    MovingPlatform,
    Pipe,
    Spikes,
    Lava,
    FlagPole,
    Fireball,
}

impl GameObjectId {
    pub const ALL: [GameObjectId; 20] = [
        GameObjectId::Player,
        GameObjectId::Goomba,
        GameObjectId::Koopa,
        GameObjectId::Shell,
        GameObjectId::PiranhaPlant,
        GameObjectId::Coin,
        GameObjectId::Mushroom,
        GameObjectId::OneUp,
        GameObjectId::FireFlower,
        GameObjectId::Star,
        GameObjectId::QuestionBlock,
        GameObjectId::BrickBlock,
        GameObjectId::Ground,
        GameObjectId::Platform,
        GameObjectId::MovingPlatform,
        GameObjectId::Pipe,
        GameObjectId::Spikes,
        GameObjectId::Lava,
        GameObjectId::FlagPole,
        GameObjectId::Fireball,
    ];

    pub const fn tag(self) -> KindTag {
        KindTag(self as u16)
    }

    pub fn from_tag(tag: KindTag) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.tag() == tag)
    }

    /// Name used as the `type` of serialized records.
    pub const fn name(self) -> &'static str {
        match self {
            GameObjectId::Player => "player",
            GameObjectId::Goomba => "goomba",
            GameObjectId::Koopa => "koopa",
            GameObjectId::Shell => "shell",
            GameObjectId::PiranhaPlant => "piranha_plant",
            GameObjectId::Coin => "coin",
            GameObjectId::Mushroom => "mushroom",
            GameObjectId::OneUp => "one_up",
            GameObjectId::FireFlower => "fire_flower",
            GameObjectId::Star => "star",
            GameObjectId::QuestionBlock => "question_block",
            GameObjectId::BrickBlock => "brick_block",
            GameObjectId::Ground => "ground",
            GameObjectId::Platform => "platform",
            GameObjectId::MovingPlatform => "moving_platform",
            GameObjectId::Pipe => "pipe",
            GameObjectId::Spikes => "spikes",
            GameObjectId::Lava => "lava",
            GameObjectId::FlagPole => "flag_pole",
            GameObjectId::Fireball => "fireball",
        }
    }

    /// Walkers and the plant: things the player can be hurt by.
    pub fn is_enemy(self) -> bool {
        matches!(
            self,
            GameObjectId::Goomba
                | GameObjectId::Koopa
                | GameObjectId::Shell
                | GameObjectId::PiranhaPlant
        )
    }

    /// Items the player collects through its pickup sensor.
    pub fn is_power_up(self) -> bool {
        matches!(
            self,
            GameObjectId::Mushroom | GameObjectId::OneUp | GameObjectId::FireFlower | GameObjectId::Star
        )
    }
}

impl PartialEq<GameObjectId> for KindTag {
    fn eq(&self, other: &GameObjectId) -> bool {
        *self == other.tag()
    }
}
