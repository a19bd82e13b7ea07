use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use brickrun_core::contact::{Contact, ContactLatch, ContactProbe, OneShot, Touch};
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{
    BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureFlags, FixtureHandle, FixtureTag, GhostMode,
    PhysicsWorld, Shape,
};
use brickrun_core::registry::{ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::choice;
use super::fireball::Fireball;
use crate::config::PlayerConfig;
use crate::entity::{Ctx, EntityCore, approach, ground_sensor_filter, groups, player_filter, roles};
use crate::events::GameEvent;
use crate::ids::GameObjectId;
use crate::powerups::{Effect, EffectSet, Power};

pub const SMALL_SIZE: Vec2 = Vec2::new(0.8, 0.9);
pub const BIG_SIZE: Vec2 = Vec2::new(0.8, 1.8);
const JUMP_BUFFER_SECS: f32 = 0.1;
/// Shell contacts are ignored this long after a kick.
const KICK_GRACE_SECS: f32 = 0.25;
const MAX_FIREBALLS: usize = 2;
/// A grounded player may only jump while not already moving up faster than this.
const JUMP_READY_VY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Harm {
    Hurt,
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    Alive,
    Dying,
    /// Touched the flag.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerParams {
    pub pos: Vec2,
    #[serde(default)]
    pub power: Power,
}

static PLAYER_PROPS: [PropertySpec; 1] = [PropertySpec::optional(
    "power",
    PropertyKind::Choice(&["small", "big", "fire"]),
)];

fn sprite_for(power: Power) -> &'static str {
    match power {
        Power::Small => "player_small",
        Power::Big => "player_big",
        Power::Fire => "player_fire",
    }
}

pub struct Player {
    params: PlayerParams,
    tuning: PlayerConfig,
    core: EntityCore,
    power: Power,
    phase: PlayerPhase,
    body_fixture: Option<FixtureHandle>,
    foot: ContactProbe,
    /// Most recent ground the foot started touching.
    ground: Option<ObjectId>,
    pipe_below: Option<ObjectId>,
    grounded: bool,
    facing: f32,
    jump_buffer: f32,
    jump_cut: bool,
    latch: ContactLatch,
    bounce: OneShot<()>,
    harm: OneShot<Harm>,
    flag: OneShot<ObjectId>,
    pickups: Vec<(ObjectId, GameObjectId)>,
    kick_grace: f32,
    effects: EffectSet,
    fireballs: Vec<ObjectId>,
    pipe_lock: bool,
    teleport: Option<Vec2>,
}

impl Player {
    pub fn new(params: PlayerParams) -> Self {
        Self {
            tuning: PlayerConfig::default(),
            core: EntityCore::new(sprite_for(params.power), params.pos),
            power: params.power,
            phase: PlayerPhase::Alive,
            body_fixture: None,
            foot: ContactProbe::empty(),
            ground: None,
            pipe_below: None,
            grounded: false,
            facing: 1.0,
            jump_buffer: 0.0,
            jump_cut: false,
            latch: ContactLatch::default(),
            bounce: OneShot::new(),
            harm: OneShot::new(),
            flag: OneShot::new(),
            pickups: Vec::new(),
            kick_grace: 0.0,
            effects: EffectSet::default(),
            fireballs: Vec::new(),
            pipe_lock: false,
            teleport: None,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Player.tag(),
            name: GameObjectId::Player.name(),
            meta: ObjectMeta::placed().with_max(1).with_properties(&PLAYER_PROPS),
            construct: |params| {
                let power = choice(params, "power")?.unwrap_or_default();
                Ok(Box::new(Player::new(PlayerParams {
                    pos: params.pos,
                    power,
                })))
            },
            deserialize: |data| Ok(Box::new(Player::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    pub fn params(&self) -> &PlayerParams {
        &self.params
    }

    pub fn set_tuning(&mut self, tuning: PlayerConfig) {
        self.tuning = tuning;
    }

    pub fn power(&self) -> Power {
        self.power
    }

    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn facing(&self) -> f32 {
        self.facing
    }

    pub fn has_effect(&self, effect: Effect) -> bool {
        self.effects.has(effect)
    }

    pub fn is_invulnerable(&self) -> bool {
        self.effects.has(Effect::Star) || self.effects.has(Effect::Invulnerable)
    }

    /// Move to `to` at the start of the next fixed tick.
    pub fn queue_teleport(&mut self, to: Vec2) {
        self.teleport = Some(to);
    }

    fn body_tag(&self) -> FixtureTag {
        let role = if self.power.is_big() {
            roles::BODY_BIG
        } else {
            roles::BODY
        };
        let flags = if self.effects.has(Effect::Star) {
            FixtureFlags::PIERCING
        } else {
            FixtureFlags::NONE
        };
        self.core
            .tag(GameObjectId::Player)
            .with_role(role)
            .with_flags(flags)
    }

    fn hull(&self) -> FixtureDef {
        let size = if self.power.is_big() {
            BIG_SIZE
        } else {
            SMALL_SIZE
        };
        FixtureDef::new(Shape::rect(size.x, size.y), self.body_tag())
            .with_offset(Vec2::new(0.0, size.y / 2.0))
            .with_filter(player_filter())
    }

    fn foot_sensor(&self) -> FixtureDef {
        FixtureDef::new(
            Shape::rect(SMALL_SIZE.x * 0.9, 0.1),
            self.core.tag(GameObjectId::Player).with_role(roles::FOOT),
        )
        .with_offset(Vec2::new(0.0, -0.02))
        .with_filter(ground_sensor_filter(groups::PLAYER))
        .sensor()
    }

    /// Swap the hull for one matching the current power.
    fn rebuild_hull(&mut self, physics: &mut PhysicsWorld) {
        let Some(body) = self.core.body() else {
            return;
        };
        if let Some(old) = self.body_fixture.take() {
            physics.queue_remove_fixture(old);
        }
        match physics.add_fixture(body, &self.hull()) {
            Ok(handle) => self.body_fixture = Some(handle),
            Err(e) => warn!(player = %self.core.id(), "failed to rebuild hull: {e}"),
        }
    }

    fn set_power(&mut self, power: Power, physics: &mut PhysicsWorld) {
        let resized = self.power.is_big() != power.is_big();
        self.power = power;
        if resized {
            self.rebuild_hull(physics);
        }
    }

    fn refresh_tag(&self, physics: &mut PhysicsWorld) {
        if let Some(fixture) = self.body_fixture {
            physics.retag(fixture, self.body_tag());
        }
    }

    fn foot_contact(&mut self, contact: &Contact, other: GameObjectId) {
        let owner = contact.other_owner();
        if contact.is_begin() {
            self.foot.begin(owner);
            self.ground = Some(owner);
            if other == GameObjectId::Pipe {
                self.pipe_below = Some(owner);
            }
        } else if contact.is_end() {
            self.foot.end(owner);
            if self.ground == Some(owner) {
                self.ground = None;
            }
            if self.pipe_below == Some(owner) {
                self.pipe_below = None;
            }
        }
    }

    fn enemy_contact(&mut self, contact: &Contact, other: GameObjectId) {
        // phantom or star: the enemy side decides what happens
        if !contact.enabled {
            return;
        }
        if other == GameObjectId::Shell && self.kick_grace > 0.0 {
            return;
        }
        let Some(touch) = contact.touch() else {
            return;
        };
        let owner = contact.other_owner();
        let new = self.latch.engage(owner, contact.step);
        let idle_shell =
            other == GameObjectId::Shell && !contact.other.flags.contains(FixtureFlags::PIERCING);

        match touch {
            Touch::Landed if other != GameObjectId::PiranhaPlant => {
                if new {
                    self.bounce.set(());
                    if idle_shell {
                        self.kick_grace = KICK_GRACE_SECS;
                    }
                }
            },
            _ if idle_shell => {
                if new {
                    self.kick_grace = KICK_GRACE_SECS;
                }
            },
            _ => {
                self.harm.offer(Harm::Hurt);
            },
        }
    }

    fn body_contact(&mut self, contact: &Contact, other: GameObjectId) {
        match other {
            GameObjectId::Lava if contact.is_begin() => self.harm.set(Harm::Kill),
            GameObjectId::Spikes if contact.is_presolve() => {
                if !self.effects.has(Effect::Star) {
                    self.harm.set(Harm::Kill);
                }
            },
            GameObjectId::FlagPole if contact.is_begin() => {
                self.flag.offer(contact.other_owner());
            },
            kind if kind.is_power_up() => {
                let owner = contact.other_owner();
                if contact.is_begin()
                    && contact.other.role == roles::PICKUP
                    && !self.pickups.iter().any(|(id, _)| *id == owner)
                {
                    self.pickups.push((owner, kind));
                }
            },
            kind if kind.is_enemy() && contact.is_presolve() => self.enemy_contact(contact, kind),
            _ => {},
        }
    }

    fn collect(&mut self, kind: GameObjectId, ctx: &mut Ctx<'_>) {
        match kind {
            GameObjectId::Mushroom => self.set_power(self.power.grow(), ctx.physics),
            GameObjectId::FireFlower => self.set_power(Power::Fire, ctx.physics),
            GameObjectId::Star => {
                self.effects.apply(Effect::Star);
                self.refresh_tag(ctx.physics);
            },
            _ => {},
        }
        ctx.emit(GameEvent::PowerUpCollected { kind });
    }

    fn hurt(&mut self, ctx: &mut Ctx<'_>) {
        if self.is_invulnerable() {
            return;
        }
        if !self.power.is_big() {
            self.die(ctx);
            return;
        }
        self.set_power(Power::Small, ctx.physics);
        self.effects.apply(Effect::Invulnerable);
        ctx.physics.set_ghost(self.core.id(), GhostMode::Phantom);
        ctx.emit(GameEvent::PlayerHurt);
    }

    fn die(&mut self, ctx: &mut Ctx<'_>) {
        if self.phase != PlayerPhase::Alive {
            return;
        }
        self.phase = PlayerPhase::Dying;
        self.effects.clear();
        ctx.physics.set_ghost(self.core.id(), GhostMode::Ghost);
        self.core
            .set_velocity(ctx.physics, Vec2::new(0.0, self.tuning.jump_velocity));
        debug!(player = %self.core.id(), "player died");
        ctx.emit(GameEvent::PlayerDied);
    }

    fn expire(&mut self, effect: Effect, ctx: &mut Ctx<'_>) {
        match effect {
            Effect::Star => self.refresh_tag(ctx.physics),
            Effect::Invulnerable => ctx.physics.set_ghost(self.core.id(), GhostMode::Solid),
        }
    }

    fn throw_fireball(&mut self, ctx: &mut Ctx<'_>) {
        self.fireballs.retain(|id| ctx.directory.contains(*id));
        if self.fireballs.len() >= MAX_FIREBALLS {
            return;
        }
        let at = self.core.position(ctx.physics) + Vec2::new(self.facing * 0.6, BIG_SIZE.y * 0.6);
        let id = ctx.spawn(Box::new(Fireball::thrown(at, self.facing)));
        self.fireballs.push(id);
        ctx.emit(GameEvent::FireballThrown);
    }

    fn check_pipe(&mut self, ctx: &mut Ctx<'_>) {
        if !ctx.input.hold("down") {
            self.pipe_lock = false;
            return;
        }
        if self.pipe_lock || !self.grounded {
            return;
        }
        if let Some(pipe) = self.pipe_below {
            self.pipe_lock = true;
            ctx.emit(GameEvent::PipeEntered {
                player: self.core.id(),
                pipe,
            });
        }
    }

    fn update_alive(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        for (_, kind) in std::mem::take(&mut self.pickups) {
            self.collect(kind, ctx);
        }
        match self.harm.take() {
            Some(Harm::Kill) => self.die(ctx),
            Some(Harm::Hurt) => self.hurt(ctx),
            None => {},
        }
        if self.phase != PlayerPhase::Alive {
            return;
        }
        if self.bounce.take().is_some() {
            self.core.set_vy(ctx.physics, self.tuning.stomp_bounce);
        }
        if let Some(pole) = self.flag.take() {
            let y = self.core.position(ctx.physics).y;
            self.phase = PlayerPhase::Finished;
            self.core.set_velocity(ctx.physics, Vec2::ZERO);
            ctx.emit(GameEvent::FlagReached { pole, y });
            ctx.pause();
            return;
        }
        for effect in self.effects.tick(dt) {
            self.expire(effect, ctx);
        }

        self.kick_grace = (self.kick_grace - dt).max(0.0);
        self.jump_buffer = (self.jump_buffer - dt).max(0.0);
        if ctx.input.click("jump") {
            self.jump_buffer = JUMP_BUFFER_SECS;
        }
        if ctx.input.click("fire") && self.power == Power::Fire {
            self.throw_fireball(ctx);
        }
        self.check_pipe(ctx);

        if self.core.position(ctx.physics).y < self.tuning.fall_death_y {
            self.die(ctx);
        }
    }

    /// Velocity of the moving platform underfoot, if any.
    fn carried_velocity(&self, ctx: &Ctx<'_>) -> Vec2 {
        self.ground
            .filter(|g| ctx.directory.kind_of(*g) == Some(GameObjectId::MovingPlatform.tag()))
            .and_then(|g| ctx.directory.body_of(g))
            .and_then(|b| ctx.physics.linvel(b))
            .unwrap_or(Vec2::ZERO)
    }

    fn refresh_sprite(&mut self, physics: &PhysicsWorld) {
        let v = self.core.velocity(physics);
        let sprite = &mut self.core.visual.sprite;
        sprite.name = sprite_for(self.power);
        sprite.flip_x = self.facing < 0.0;
        sprite.frame = match self.phase {
            PlayerPhase::Dying => 3,
            _ if !self.grounded => 2,
            _ if v.x.abs() > 0.1 => 1,
            _ => 0,
        };
    }
}

impl GameObject<GameEvent> for Player {
    fn kind(&self) -> KindTag {
        GameObjectId::Player.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let def = BodyDef::new(BodyKind::Dynamic, self.params.pos).with_fixed_rotation(true);
        let fixtures = [self.hull(), self.foot_sensor()];
        let handles = self.core.build(ctx.physics, &def, &fixtures)?;
        self.body_fixture = handles.first().copied();
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        if self.phase == PlayerPhase::Alive {
            self.update_alive(dt, ctx);
        }
        self.core.interpolate(dt, ctx.physics);
        self.refresh_sprite(ctx.physics);
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(to) = self.teleport.take() {
            self.core.teleport(ctx.physics, to);
            self.foot.clear();
            self.ground = None;
            self.pipe_below = None;
            self.grounded = false;
        }

        let grounded = self.foot.is_touching();
        if grounded && !self.grounded && self.phase == PlayerPhase::Alive {
            ctx.emit(GameEvent::PlayerLanded);
        }
        self.grounded = grounded;
        if self.phase != PlayerPhase::Alive {
            return;
        }
        let Some(body) = self.core.body() else {
            return;
        };

        let dt = ctx.fixed_dt();
        let v = self.core.velocity(ctx.physics);
        let axis = ctx.input.axis_x();
        if axis != 0.0 {
            self.facing = axis.signum();
        }
        let top_speed = if ctx.input.hold("run") {
            self.tuning.run_speed
        } else {
            self.tuning.walk_speed
        };
        let carry = self.carried_velocity(ctx);
        let vx = approach(v.x - carry.x, axis * top_speed, self.tuning.acceleration * dt) + carry.x;

        let mut vy = v.y;
        if self.jump_buffer > 0.0 && self.grounded && vy <= JUMP_READY_VY {
            vy = self.tuning.jump_velocity;
            self.jump_buffer = 0.0;
            self.jump_cut = true;
        } else if self.jump_cut && !ctx.input.hold("jump") && vy > 0.0 {
            vy *= 0.5;
            self.jump_cut = false;
        }
        if vy <= 0.0 {
            self.jump_cut = false;
        }
        ctx.physics.set_linvel(body, Vec2::new(vx, vy));
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        super::release(&mut self.core, ctx);
        self.body_fixture = None;
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for Player {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Player {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for Player {
    fn on_contact(&mut self, contact: &Contact) {
        if self.phase != PlayerPhase::Alive {
            return;
        }
        let Some(other) = GameObjectId::from_tag(contact.other.kind) else {
            return;
        };
        match contact.mine.role {
            roles::FOOT => self.foot_contact(contact, other),
            role if roles::is_body(role) => self.body_contact(contact, other),
            _ => {},
        }
    }
}
