//! Goomba, koopa and the shell a stomped koopa leaves behind.

use glam::Vec2;
use tracing::trace;

use brickrun_core::contact::Contact;
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{BodyHandle, FixtureFlags, FixtureHandle, GhostMode};
use brickrun_core::registry::{ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::{
    ENEMY_SIZE, KNOCK_OUT_SECS, OUT_OF_WORLD_Y, Placement, WalkerParams, enemy_hull, knock_out,
    release, walker_body,
};
use crate::enemy::{EnemyCore, EnemyEvent};
use crate::entity::{Ctx, EntityCore, groups};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const GOOMBA_SPEED: f32 = 2.0;
pub const KOOPA_SPEED: f32 = 2.0;
pub const SHELL_SPEED: f32 = 12.0;
/// How long a flattened goomba stays visible.
pub const SQUASH_SECS: f32 = 0.5;

static WALKER_PROPS: [PropertySpec; 1] = [PropertySpec::optional("facing", PropertyKind::Number)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    Walking,
    /// Flattened by a stomp, waiting to disappear.
    Squashed,
    /// Knocked out, falling through everything.
    Falling,
}

// ============================================================================
// Goomba
// ============================================================================

pub struct Goomba {
    params: WalkerParams,
    core: EntityCore,
    enemy: EnemyCore,
    state: WalkerState,
    timer: f32,
}

impl Goomba {
    pub fn new(params: WalkerParams) -> Self {
        Self {
            core: EntityCore::new("goomba", params.pos),
            enemy: EnemyCore::new(params.facing, GOOMBA_SPEED).ledge_aware(),
            state: WalkerState::Walking,
            timer: 0.0,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Goomba.tag(),
            name: GameObjectId::Goomba.name(),
            meta: ObjectMeta::placed().with_properties(&WALKER_PROPS),
            construct: |params| Ok(Box::new(Goomba::new(WalkerParams::from_params(params)?))),
            deserialize: |data| Ok(Box::new(Goomba::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }

    pub fn facing(&self) -> f32 {
        self.enemy.facing
    }

    fn squash(&mut self, ctx: &mut Ctx<'_>) {
        self.state = WalkerState::Squashed;
        self.timer = SQUASH_SECS;
        self.enemy.speed = 0.0;
        ctx.physics.set_ghost(self.core.id(), GhostMode::Phantom);
        self.core.set_velocity(ctx.physics, Vec2::ZERO);
        self.core.visual.sprite.frame = 2;
        ctx.emit(GameEvent::EnemyStomped {
            kind: GameObjectId::Goomba,
            at: self.core.position(ctx.physics),
        });
    }
}

impl GameObject<GameEvent> for Goomba {
    fn kind(&self) -> KindTag {
        GameObjectId::Goomba.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let tag = self.core.tag(GameObjectId::Goomba);
        let [left, right] = EnemyCore::probes(tag, ENEMY_SIZE / 2.0, groups::ENEMY);
        self.core.build(
            ctx.physics,
            &walker_body(self.params.pos),
            &[enemy_hull(tag), left, right],
        )?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        match self.state {
            WalkerState::Walking => match self.enemy.take_event() {
                Some(EnemyEvent::Stomp { .. }) => self.squash(ctx),
                Some(EnemyEvent::Pierced { .. }) => {
                    knock_out(&mut self.core, GameObjectId::Goomba, ctx);
                    self.state = WalkerState::Falling;
                    self.timer = KNOCK_OUT_SECS;
                },
                // the player handles its own damage
                Some(EnemyEvent::SideTouch { .. }) | None => {},
            },
            WalkerState::Squashed | WalkerState::Falling => {
                self.timer -= dt;
                if self.timer <= 0.0 {
                    ctx.remove(self.core.id(), RemoveCause::Gameplay);
                }
            },
        }
        if self.core.position(ctx.physics).y < OUT_OF_WORLD_Y {
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
        }

        self.core.interpolate(dt, ctx.physics);
        let sprite = &mut self.core.visual.sprite;
        if self.state == WalkerState::Walking {
            sprite.frame = (ctx.tick() / 15 % 2) as u32;
        }
        sprite.flip_x = self.state == WalkerState::Falling;
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        if self.state != WalkerState::Walking {
            return;
        }
        self.enemy.apply_turns();
        if let Some(body) = self.core.body() {
            self.enemy.walk(ctx.physics, body);
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

impl HasBody for Goomba {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Goomba {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for Goomba {
    fn on_contact(&mut self, contact: &Contact) {
        if self.state == WalkerState::Walking {
            self.enemy.on_contact(contact);
        }
    }
}

// ============================================================================
// Koopa
// ============================================================================

/// Walks off ledges. A stomp leaves a [`Shell`] in its place.
pub struct Koopa {
    params: WalkerParams,
    core: EntityCore,
    enemy: EnemyCore,
    state: WalkerState,
    timer: f32,
}

impl Koopa {
    pub fn new(params: WalkerParams) -> Self {
        Self {
            core: EntityCore::new("koopa", params.pos),
            enemy: EnemyCore::new(params.facing, KOOPA_SPEED),
            state: WalkerState::Walking,
            timer: 0.0,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Koopa.tag(),
            name: GameObjectId::Koopa.name(),
            meta: ObjectMeta::placed().with_properties(&WALKER_PROPS),
            construct: |params| Ok(Box::new(Koopa::new(WalkerParams::from_params(params)?))),
            deserialize: |data| Ok(Box::new(Koopa::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }
}

impl GameObject<GameEvent> for Koopa {
    fn kind(&self) -> KindTag {
        GameObjectId::Koopa.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let tag = self.core.tag(GameObjectId::Koopa);
        self.core
            .build(ctx.physics, &walker_body(self.params.pos), &[enemy_hull(tag)])?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        match self.state {
            WalkerState::Walking => match self.enemy.take_event() {
                Some(EnemyEvent::Stomp { .. }) => {
                    let at = self.core.position(ctx.physics);
                    ctx.spawn(Box::new(Shell::new(Placement { pos: at })));
                    ctx.remove(self.core.id(), RemoveCause::Gameplay);
                    ctx.emit(GameEvent::EnemyStomped {
                        kind: GameObjectId::Koopa,
                        at,
                    });
                    trace!(koopa = %self.core.id(), "retreated into shell");
                },
                Some(EnemyEvent::Pierced { .. }) => {
                    knock_out(&mut self.core, GameObjectId::Koopa, ctx);
                    self.state = WalkerState::Falling;
                    self.timer = KNOCK_OUT_SECS;
                },
                Some(EnemyEvent::SideTouch { .. }) | None => {},
            },
            WalkerState::Squashed | WalkerState::Falling => {
                self.timer -= dt;
                if self.timer <= 0.0 {
                    ctx.remove(self.core.id(), RemoveCause::Gameplay);
                }
            },
        }
        if self.core.position(ctx.physics).y < OUT_OF_WORLD_Y {
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
        }

        self.core.interpolate(dt, ctx.physics);
        let sprite = &mut self.core.visual.sprite;
        sprite.frame = (ctx.tick() / 15 % 2) as u32;
        sprite.flip_x = self.enemy.facing > 0.0;
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        if self.state != WalkerState::Walking {
            return;
        }
        self.enemy.apply_turns();
        if let Some(body) = self.core.body() {
            self.enemy.walk(ctx.physics, body);
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

impl HasBody for Koopa {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Koopa {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for Koopa {
    fn on_contact(&mut self, contact: &Contact) {
        if self.state == WalkerState::Walking {
            self.enemy.on_contact(contact);
        }
    }
}

// ============================================================================
// Shell
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Idle,
    Sliding,
    Falling,
}

/// Idle until kicked, then slides and knocks out every enemy it passes.
pub struct Shell {
    params: Placement,
    core: EntityCore,
    enemy: EnemyCore,
    hull: Option<FixtureHandle>,
    state: ShellState,
    timer: f32,
}

impl Shell {
    pub fn new(params: Placement) -> Self {
        Self {
            core: EntityCore::new("shell", params.pos),
            enemy: EnemyCore::new(1.0, 0.0),
            hull: None,
            state: ShellState::Idle,
            timer: 0.0,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Shell.tag(),
            name: GameObjectId::Shell.name(),
            meta: ObjectMeta::placed(),
            construct: |params| Ok(Box::new(Shell::new(Placement { pos: params.pos }))),
            deserialize: |data| Ok(Box::new(Shell::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn direction(&self) -> f32 {
        self.enemy.facing
    }

    fn hull_flags(&self) -> FixtureFlags {
        match self.state {
            ShellState::Sliding => FixtureFlags::ENEMY | FixtureFlags::PIERCING,
            _ => FixtureFlags::ENEMY,
        }
    }

    fn set_state(&mut self, state: ShellState, ctx: &mut Ctx<'_>) {
        self.state = state;
        if let Some(hull) = self.hull {
            let tag = self.core.tag(GameObjectId::Shell).with_flags(self.hull_flags());
            ctx.physics.retag(hull, tag);
        }
        self.enemy.reset_contacts();
    }

    fn kick(&mut self, direction: f32, ctx: &mut Ctx<'_>) {
        self.enemy.facing = if direction < 0.0 { -1.0 } else { 1.0 };
        self.enemy.speed = SHELL_SPEED;
        self.set_state(ShellState::Sliding, ctx);
    }

    fn stop(&mut self, ctx: &mut Ctx<'_>) {
        self.enemy.speed = 0.0;
        self.set_state(ShellState::Idle, ctx);
        self.core.set_velocity(ctx.physics, Vec2::ZERO);
    }

    fn react(&mut self, event: EnemyEvent, ctx: &mut Ctx<'_>) {
        let at = self.core.position(ctx.physics);
        match (self.state, event) {
            (_, EnemyEvent::Pierced { .. }) => {
                knock_out(&mut self.core, GameObjectId::Shell, ctx);
                self.state = ShellState::Falling;
                self.timer = KNOCK_OUT_SECS;
            },
            (ShellState::Sliding, EnemyEvent::Stomp { .. }) => {
                self.stop(ctx);
                ctx.emit(GameEvent::EnemyStomped {
                    kind: GameObjectId::Shell,
                    at,
                });
            },
            (ShellState::Idle, EnemyEvent::Stomp { by }) => {
                let from = ctx.position_of(by).map_or(0.0, |p| p.x);
                self.kick(at.x - from, ctx);
                ctx.emit(GameEvent::EnemyStomped {
                    kind: GameObjectId::Shell,
                    at,
                });
            },
            (ShellState::Idle, EnemyEvent::SideTouch { sign, .. }) => {
                self.kick(-f32::from(sign), ctx);
            },
            _ => {},
        }
    }
}

impl GameObject<GameEvent> for Shell {
    fn kind(&self) -> KindTag {
        GameObjectId::Shell.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let tag = self.core.tag(GameObjectId::Shell);
        let handles =
            self.core
                .build(ctx.physics, &walker_body(self.params.pos), &[enemy_hull(tag)])?;
        self.hull = handles.first().copied();
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        if self.state == ShellState::Falling {
            self.timer -= dt;
            if self.timer <= 0.0 {
                ctx.remove(self.core.id(), RemoveCause::Gameplay);
            }
        } else if let Some(event) = self.enemy.take_event() {
            self.react(event, ctx);
        }
        if self.core.position(ctx.physics).y < OUT_OF_WORLD_Y {
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
        }

        self.core.interpolate(dt, ctx.physics);
        self.core.visual.sprite.frame = match self.state {
            ShellState::Sliding => (ctx.tick() / 4 % 4) as u32,
            _ => 0,
        };
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        if self.state != ShellState::Sliding {
            return;
        }
        self.enemy.apply_turns();
        if let Some(body) = self.core.body() {
            self.enemy.walk(ctx.physics, body);
        }
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
        self.hull = None;
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for Shell {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Shell {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for Shell {
    fn on_contact(&mut self, contact: &Contact) {
        if self.state != ShellState::Falling {
            self.enemy.on_contact(contact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun_core::physics::FixtureTag;
    use brickrun_core::test_helpers::{presolve, tag, test_world};
    use brickrun_core::world::World;

    use crate::entity::roles;
    use crate::objects::terrain::{Ground, GroundParams};

    fn slab(world: &mut World<GameEvent>, from: f32, to: f32) {
        world
            .add_entity(Ground::new(GroundParams {
                vertices: vec![
                    Vec2::new(from, -1.0),
                    Vec2::new(to, -1.0),
                    Vec2::new(to, 0.0),
                    Vec2::new(from, 0.0),
                ],
            }))
            .unwrap();
    }

    fn player() -> FixtureTag {
        tag(99, GameObjectId::Player.tag()).with_role(roles::BODY)
    }

    fn hull_tag(id: ObjectId, kind: GameObjectId) -> FixtureTag {
        FixtureTag::new(id, kind.tag())
            .with_role(roles::BODY)
            .with_flags(FixtureFlags::ENEMY)
    }

    #[test]
    fn goomba_patrols_between_ledges() {
        let mut world = test_world::<GameEvent>();
        slab(&mut world, -3.0, 3.0);
        let id = world
            .add_entity(Goomba::new(WalkerParams {
                pos: Vec2::ZERO,
                facing: 1.0,
            }))
            .unwrap();
        for _ in 0..120 {
            world.fixed_update();
        }
        let goomba = world.get_as::<Goomba>(id).unwrap();
        assert_eq!(goomba.facing(), -1.0);
        let pos = world.physics().position(goomba.body().unwrap()).unwrap();
        assert!(pos.x.abs() < 3.0, "walked off at {pos}");
        assert!(pos.y > -0.2, "fell through at {pos}");
    }

    #[test]
    fn stomped_goomba_is_flattened_then_removed() {
        let mut world = test_world::<GameEvent>();
        slab(&mut world, -5.0, 5.0);
        let id = world
            .add_entity(Goomba::new(WalkerParams {
                pos: Vec2::ZERO,
                facing: -1.0,
            }))
            .unwrap();
        let mine = hull_tag(id, GameObjectId::Goomba);
        world
            .get_as_mut::<Goomba>(id)
            .unwrap()
            .on_contact(&presolve(mine, player(), Vec2::Y));
        world.update(1.0 / 60.0);

        assert_eq!(world.get_as::<Goomba>(id).unwrap().state(), WalkerState::Squashed);
        assert_eq!(world.physics().gate().mode(id), GhostMode::Phantom);
        let events = world.take_events();
        assert!(matches!(
            events.as_slice(),
            [GameEvent::EnemyStomped {
                kind: GameObjectId::Goomba,
                ..
            }]
        ));

        for _ in 0..40 {
            world.update(1.0 / 60.0);
        }
        assert!(!world.contains(id));
        // removal restores the gate entry
        assert_eq!(world.physics().gate().mode(id), GhostMode::Solid);
    }

    #[test]
    fn pierced_goomba_falls_through_the_floor() {
        let mut world = test_world::<GameEvent>();
        slab(&mut world, -5.0, 5.0);
        let id = world
            .add_entity(Goomba::new(WalkerParams {
                pos: Vec2::ZERO,
                facing: -1.0,
            }))
            .unwrap();
        let mine = hull_tag(id, GameObjectId::Goomba);
        let fireball = tag(77, GameObjectId::Fireball.tag()).with_flags(FixtureFlags::PIERCING);
        world
            .get_as_mut::<Goomba>(id)
            .unwrap()
            .on_contact(&presolve(mine, fireball, Vec2::X));
        world.update(1.0 / 60.0);
        assert_eq!(world.get_as::<Goomba>(id).unwrap().state(), WalkerState::Falling);
        assert!(world.take_events().iter().any(|e| matches!(
            e,
            GameEvent::EnemyKilled {
                kind: GameObjectId::Goomba,
                ..
            }
        )));

        for _ in 0..60 {
            world.fixed_update();
        }
        let body = world.get_as::<Goomba>(id).unwrap().body().unwrap();
        assert!(world.physics().position(body).unwrap().y < -0.5);
    }

    #[test]
    fn stomped_koopa_becomes_a_shell() {
        let mut world = test_world::<GameEvent>();
        slab(&mut world, -5.0, 5.0);
        let id = world
            .add_entity(Koopa::new(WalkerParams {
                pos: Vec2::new(1.0, 0.0),
                facing: -1.0,
            }))
            .unwrap();
        let mine = hull_tag(id, GameObjectId::Koopa);
        world
            .get_as_mut::<Koopa>(id)
            .unwrap()
            .on_contact(&presolve(mine, player(), Vec2::Y));
        world.update(1.0 / 60.0);

        assert!(!world.contains(id));
        assert_eq!(world.count_kind(GameObjectId::Koopa.tag()), 0);
        assert_eq!(world.count_kind(GameObjectId::Shell.tag()), 1);
        let shell = world
            .directory()
            .first_of_kind(GameObjectId::Shell.tag())
            .unwrap();
        assert_eq!(world.get_as::<Shell>(shell).unwrap().state(), ShellState::Idle);
    }

    #[test]
    fn side_touch_kicks_an_idle_shell_away() {
        let mut world = test_world::<GameEvent>();
        slab(&mut world, -20.0, 20.0);
        let id = world
            .add_entity(Shell::new(Placement { pos: Vec2::ZERO }))
            .unwrap();
        let mine = hull_tag(id, GameObjectId::Shell);
        // player on the left: the normal from the shell points left
        world
            .get_as_mut::<Shell>(id)
            .unwrap()
            .on_contact(&presolve(mine, player(), Vec2::NEG_X));
        world.update(1.0 / 60.0);

        let shell = world.get_as::<Shell>(id).unwrap();
        assert_eq!(shell.state(), ShellState::Sliding);
        assert_eq!(shell.direction(), 1.0);
        let hull = shell.hull.unwrap();
        let flags = world.physics().fixture_tag(hull).unwrap().flags;
        assert!(flags.contains(FixtureFlags::PIERCING));

        for _ in 0..10 {
            world.fixed_update();
        }
        let body = world.get_as::<Shell>(id).unwrap().body().unwrap();
        assert!(world.physics().linvel(body).unwrap().x > SHELL_SPEED * 0.9);
    }

    #[test]
    fn stomping_a_sliding_shell_stops_it() {
        let mut world = test_world::<GameEvent>();
        slab(&mut world, -20.0, 20.0);
        let id = world
            .add_entity(Shell::new(Placement { pos: Vec2::ZERO }))
            .unwrap();
        let mine = hull_tag(id, GameObjectId::Shell);
        world
            .get_as_mut::<Shell>(id)
            .unwrap()
            .on_contact(&presolve(mine, player(), Vec2::X));
        world.update(1.0 / 60.0);
        assert_eq!(world.get_as::<Shell>(id).unwrap().direction(), -1.0);
        world.take_events();

        world
            .get_as_mut::<Shell>(id)
            .unwrap()
            .on_contact(&presolve(mine, player(), Vec2::Y).at_step(30));
        world.update(1.0 / 60.0);
        assert_eq!(world.get_as::<Shell>(id).unwrap().state(), ShellState::Idle);
        assert_eq!(world.take_events().len(), 1);
    }
}
