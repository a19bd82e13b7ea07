//! Coins and the power-ups blocks release.

use glam::Vec2;

use brickrun_core::contact::{Contact, OneShot, Touch};
use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{
    ContactReactive, GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual,
};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, Shape};
use brickrun_core::registry::{ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::{OUT_OF_WORLD_Y, Placement, WalkerParams, release, walker_body};
use crate::enemy::EnemyCore;
use crate::entity::{Ctx, EntityCore, ground_sensor_filter, groups, pickup_filter, roles};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const COIN_RADIUS: f32 = 0.35;
pub const ITEM_SIZE: f32 = 0.8;
pub const STAR_BOUNCE_VY: f32 = 10.0;

fn touched_by_player(contact: &Contact) -> bool {
    contact.is_begin()
        && contact.mine.role == roles::PICKUP
        && contact.other.kind == GameObjectId::Player
        && roles::is_body(contact.other.role)
}

// ============================================================================
// Coin
// ============================================================================

pub struct Coin {
    params: Placement,
    core: EntityCore,
    collected: OneShot<()>,
}

impl Coin {
    pub fn new(params: Placement) -> Self {
        Self {
            core: EntityCore::new("coin", params.pos),
            collected: OneShot::new(),
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Coin.tag(),
            name: GameObjectId::Coin.name(),
            meta: ObjectMeta::placed(),
            construct: |params| Ok(Box::new(Coin::new(Placement { pos: params.pos }))),
            deserialize: |data| Ok(Box::new(Coin::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }
}

impl GameObject<GameEvent> for Coin {
    fn kind(&self) -> KindTag {
        GameObjectId::Coin.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let sensor = FixtureDef::new(
            Shape::Circle {
                radius: COIN_RADIUS,
            },
            self.core.tag(GameObjectId::Coin).with_role(roles::PICKUP),
        )
        .with_filter(pickup_filter())
        .sensor();
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[sensor],
        )?;
        Ok(())
    }

    fn update(&mut self, _dt: f32, ctx: &mut Ctx<'_>) {
        if self.collected.take().is_some() {
            ctx.emit(GameEvent::CoinCollected {
                at: self.params.pos,
            });
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
        }
        self.core.visual.sprite.frame = (ctx.tick() / 8 % 4) as u32;
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for Coin {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Coin {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for Coin {
    fn on_contact(&mut self, contact: &Contact) {
        if touched_by_player(contact) {
            self.collected.offer(());
        }
    }
}

// ============================================================================
// Power-ups
// ============================================================================

/// Mushroom, 1-up, fire flower or star. Everything but the flower walks and
/// turns at walls; the star also bounces.
pub struct PowerItem {
    kind: GameObjectId,
    params: WalkerParams,
    core: EntityCore,
    walker: Option<EnemyCore>,
    collected: OneShot<()>,
    bounce: OneShot<()>,
}

static ITEM_PROPS: [PropertySpec; 1] = [PropertySpec::optional("facing", PropertyKind::Number)];

fn walk_speed(kind: GameObjectId) -> Option<f32> {
    match kind {
        GameObjectId::Mushroom | GameObjectId::OneUp => Some(3.0),
        GameObjectId::Star => Some(4.0),
        _ => None,
    }
}

fn sprite_name(kind: GameObjectId) -> &'static str {
    match kind {
        GameObjectId::Mushroom => "mushroom",
        GameObjectId::OneUp => "one_up",
        GameObjectId::FireFlower => "fire_flower",
        _ => "star",
    }
}

macro_rules! power_item_vtable {
    ($fn_name:ident, $kind:expr) => {
        pub fn $fn_name() -> ObjectVTable<GameEvent> {
            ObjectVTable {
                kind: $kind.tag(),
                name: $kind.name(),
                meta: ObjectMeta::placed().with_properties(&ITEM_PROPS),
                construct: |params| {
                    Ok(Box::new(PowerItem::new(
                        $kind,
                        WalkerParams::from_params(params)?,
                    )))
                },
                deserialize: |data| {
                    Ok(Box::new(PowerItem::new(
                        $kind,
                        serde_json::from_value(data.clone())?,
                    )))
                },
                drag_preview: None,
            }
        }
    };
}

impl PowerItem {
    /// `kind` must be one of the power-up kinds; anything else behaves like a flower.
    pub fn new(kind: GameObjectId, params: WalkerParams) -> Self {
        Self {
            kind,
            core: EntityCore::new(sprite_name(kind), params.pos),
            walker: walk_speed(kind).map(|speed| EnemyCore::new(params.facing, speed)),
            collected: OneShot::new(),
            bounce: OneShot::new(),
            params,
        }
    }

    /// Released from a block: moves right first.
    pub fn emerging(kind: GameObjectId, pos: Vec2) -> Self {
        Self::new(kind, WalkerParams { pos, facing: 1.0 })
    }

    power_item_vtable!(mushroom_vtable, GameObjectId::Mushroom);
    power_item_vtable!(one_up_vtable, GameObjectId::OneUp);
    power_item_vtable!(fire_flower_vtable, GameObjectId::FireFlower);
    power_item_vtable!(star_vtable, GameObjectId::Star);

    pub fn item_kind(&self) -> GameObjectId {
        self.kind
    }

    pub fn facing(&self) -> Option<f32> {
        self.walker.as_ref().map(|w| w.facing)
    }

    fn pickup(&self) -> FixtureDef {
        FixtureDef::new(
            Shape::rect(ITEM_SIZE, ITEM_SIZE),
            self.core.tag(self.kind).with_role(roles::PICKUP),
        )
        .with_offset(Vec2::new(0.0, ITEM_SIZE / 2.0))
        .with_filter(pickup_filter())
        .sensor()
    }
}

impl GameObject<GameEvent> for PowerItem {
    fn kind(&self) -> KindTag {
        self.kind.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        if self.walker.is_none() {
            let def = BodyDef::new(BodyKind::Static, self.params.pos);
            self.core.build(ctx.physics, &def, &[self.pickup()])?;
            return Ok(());
        }
        // solid against level geometry only; the player meets the pickup sensor
        let hull = FixtureDef::new(
            Shape::rect(ITEM_SIZE * 0.95, ITEM_SIZE),
            self.core.tag(self.kind).with_role(roles::BODY),
        )
        .with_offset(Vec2::new(0.0, ITEM_SIZE / 2.0))
        .with_friction(0.0)
        .with_filter(ground_sensor_filter(groups::ITEM));
        let fixtures = [hull, self.pickup()];
        self.core
            .build(ctx.physics, &walker_body(self.params.pos), &fixtures)?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        let gone = self.core.position(ctx.physics).y < OUT_OF_WORLD_Y;
        if self.collected.take().is_some() || gone {
            ctx.remove(self.core.id(), RemoveCause::Gameplay);
        }
        if self.bounce.take().is_some() {
            self.core.set_vy(ctx.physics, STAR_BOUNCE_VY);
        }
        self.core.interpolate(dt, ctx.physics);
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        let (Some(walker), Some(body)) = (self.walker.as_mut(), self.core.body()) else {
            return;
        };
        walker.apply_turns();
        walker.walk(ctx.physics, body);
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite, contact);
}

impl HasBody for PowerItem {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for PowerItem {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

impl ContactReactive for PowerItem {
    fn on_contact(&mut self, contact: &Contact) {
        if touched_by_player(contact) {
            self.collected.offer(());
            return;
        }
        if self.kind == GameObjectId::Star
            && contact.is_presolve()
            && contact.enabled
            && contact.touch() == Some(Touch::Landed)
        {
            self.bounce.offer(());
        }
        if let Some(walker) = self.walker.as_mut() {
            walker.on_contact(contact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun_core::physics::FixtureTag;
    use brickrun_core::test_helpers::{begin, presolve, tag, test_world};
    use brickrun_core::world::World;

    use crate::objects::player::{Player, PlayerParams};
    use crate::objects::terrain::{Ground, GroundParams};
    use crate::powerups::Power;

    fn floor(world: &mut World<GameEvent>) {
        world
            .add_entity(Ground::new(GroundParams {
                vertices: vec![
                    Vec2::new(-20.0, -1.0),
                    Vec2::new(20.0, -1.0),
                    Vec2::new(20.0, 0.0),
                    Vec2::new(-20.0, 0.0),
                ],
            }))
            .unwrap();
    }

    fn player_body() -> FixtureTag {
        tag(90, GameObjectId::Player.tag()).with_role(roles::BODY)
    }

    #[test]
    fn coin_collects_once() {
        let mut world = test_world::<GameEvent>();
        let id = world
            .add_entity(Coin::new(Placement {
                pos: Vec2::new(2.0, 3.0),
            }))
            .unwrap();
        let mine = FixtureTag::new(id, GameObjectId::Coin.tag()).with_role(roles::PICKUP);
        let coin = world.get_as_mut::<Coin>(id).unwrap();
        coin.on_contact(&begin(mine, player_body(), true));
        coin.on_contact(&begin(mine, player_body().with_role(roles::FOOT), true));
        world.update(1.0 / 60.0);

        assert!(!world.contains(id));
        assert_eq!(
            world.take_events(),
            vec![GameEvent::CoinCollected {
                at: Vec2::new(2.0, 3.0)
            }]
        );
    }

    #[test]
    fn player_walking_into_a_coin_collects_it() {
        let mut world = test_world::<GameEvent>();
        floor(&mut world);
        let coin = world
            .add_entity(Coin::new(Placement {
                pos: Vec2::new(0.0, 0.5),
            }))
            .unwrap();
        world
            .add_entity(Player::new(PlayerParams {
                pos: Vec2::ZERO,
                power: Power::Small,
            }))
            .unwrap();
        for _ in 0..3 {
            world.fixed_update();
        }
        world.update(1.0 / 60.0);
        assert!(!world.contains(coin));
    }

    #[test]
    fn mushroom_walks_and_turns_at_walls() {
        let mut world = test_world::<GameEvent>();
        floor(&mut world);
        let id = world
            .add_entity(PowerItem::emerging(GameObjectId::Mushroom, Vec2::ZERO))
            .unwrap();
        for _ in 0..20 {
            world.fixed_update();
        }
        let body = world.get_as::<PowerItem>(id).unwrap().body().unwrap();
        assert!(world.physics().position(body).unwrap().x > 0.5);

        let mine = FixtureTag::new(id, GameObjectId::Mushroom.tag()).with_role(roles::BODY);
        let wall = tag(3, GameObjectId::Ground.tag());
        world
            .get_as_mut::<PowerItem>(id)
            .unwrap()
            .on_contact(&presolve(mine, wall, Vec2::X));
        world.fixed_update();
        assert_eq!(world.get_as::<PowerItem>(id).unwrap().facing(), Some(-1.0));
    }

    #[test]
    fn fire_flower_stays_put_and_is_collected() {
        let mut world = test_world::<GameEvent>();
        let id = world
            .add_entity(PowerItem::emerging(GameObjectId::FireFlower, Vec2::new(1.0, 1.0)))
            .unwrap();
        assert_eq!(world.get_as::<PowerItem>(id).unwrap().facing(), None);
        for _ in 0..10 {
            world.fixed_update();
        }
        let body = world.get_as::<PowerItem>(id).unwrap().body().unwrap();
        assert_eq!(world.physics().position(body), Some(Vec2::new(1.0, 1.0)));

        let mine = FixtureTag::new(id, GameObjectId::FireFlower.tag()).with_role(roles::PICKUP);
        world
            .get_as_mut::<PowerItem>(id)
            .unwrap()
            .on_contact(&begin(mine, player_body(), true));
        world.update(1.0 / 60.0);
        assert!(!world.contains(id));
        // scoring is the player's business
        assert!(world.take_events().is_empty());
    }

    #[test]
    fn star_bounces_on_landing() {
        let mut world = test_world::<GameEvent>();
        floor(&mut world);
        let id = world
            .add_entity(PowerItem::emerging(GameObjectId::Star, Vec2::ZERO))
            .unwrap();
        let mine = FixtureTag::new(id, GameObjectId::Star.tag()).with_role(roles::BODY);
        world
            .get_as_mut::<PowerItem>(id)
            .unwrap()
            .on_contact(&presolve(mine, tag(3, GameObjectId::Ground.tag()), Vec2::NEG_Y));
        world.update(1.0 / 60.0);
        let body = world.get_as::<PowerItem>(id).unwrap().body().unwrap();
        assert_eq!(world.physics().linvel(body).unwrap().y, STAR_BOUNCE_VY);
    }
}
