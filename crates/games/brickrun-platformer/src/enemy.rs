//! Walking behavior and contact outbox shared by enemies and walking items.

use glam::Vec2;

use brickrun_core::contact::{Contact, ContactLatch, ContactProbe, OneShot, Touch, patrol_direction};
use brickrun_core::object::ObjectId;
use brickrun_core::physics::{BodyHandle, FixtureDef, FixtureFlags, FixtureTag, PhysicsWorld, Shape};

use crate::entity::{ground_sensor_filter, roles};
use crate::ids::GameObjectId;

/// What happened to an enemy during the last contact dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnemyEvent {
    Stomp { by: ObjectId },
    /// `sign` points from the enemy toward the player.
    SideTouch { by: ObjectId, sign: i8 },
    /// Touched by a piercing party (sliding shell, fireball, star player).
    Pierced { by: ObjectId },
}

#[derive(Debug, Clone)]
pub struct EnemyCore {
    pub facing: f32,
    pub speed: f32,
    events: OneShot<EnemyEvent>,
    wall: OneShot<i8>,
    latch: ContactLatch,
    left: ContactProbe,
    right: ContactProbe,
    ledge_aware: bool,
}

impl EnemyCore {
    pub fn new(facing: f32, speed: f32) -> Self {
        Self {
            facing: if facing < 0.0 { -1.0 } else { 1.0 },
            speed,
            events: OneShot::new(),
            wall: OneShot::new(),
            latch: ContactLatch::default(),
            left: ContactProbe::seeded(),
            right: ContactProbe::seeded(),
            ledge_aware: false,
        }
    }

    /// Turn around at ledges. Requires the probes from [`EnemyCore::probes`].
    pub fn ledge_aware(mut self) -> Self {
        self.ledge_aware = true;
        self
    }

    /// Sensor fixtures at the lower front and back corners of a body whose
    /// origin is its bottom center.
    pub fn probes(tag: FixtureTag, half_width: f32, membership: u32) -> [FixtureDef; 2] {
        let probe = |role: u8, x: f32| {
            FixtureDef::new(Shape::rect(0.1, 0.2), tag.with_role(role).with_flags(FixtureFlags::NONE))
                .with_offset(Vec2::new(x, -0.05))
                .with_filter(ground_sensor_filter(membership))
                .sensor()
        };
        [
            probe(roles::LEFT_PROBE, -(half_width + 0.05)),
            probe(roles::RIGHT_PROBE, half_width + 0.05),
        ]
    }

    fn record(&mut self, event: EnemyEvent) {
        match event {
            EnemyEvent::Pierced { .. } => self.events.set(event),
            EnemyEvent::Stomp { .. } => {
                if !matches!(self.events.peek(), Some(EnemyEvent::Pierced { .. })) {
                    self.events.set(event);
                }
            },
            EnemyEvent::SideTouch { .. } => {
                self.events.offer(event);
            },
        }
    }

    pub fn on_contact(&mut self, contact: &Contact) {
        if contact.sensor {
            let probe = match contact.mine.role {
                roles::LEFT_PROBE => &mut self.left,
                roles::RIGHT_PROBE => &mut self.right,
                _ => return,
            };
            if contact.is_begin() {
                probe.begin(contact.other_owner());
                // ground under either probe settles both
                self.left.drop_placeholder();
                self.right.drop_placeholder();
            } else if contact.is_end() {
                probe.end(contact.other_owner());
            }
            return;
        }
        if !contact.is_presolve() || !roles::is_body(contact.mine.role) {
            return;
        }

        let by = contact.other_owner();
        let other_is_player =
            contact.other.kind == GameObjectId::Player && roles::is_body(contact.other.role);
        if contact.other.flags.contains(FixtureFlags::PIERCING)
            && contact.mine.flags.contains(FixtureFlags::ENEMY)
        {
            if self.latch.engage(by, contact.step) {
                self.record(EnemyEvent::Pierced { by });
            }
            return;
        }
        if !contact.enabled {
            return;
        }
        let Some(touch) = contact.touch() else {
            return;
        };

        if other_is_player {
            if !self.latch.engage(by, contact.step) {
                return;
            }
            match touch {
                Touch::Stomped => self.record(EnemyEvent::Stomp { by }),
                Touch::SideTouch { sign } => self.record(EnemyEvent::SideTouch { by, sign }),
                Touch::Landed => {
                    let sign = contact.normal.map_or(1, |n| if n.x < 0.0 { -1 } else { 1 });
                    self.record(EnemyEvent::SideTouch { by, sign });
                },
            }
        } else if let Touch::SideTouch { sign } = touch {
            self.wall.offer(sign);
        }
    }

    /// Drain the contact outbox.
    pub fn take_event(&mut self) -> Option<EnemyEvent> {
        self.events.take()
    }

    pub fn peek_event(&self) -> Option<&EnemyEvent> {
        self.events.peek()
    }

    /// Reverse when the last wall contact was in the walking direction.
    pub fn apply_turns(&mut self) {
        if let Some(sign) = self.wall.take()
            && f32::from(sign) == self.facing
        {
            self.facing = -self.facing;
        }
    }

    /// Per fixed tick: ledge check, then drive the body horizontally.
    pub fn walk(&mut self, physics: &mut PhysicsWorld, body: BodyHandle) {
        if self.ledge_aware {
            self.facing = patrol_direction(self.facing, &self.left, &self.right);
        }
        let v = physics.linvel(body).unwrap_or(Vec2::ZERO);
        physics.set_linvel(body, Vec2::new(self.facing * self.speed, v.y));
    }

    /// Forget everything touching (after a teleport or a state change).
    pub fn reset_contacts(&mut self) {
        self.latch.clear();
        self.events.take();
        self.wall.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun_core::test_helpers::{begin, end, presolve, tag};

    fn goomba_tag() -> FixtureTag {
        tag(1, GameObjectId::Goomba.tag()).with_flags(FixtureFlags::ENEMY)
    }

    fn player_tag() -> FixtureTag {
        tag(2, GameObjectId::Player.tag())
    }

    fn ground_tag() -> FixtureTag {
        tag(3, GameObjectId::Ground.tag()).with_flags(FixtureFlags::TERRAIN)
    }

    #[test]
    fn walking_into_a_wall_turns_around() {
        let mut enemy = EnemyCore::new(1.0, 2.0);
        enemy.on_contact(&presolve(goomba_tag(), ground_tag(), Vec2::X));
        // not applied until update
        assert_eq!(enemy.facing, 1.0);
        enemy.apply_turns();
        assert_eq!(enemy.facing, -1.0);

        // a wall behind does not flip it back
        enemy.on_contact(&presolve(goomba_tag(), ground_tag(), Vec2::X));
        enemy.apply_turns();
        assert_eq!(enemy.facing, -1.0);
    }

    #[test]
    fn standing_on_ground_is_not_a_wall() {
        let mut enemy = EnemyCore::new(1.0, 2.0);
        enemy.on_contact(&presolve(goomba_tag(), ground_tag(), Vec2::NEG_Y));
        enemy.apply_turns();
        assert_eq!(enemy.facing, 1.0);
    }

    #[test]
    fn stomp_fires_once_per_contact() {
        let mut enemy = EnemyCore::new(1.0, 2.0);
        let stomp = presolve(goomba_tag(), player_tag(), Vec2::Y);
        for step in 10..14 {
            enemy.on_contact(&stomp.at_step(step));
        }
        assert_eq!(enemy.take_event(), Some(EnemyEvent::Stomp { by: ObjectId(2) }));
        enemy.on_contact(&stomp.at_step(14));
        assert_eq!(enemy.take_event(), None);
    }

    #[test]
    fn stomp_outranks_side_touch() {
        let mut enemy = EnemyCore::new(1.0, 2.0);
        let side = presolve(goomba_tag(), player_tag(), Vec2::NEG_X);
        enemy.on_contact(&side.at_step(1));
        assert_eq!(
            enemy.peek_event(),
            Some(&EnemyEvent::SideTouch {
                by: ObjectId(2),
                sign: -1
            })
        );
        let other_player = tag(9, GameObjectId::Player.tag());
        enemy.on_contact(&presolve(goomba_tag(), other_player, Vec2::Y).at_step(1));
        assert_eq!(enemy.take_event(), Some(EnemyEvent::Stomp { by: ObjectId(9) }));
    }

    #[test]
    fn piercing_party_kills_even_without_response() {
        let mut enemy = EnemyCore::new(1.0, 2.0);
        let shell = tag(5, GameObjectId::Shell.tag())
            .with_flags(FixtureFlags::ENEMY | FixtureFlags::PIERCING);
        let mut contact = presolve(goomba_tag(), shell, Vec2::X);
        contact.enabled = false;
        enemy.on_contact(&contact);
        assert_eq!(enemy.take_event(), Some(EnemyEvent::Pierced { by: ObjectId(5) }));
        enemy.apply_turns();
        assert_eq!(enemy.facing, 1.0);
    }

    #[test]
    fn disabled_player_contact_is_ignored() {
        let mut enemy = EnemyCore::new(1.0, 2.0);
        let mut contact = presolve(goomba_tag(), player_tag(), Vec2::Y);
        contact.enabled = false;
        enemy.on_contact(&contact);
        assert_eq!(enemy.take_event(), None);
    }

    #[test]
    fn probes_track_ground() {
        let mut enemy = EnemyCore::new(1.0, 2.0).ledge_aware();
        let right = goomba_tag().with_role(roles::RIGHT_PROBE);
        let left = goomba_tag().with_role(roles::LEFT_PROBE);
        enemy.on_contact(&begin(left, ground_tag(), true));
        enemy.on_contact(&begin(right, ground_tag(), true));
        enemy.on_contact(&end(right, ground_tag(), true));
        assert!(enemy.left.is_touching());
        assert!(!enemy.right.is_touching());
    }

    #[test]
    fn spawned_facing_a_gap_turns_once_the_other_probe_lands() {
        let mut enemy = EnemyCore::new(1.0, 2.0).ledge_aware();
        let left = goomba_tag().with_role(roles::LEFT_PROBE);
        assert_eq!(patrol_direction(1.0, &enemy.left, &enemy.right), 1.0);

        // only the trailing probe ever reports ground
        enemy.on_contact(&begin(left, ground_tag(), true));
        assert!(!enemy.right.is_touching());
        assert_eq!(patrol_direction(1.0, &enemy.left, &enemy.right), -1.0);
    }
}
