use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::ops::BitOr;
use std::sync::Mutex;

use glam::Vec2;
use rapier2d::math::{Isometry, Point, Real, Rotation, Vector};
use rapier2d::prelude::{
    ActiveEvents, ActiveHooks, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet,
    CollisionEvent, CollisionEventFlags, ContactModificationContext, ContactPair,
    DefaultBroadPhase, EventHandler, Group, ImpulseJointSet, IntegrationParameters,
    InteractionGroups, IslandManager, LockedAxes, MultibodyJointSet, NarrowPhase, PhysicsHooks,
    PhysicsPipeline, QueryPipeline, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
    RigidBodyType,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::PhysicsConfig;
use crate::error::PhysicsError;
use crate::object::{KindTag, ObjectId};

/// Polygons with less area than this are rejected.
pub const MIN_SHAPE_AREA: f32 = 1e-6;
/// A one-way fixture only collides with parties whose normal points at least this far "up".
const ONE_WAY_MIN_NORMAL: f32 = 0.5;

fn to_na(v: Vec2) -> Vector<Real> {
    Vector::new(v.x, v.y)
}

fn from_na(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

// ---------------------------------------------------------------------------
// Fixture user data
// ---------------------------------------------------------------------------

/// Gameplay bits carried by a fixture and read by the pre-solve gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FixtureFlags(u8);

impl FixtureFlags {
    pub const NONE: Self = Self(0);
    /// Contacts are reported but never physically resolved (kill triggers).
    pub const NO_RESPONSE: Self = Self(1);
    /// Only parties resting on top collide.
    pub const ONE_WAY: Self = Self(1 << 1);
    /// Marks enemy bodies for the piercing rule.
    pub const ENEMY: Self = Self(1 << 2);
    /// Passes through `ENEMY` fixtures (sliding shell).
    pub const PIERCING: Self = Self(1 << 3);
    /// Level geometry; phantoms still collide with it.
    pub const TERRAIN: Self = Self(1 << 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for FixtureFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Opaque per-fixture user data: which object owns the fixture, its type tag,
/// a variant-defined role byte (e.g. "left probe") and gate flags.
///
/// Packed into the collider's `u128` user data so the pre-solve hook can read it
/// without touching any game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureTag {
    pub owner: ObjectId,
    pub kind: KindTag,
    pub role: u8,
    pub flags: FixtureFlags,
}

impl FixtureTag {
    const MARKER: u128 = 1 << 127;

    pub fn new(owner: ObjectId, kind: KindTag) -> Self {
        Self {
            owner,
            kind,
            role: 0,
            flags: FixtureFlags::NONE,
        }
    }

    pub fn with_role(mut self, role: u8) -> Self {
        self.role = role;
        self
    }

    pub fn with_flags(mut self, flags: FixtureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn encode(self) -> u128 {
        Self::MARKER
            | u128::from(self.owner.0)
            | (u128::from(self.kind.0) << 64)
            | (u128::from(self.role) << 80)
            | (u128::from(self.flags.bits()) << 88)
    }

    /// Returns `None` for colliders that carry no tag (plain geometry).
    pub fn decode(data: u128) -> Option<Self> {
        if data & Self::MARKER == 0 {
            return None;
        }
        Some(Self {
            owner: ObjectId(data as u64),
            kind: KindTag((data >> 64) as u16),
            role: (data >> 80) as u8,
            flags: FixtureFlags::from_bits((data >> 88) as u8),
        })
    }
}

// ---------------------------------------------------------------------------
// Shapes and definitions
// ---------------------------------------------------------------------------

/// Collision shape, in body-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Box { half_extents: Vec2 },
    Circle { radius: f32 },
    Polygon { vertices: Vec<Vec2> },
}

impl Shape {
    /// Axis-aligned rectangle of the given full width and height.
    pub fn rect(width: f32, height: f32) -> Self {
        Self::Box {
            half_extents: Vec2::new(width / 2.0, height / 2.0),
        }
    }

    pub fn validate(&self) -> Result<(), PhysicsError> {
        match self {
            Self::Box { half_extents } => {
                if !half_extents.is_finite() || half_extents.x <= 0.0 || half_extents.y <= 0.0 {
                    return Err(PhysicsError::DegenerateShape(format!(
                        "box half extents {half_extents}"
                    )));
                }
            },
            Self::Circle { radius } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(PhysicsError::DegenerateShape(format!("radius {radius}")));
                }
            },
            Self::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(PhysicsError::DegenerateShape(format!(
                        "{} vertices",
                        vertices.len()
                    )));
                }
                if vertices.iter().any(|v| !v.is_finite()) {
                    return Err(PhysicsError::DegenerateShape(
                        "non-finite vertex".to_string(),
                    ));
                }
                let area = polygon_area(vertices).abs();
                if area < MIN_SHAPE_AREA {
                    return Err(PhysicsError::DegenerateShape(format!("area {area}")));
                }
            },
        }
        Ok(())
    }

    fn collider_builder(&self) -> Result<ColliderBuilder, PhysicsError> {
        self.validate()?;
        match self {
            Self::Box { half_extents } => Ok(ColliderBuilder::cuboid(half_extents.x, half_extents.y)),
            Self::Circle { radius } => Ok(ColliderBuilder::ball(*radius)),
            Self::Polygon { vertices } => {
                let points: Vec<Point<Real>> =
                    vertices.iter().map(|v| Point::new(v.x, v.y)).collect();
                if is_convex(vertices) {
                    ColliderBuilder::convex_hull(&points).ok_or_else(|| {
                        PhysicsError::DegenerateShape("convex hull failed".to_string())
                    })
                } else {
                    let n = points.len() as u32;
                    let indices: Vec<[u32; 2]> = (0..n).map(|i| [i, (i + 1) % n]).collect();
                    Ok(ColliderBuilder::convex_decomposition(&points, &indices))
                }
            },
        }
    }
}

/// Signed area (shoelace). Positive for counter-clockwise winding.
pub fn polygon_area(vertices: &[Vec2]) -> f32 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        twice += a.perp_dot(b);
    }
    twice / 2.0
}

/// True when every turn of the outline has the same orientation.
pub fn is_convex(vertices: &[Vec2]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let c = vertices[(i + 2) % n];
        let cross = (b - a).perp_dot(c - b);
        if cross.abs() <= f32::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Static,
    Dynamic,
    Kinematic,
}

impl BodyKind {
    fn to_rapier(self) -> RigidBodyType {
        match self {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Kinematic => RigidBodyType::KinematicPositionBased,
        }
    }
}

/// Describes a rigid body before creation.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linvel: Vec2,
    pub fixed_rotation: bool,
    pub gravity_scale: f32,
    pub ccd: bool,
}

impl BodyDef {
    pub fn new(kind: BodyKind, position: Vec2) -> Self {
        Self {
            kind,
            position,
            angle: 0.0,
            linvel: Vec2::ZERO,
            fixed_rotation: false,
            gravity_scale: 1.0,
            ccd: false,
        }
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_linvel(mut self, linvel: Vec2) -> Self {
        self.linvel = linvel;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_ccd(mut self, enabled: bool) -> Self {
        self.ccd = enabled;
        self
    }
}

/// Category/mask pair. Two fixtures interact when each one's membership
/// intersects the other's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub membership: u32,
    pub filter: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            membership: u32::MAX,
            filter: u32::MAX,
        }
    }
}

impl CollisionFilter {
    fn to_rapier(self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.membership),
            Group::from_bits_truncate(self.filter),
        )
    }
}

/// Describes a collision shape attached to a body.
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub offset: Vec2,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub sensor: bool,
    pub filter: CollisionFilter,
    pub tag: FixtureTag,
}

impl FixtureDef {
    pub fn new(shape: Shape, tag: FixtureTag) -> Self {
        Self {
            shape,
            offset: Vec2::ZERO,
            density: 1.0,
            friction: 0.0,
            restitution: 0.0,
            sensor: false,
            filter: CollisionFilter::default(),
            tag,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureHandle(ColliderHandle);

// ---------------------------------------------------------------------------
// Contact recording
// ---------------------------------------------------------------------------

/// One contact phase observed during a step, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactRecord {
    Begin {
        a: FixtureTag,
        b: FixtureTag,
        sensor: bool,
    },
    End {
        a: FixtureTag,
        b: FixtureTag,
        sensor: bool,
    },
    /// Two solid fixtures touching, before constraint resolution.
    /// `normal` points from `a` toward `b`.
    PreSolve {
        a: FixtureTag,
        b: FixtureTag,
        normal: Vec2,
        enabled: bool,
    },
}

/// Everything one `step()` observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactReport {
    /// Number of the step that produced the records, starting at 1.
    pub step: u64,
    pub records: Vec<ContactRecord>,
}

impl ContactReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// How an owner's fixtures pass through others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GhostMode {
    #[default]
    Solid,
    /// Passes through everything except `TERRAIN` (invulnerable player).
    Phantom,
    /// Passes through everything (dying enemy falling off screen).
    Ghost,
}

/// Decides, inside the step, whether a touching pair gets a physical response.
#[derive(Debug, Default)]
pub struct ContactGate {
    ghosts: HashMap<ObjectId, GhostMode>,
}

impl ContactGate {
    /// `normal` points from `a` toward `b`.
    pub fn allows(&self, a: &FixtureTag, b: &FixtureTag, normal: Vec2) -> bool {
        let passes = |me: &FixtureTag, other: &FixtureTag| match self.mode(me.owner) {
            GhostMode::Solid => false,
            GhostMode::Phantom => !other.flags.contains(FixtureFlags::TERRAIN),
            GhostMode::Ghost => true,
        };
        if passes(a, b) || passes(b, a) {
            return false;
        }
        if a.flags.contains(FixtureFlags::NO_RESPONSE) || b.flags.contains(FixtureFlags::NO_RESPONSE)
        {
            return false;
        }
        let pierces = |x: &FixtureTag, y: &FixtureTag| {
            x.flags.contains(FixtureFlags::PIERCING) && y.flags.contains(FixtureFlags::ENEMY)
        };
        if pierces(a, b) || pierces(b, a) {
            return false;
        }
        if a.flags.contains(FixtureFlags::ONE_WAY) && normal.y < ONE_WAY_MIN_NORMAL {
            return false;
        }
        if b.flags.contains(FixtureFlags::ONE_WAY) && -normal.y < ONE_WAY_MIN_NORMAL {
            return false;
        }
        true
    }

    pub fn mode(&self, owner: ObjectId) -> GhostMode {
        self.ghosts.get(&owner).copied().unwrap_or_default()
    }
}

enum RawRecord {
    Phase(CollisionEvent),
    PreSolve {
        a: FixtureTag,
        b: FixtureTag,
        normal: Vec2,
        enabled: bool,
    },
}

/// Hook + event sink handed to the rapier pipeline. Rapier requires both to be
/// `Send + Sync`; the mutex is only ever locked from the stepping thread.
#[derive(Default)]
struct ContactPipe {
    gate: ContactGate,
    records: Mutex<Vec<RawRecord>>,
}

impl ContactPipe {
    fn push(&self, record: RawRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    fn drain(&self) -> Vec<RawRecord> {
        self.records
            .lock()
            .map(|mut records| std::mem::take(&mut *records))
            .unwrap_or_default()
    }
}

impl PhysicsHooks for ContactPipe {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext<'_>) {
        let tag_of = |handle: ColliderHandle| {
            context
                .colliders
                .get(handle)
                .and_then(|c| FixtureTag::decode(c.user_data))
        };
        let (Some(a), Some(b)) = (tag_of(context.collider1), tag_of(context.collider2)) else {
            return;
        };
        let normal = Vec2::new(context.normal.x, context.normal.y);
        let enabled = self.gate.allows(&a, &b, normal);
        if !enabled {
            context.solver_contacts.clear();
        }
        self.push(RawRecord::PreSolve {
            a,
            b,
            normal,
            enabled,
        });
    }
}

impl EventHandler for ContactPipe {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        self.push(RawRecord::Phase(event));
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

/// Owns the rigid-body simulation.
///
/// Body destruction is never immediate: [`PhysicsWorld::queue_destroy`] parks the
/// body until [`PhysicsWorld::flush_destroyed`], which the entity registry calls
/// between steps. Fixture tags of destroyed bodies stay resolvable for one more
/// step so the end-contact events rapier emits for them still reach the survivors.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    pipe: ContactPipe,
    tags: HashMap<ColliderHandle, FixtureTag>,
    pending_bodies: Vec<BodyHandle>,
    pending_fixtures: Vec<FixtureHandle>,
    retired: Vec<ColliderHandle>,
    steps: u64,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig, fixed_dt: f32) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = fixed_dt;
        params.num_solver_iterations =
            NonZeroUsize::new(config.velocity_iterations).unwrap_or(NonZeroUsize::MIN);
        params.num_internal_pgs_iterations = config.position_iterations.max(1);

        Self {
            gravity: to_na(config.gravity),
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            pipe: ContactPipe::default(),
            tags: HashMap::new(),
            pending_bodies: Vec::new(),
            pending_fixtures: Vec::new(),
            retired: Vec::new(),
            steps: 0,
        }
    }

    pub fn fixed_dt(&self) -> f32 {
        self.params.dt
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        let mut builder = RigidBodyBuilder::new(def.kind.to_rapier())
            .translation(to_na(def.position))
            .rotation(def.angle)
            .linvel(to_na(def.linvel))
            .gravity_scale(def.gravity_scale)
            .ccd_enabled(def.ccd)
            .can_sleep(false);
        if def.fixed_rotation {
            builder = builder.locked_axes(LockedAxes::ROTATION_LOCKED);
        }
        BodyHandle(self.bodies.insert(builder.build()))
    }

    pub fn add_fixture(
        &mut self,
        body: BodyHandle,
        def: &FixtureDef,
    ) -> Result<FixtureHandle, PhysicsError> {
        if !self.bodies.contains(body.0) {
            return Err(PhysicsError::UnknownBody);
        }
        let hooks = if def.sensor {
            ActiveHooks::empty()
        } else {
            ActiveHooks::MODIFY_SOLVER_CONTACTS
        };
        let collider = def
            .shape
            .collider_builder()?
            .translation(to_na(def.offset))
            .density(def.density)
            .friction(def.friction)
            .restitution(def.restitution)
            .sensor(def.sensor)
            .collision_groups(def.filter.to_rapier())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_hooks(hooks)
            .user_data(def.tag.encode())
            .build();
        let handle = self
            .colliders
            .insert_with_parent(collider, body.0, &mut self.bodies);
        self.tags.insert(handle, def.tag);
        Ok(FixtureHandle(handle))
    }

    /// Create a body together with its fixtures. Every shape is validated first,
    /// so a degenerate fixture never leaves a half-built body behind.
    pub fn create_body_with(
        &mut self,
        def: &BodyDef,
        fixtures: &[FixtureDef],
    ) -> Result<(BodyHandle, Vec<FixtureHandle>), PhysicsError> {
        for fixture in fixtures {
            fixture.shape.validate()?;
        }
        let body = self.create_body(def);
        let mut handles = Vec::with_capacity(fixtures.len());
        for fixture in fixtures {
            match self.add_fixture(body, fixture) {
                Ok(h) => handles.push(h),
                Err(e) => {
                    self.queue_destroy(body);
                    return Err(e);
                },
            }
        }
        Ok((body, handles))
    }

    /// Park a body for destruction at the next flush.
    pub fn queue_destroy(&mut self, body: BodyHandle) {
        if !self.pending_bodies.contains(&body) {
            self.pending_bodies.push(body);
        }
    }

    /// Park a single fixture for removal at the next flush.
    pub fn queue_remove_fixture(&mut self, fixture: FixtureHandle) {
        if !self.pending_fixtures.contains(&fixture) {
            self.pending_fixtures.push(fixture);
        }
    }

    pub fn pending_destroy_count(&self) -> usize {
        self.pending_bodies.len() + self.pending_fixtures.len()
    }

    /// Perform queued destruction. Must only run between steps.
    pub fn flush_destroyed(&mut self) -> usize {
        let mut removed = 0;
        for fixture in std::mem::take(&mut self.pending_fixtures) {
            if self
                .colliders
                .remove(fixture.0, &mut self.islands, &mut self.bodies, true)
                .is_some()
            {
                self.retired.push(fixture.0);
                removed += 1;
            }
        }
        for body in std::mem::take(&mut self.pending_bodies) {
            if let Some(rb) = self.bodies.get(body.0) {
                self.retired.extend(rb.colliders().iter().copied());
            }
            if self
                .bodies
                .remove(
                    body.0,
                    &mut self.islands,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    true,
                )
                .is_some()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            trace!(removed, "flushed destroyed bodies");
        }
        removed
    }

    /// Advance one fixed tick and report every contact phase observed.
    pub fn step(&mut self) -> ContactReport {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &self.pipe,
            &self.pipe,
        );
        self.steps += 1;

        let mut report = ContactReport {
            step: self.steps,
            records: Vec::new(),
        };
        for raw in self.pipe.drain() {
            match raw {
                RawRecord::Phase(event) => {
                    let (h1, h2, started, flags) = match event {
                        CollisionEvent::Started(h1, h2, flags) => (h1, h2, true, flags),
                        CollisionEvent::Stopped(h1, h2, flags) => (h1, h2, false, flags),
                    };
                    let (Some(a), Some(b)) = (self.tags.get(&h1), self.tags.get(&h2)) else {
                        trace!("contact between untagged fixtures ignored");
                        continue;
                    };
                    let (a, b) = (*a, *b);
                    let sensor = flags.contains(CollisionEventFlags::SENSOR);
                    report.records.push(if started {
                        ContactRecord::Begin { a, b, sensor }
                    } else {
                        ContactRecord::End { a, b, sensor }
                    });
                },
                RawRecord::PreSolve {
                    a,
                    b,
                    normal,
                    enabled,
                } => report.records.push(ContactRecord::PreSolve {
                    a,
                    b,
                    normal,
                    enabled,
                }),
            }
        }

        // Stop events for fixtures removed before this step have now been seen.
        for handle in self.retired.drain(..) {
            self.tags.remove(&handle);
        }
        report
    }

    /// Change how `owner`'s fixtures pass through others, from the next step on.
    pub fn set_ghost(&mut self, owner: ObjectId, mode: GhostMode) {
        if mode == GhostMode::Solid {
            self.pipe.gate.ghosts.remove(&owner);
        } else {
            self.pipe.gate.ghosts.insert(owner, mode);
        }
    }

    /// Replace a fixture's tag, e.g. to toggle its gate flags.
    pub fn retag(&mut self, fixture: FixtureHandle, tag: FixtureTag) {
        if let Some(collider) = self.colliders.get_mut(fixture.0) {
            collider.user_data = tag.encode();
            self.tags.insert(fixture.0, tag);
        }
    }

    pub fn gate(&self) -> &ContactGate {
        &self.pipe.gate
    }

    pub fn body_exists(&self, body: BodyHandle) -> bool {
        self.bodies.contains(body.0)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn fixture_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn fixture_tag(&self, fixture: FixtureHandle) -> Option<FixtureTag> {
        self.tags.get(&fixture.0).copied()
    }

    pub fn position(&self, body: BodyHandle) -> Option<Vec2> {
        self.bodies.get(body.0).map(|rb| from_na(rb.translation()))
    }

    pub fn angle(&self, body: BodyHandle) -> Option<f32> {
        self.bodies.get(body.0).map(|rb| rb.rotation().angle())
    }

    pub fn linvel(&self, body: BodyHandle) -> Option<Vec2> {
        self.bodies.get(body.0).map(|rb| from_na(rb.linvel()))
    }

    pub fn set_linvel(&mut self, body: BodyHandle, linvel: Vec2) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.set_linvel(to_na(linvel), true);
        }
    }

    pub fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.apply_impulse(to_na(impulse), true);
        }
    }

    pub fn mass(&self, body: BodyHandle) -> Option<f32> {
        self.bodies.get(body.0).map(|rb| rb.mass())
    }

    /// Instantly move a body (teleport); velocity is kept.
    pub fn set_position(&mut self, body: BodyHandle, position: Vec2, angle: f32) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.set_position(Isometry::new(to_na(position), angle), true);
        }
    }

    pub fn set_angle(&mut self, body: BodyHandle, angle: f32) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.set_rotation(Rotation::new(angle), true);
        }
    }

    /// Target for a kinematic body; reached at the end of the next step.
    pub fn set_next_kinematic_position(&mut self, body: BodyHandle, position: Vec2) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.set_next_kinematic_translation(to_na(position));
        }
    }

    pub fn set_gravity_scale(&mut self, body: BodyHandle, scale: f32) {
        if let Some(rb) = self.bodies.get_mut(body.0) {
            rb.set_gravity_scale(scale, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUND: KindTag = KindTag(1);
    const CRATE: KindTag = KindTag(2);

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsConfig::default(), 1.0 / 60.0)
    }

    fn ground(world: &mut PhysicsWorld, owner: u64) -> BodyHandle {
        let tag = FixtureTag::new(ObjectId(owner), GROUND);
        let (body, _) = world
            .create_body_with(
                &BodyDef::new(BodyKind::Static, Vec2::ZERO),
                &[FixtureDef::new(Shape::rect(20.0, 1.0), tag)],
            )
            .unwrap();
        body
    }

    fn falling_box(world: &mut PhysicsWorld, owner: u64, y: f32) -> BodyHandle {
        let tag = FixtureTag::new(ObjectId(owner), CRATE);
        let (body, _) = world
            .create_body_with(
                &BodyDef::new(BodyKind::Dynamic, Vec2::new(0.0, y)).with_fixed_rotation(true),
                &[FixtureDef::new(Shape::rect(1.0, 1.0), tag)],
            )
            .unwrap();
        body
    }

    #[test]
    fn tag_roundtrips_through_user_data() {
        let tag = FixtureTag::new(ObjectId(0xDEAD_BEEF_1234), KindTag(513))
            .with_role(7)
            .with_flags(FixtureFlags::ONE_WAY | FixtureFlags::ENEMY);
        assert_eq!(FixtureTag::decode(tag.encode()), Some(tag));
        assert_eq!(FixtureTag::decode(0), None);
    }

    #[test]
    fn degenerate_shapes_are_rejected() {
        let collinear = Shape::Polygon {
            vertices: vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)],
        };
        assert!(matches!(
            collinear.validate(),
            Err(PhysicsError::DegenerateShape(_))
        ));
        assert!(Shape::rect(0.0, 1.0).validate().is_err());
        assert!(Shape::Circle { radius: -1.0 }.validate().is_err());
        assert!(
            Shape::Polygon {
                vertices: vec![Vec2::ZERO, Vec2::X]
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn degenerate_fixture_creates_no_body() {
        let mut world = world();
        let tag = FixtureTag::new(ObjectId(1), GROUND);
        let result = world.create_body_with(
            &BodyDef::new(BodyKind::Static, Vec2::ZERO),
            &[FixtureDef::new(Shape::rect(1.0, 0.0), tag)],
        );
        assert!(result.is_err());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn convexity_and_area() {
        let square = [
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        assert!(is_convex(&square));
        assert!((polygon_area(&square) - 1.0).abs() < 1e-6);

        let l_shape = [
            Vec2::ZERO,
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        assert!(!is_convex(&l_shape));
        assert!((polygon_area(&l_shape) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn polygons_build_in_either_winding() {
        let mut world = world();
        let ccw = vec![
            Vec2::new(-2.0, -0.5),
            Vec2::new(2.0, -0.5),
            Vec2::new(2.0, 0.5),
            Vec2::new(-2.0, 0.5),
        ];
        let cw: Vec<Vec2> = ccw.iter().rev().copied().collect();
        let l_shape = vec![
            Vec2::ZERO,
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        for (owner, vertices) in [ccw, cw, l_shape].into_iter().enumerate() {
            let tag = FixtureTag::new(ObjectId(owner as u64 + 1), GROUND);
            let result = world.create_body_with(
                &BodyDef::new(BodyKind::Static, Vec2::new(owner as f32 * 10.0, 0.0)),
                &[FixtureDef::new(Shape::Polygon { vertices }, tag)],
            );
            assert!(result.is_ok(), "polygon {owner} failed: {result:?}");
        }
        assert_eq!(world.body_count(), 3);
    }

    #[test]
    fn destruction_is_deferred_until_flush() {
        let mut world = world();
        let body = falling_box(&mut world, 1, 5.0);
        world.queue_destroy(body);
        world.queue_destroy(body);
        assert!(world.body_exists(body));
        assert_eq!(world.pending_destroy_count(), 1);

        assert_eq!(world.flush_destroyed(), 1);
        assert!(!world.body_exists(body));
        assert_eq!(world.fixture_count(), 0);
        assert_eq!(world.flush_destroyed(), 0);
    }

    #[test]
    fn falling_box_lands_and_reports_contacts() {
        let mut world = world();
        ground(&mut world, 1);
        let body = falling_box(&mut world, 2, 3.0);

        let mut saw_begin = false;
        let mut landing_normal = None;
        for _ in 0..120 {
            for record in world.step().records {
                match record {
                    ContactRecord::Begin { .. } => saw_begin = true,
                    ContactRecord::PreSolve { a, normal, .. } => {
                        // normal points from a to b; express it from the box's side
                        let from_box = if a.owner == ObjectId(2) { normal } else { -normal };
                        landing_normal = Some(from_box);
                    },
                    ContactRecord::End { .. } => {},
                }
            }
        }

        assert!(saw_begin, "landing should begin a contact");
        let n = landing_normal.expect("resting contact should pre-solve");
        assert!(n.y < -0.9, "ground is below the box, got normal {n}");
        let y = world.position(body).unwrap().y;
        assert!(y > 0.5 && y < 1.5, "box should rest on the ground, y={y}");
    }

    #[test]
    fn ghosted_owner_falls_through() {
        let mut world = world();
        ground(&mut world, 1);
        let body = falling_box(&mut world, 2, 3.0);
        world.set_ghost(ObjectId(2), GhostMode::Ghost);
        assert_eq!(world.gate().mode(ObjectId(2)), GhostMode::Ghost);

        for _ in 0..120 {
            world.step();
        }
        assert!(world.position(body).unwrap().y < -1.0);
    }

    #[test]
    fn gate_rules() {
        let gate = ContactGate::default();
        let plain = FixtureTag::new(ObjectId(1), GROUND);
        let hazard = FixtureTag::new(ObjectId(2), GROUND).with_flags(FixtureFlags::NO_RESPONSE);
        let enemy = FixtureTag::new(ObjectId(3), CRATE).with_flags(FixtureFlags::ENEMY);
        let shell = FixtureTag::new(ObjectId(4), CRATE).with_flags(FixtureFlags::PIERCING);
        let ledge = FixtureTag::new(ObjectId(5), GROUND).with_flags(FixtureFlags::ONE_WAY);

        assert!(gate.allows(&plain, &enemy, Vec2::Y));
        assert!(!gate.allows(&hazard, &enemy, Vec2::Y));
        assert!(!gate.allows(&shell, &enemy, Vec2::X));
        assert!(!gate.allows(&enemy, &shell, Vec2::X));
        assert!(gate.allows(&shell, &plain, Vec2::X));

        // ledge -> enemy points up: the enemy stands on top
        assert!(gate.allows(&ledge, &enemy, Vec2::Y));
        assert!(gate.allows(&enemy, &ledge, -Vec2::Y));
        // jumping through from below or walking into its side
        assert!(!gate.allows(&ledge, &enemy, -Vec2::Y));
        assert!(!gate.allows(&ledge, &enemy, Vec2::X));
    }

    #[test]
    fn phantom_keeps_terrain_only() {
        let mut world = world();
        let terrain = FixtureTag::new(ObjectId(1), GROUND).with_flags(FixtureFlags::TERRAIN);
        let enemy = FixtureTag::new(ObjectId(3), CRATE).with_flags(FixtureFlags::ENEMY);
        let player = FixtureTag::new(ObjectId(9), CRATE);
        world.set_ghost(ObjectId(9), GhostMode::Phantom);

        assert!(world.gate().allows(&player, &terrain, -Vec2::Y));
        assert!(!world.gate().allows(&enemy, &player, Vec2::X));

        world.set_ghost(ObjectId(9), GhostMode::Solid);
        assert!(world.gate().allows(&enemy, &player, Vec2::X));
    }

    #[test]
    fn retag_changes_reported_flags() {
        let mut world = world();
        let tag = FixtureTag::new(ObjectId(4), CRATE);
        let body = world.create_body(&BodyDef::new(BodyKind::Dynamic, Vec2::ZERO));
        let fixture = world
            .add_fixture(body, &FixtureDef::new(Shape::Circle { radius: 0.5 }, tag))
            .unwrap();
        let sliding = tag.with_flags(FixtureFlags::ENEMY | FixtureFlags::PIERCING);
        world.retag(fixture, sliding);
        assert_eq!(world.fixture_tag(fixture), Some(sliding));
        assert_eq!(
            sliding.flags.without(FixtureFlags::PIERCING),
            FixtureFlags::ENEMY
        );
    }

    #[test]
    fn report_carries_step_number() {
        let mut world = world();
        assert_eq!(world.step().step, 1);
        assert_eq!(world.step().step, 2);
    }
}
