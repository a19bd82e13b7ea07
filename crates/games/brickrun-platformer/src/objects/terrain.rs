//! Static and moving level geometry.

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use brickrun_core::error::CreateError;
use brickrun_core::game_object_boilerplate;
use brickrun_core::object::{GameObject, HasBody, HasSprite, KindTag, ObjectId, RemoveCause, Visual};
use brickrun_core::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureFlags, Shape};
use brickrun_core::registry::{CommonParams, ObjectMeta, ObjectVTable, PropertyKind, PropertySpec};

use super::{drag_rect, release};
use crate::entity::{Ctx, EntityCore, geometry_filter};
use crate::events::GameEvent;
use crate::ids::GameObjectId;

pub const PLATFORM_THICKNESS: f32 = 0.5;
pub const PIPE_WIDTH: f32 = 2.0;

fn terrain_fixture(core: &EntityCore, kind: GameObjectId, shape: Shape, flags: FixtureFlags) -> FixtureDef {
    FixtureDef::new(shape, core.tag(kind).with_flags(FixtureFlags::TERRAIN | flags))
        .with_filter(geometry_filter())
}

/// Outline the user drew, or the dragged rectangle when nothing was drawn.
fn outline(params: &CommonParams) -> Result<Vec<Vec2>, CreateError> {
    if params.shape.len() >= 3 {
        return Ok(params.shape.clone());
    }
    params.drag()?;
    Ok(drag_rect(params))
}

// ============================================================================
// Ground
// ============================================================================

/// Polygon in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundParams {
    pub vertices: Vec<Vec2>,
}

pub struct Ground {
    params: GroundParams,
    core: EntityCore,
}

impl Ground {
    pub fn new(params: GroundParams) -> Self {
        Self {
            core: EntityCore::new("ground", Vec2::ZERO),
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Ground.tag(),
            name: GameObjectId::Ground.name(),
            meta: ObjectMeta::dragged(),
            construct: |params| {
                Ok(Box::new(Ground::new(GroundParams {
                    vertices: outline(params)?,
                })))
            },
            deserialize: |data| Ok(Box::new(Ground::new(serde_json::from_value(data.clone())?))),
            drag_preview: Some(|params: &CommonParams| {
                if params.shape.len() >= 3 {
                    params.shape.clone()
                } else {
                    drag_rect(params)
                }
            }),
        }
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.params.vertices
    }
}

impl GameObject<GameEvent> for Ground {
    fn kind(&self) -> KindTag {
        GameObjectId::Ground.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let shape = Shape::Polygon {
            vertices: self.params.vertices.clone(),
        };
        let fixture = terrain_fixture(&self.core, GameObjectId::Ground, shape, FixtureFlags::NONE);
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, Vec2::ZERO),
            &[fixture],
        )?;
        Ok(())
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.params)
    }

    game_object_boilerplate!(body, sprite);
}

impl HasBody for Ground {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Ground {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

// ============================================================================
// Platform
// ============================================================================

/// One-way platform. `pos` is the center of its top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformParams {
    pub pos: Vec2,
    pub width: f32,
}

pub struct Platform {
    params: PlatformParams,
    core: EntityCore,
}

impl Platform {
    pub fn new(params: PlatformParams) -> Self {
        Self {
            core: EntityCore::new("platform", params.pos),
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Platform.tag(),
            name: GameObjectId::Platform.name(),
            meta: ObjectMeta::dragged(),
            construct: |params| {
                let span = params.drag()?;
                if span.x.abs() <= f32::EPSILON {
                    return Err(CreateError::ZeroLengthDrag);
                }
                let x = (params.drag_start.x + params.drag_end.x) / 2.0;
                Ok(Box::new(Platform::new(PlatformParams {
                    pos: Vec2::new(x, params.drag_start.y),
                    width: span.x.abs(),
                })))
            },
            deserialize: |data| Ok(Box::new(Platform::new(serde_json::from_value(data.clone())?))),
            drag_preview: Some(|params: &CommonParams| {
                let (a, b) = (params.drag_start, params.drag_end);
                let below = a.y - PLATFORM_THICKNESS;
                vec![a, Vec2::new(b.x, a.y), Vec2::new(b.x, below), Vec2::new(a.x, below)]
            }),
        }
    }
}

impl GameObject<GameEvent> for Platform {
    fn kind(&self) -> KindTag {
        GameObjectId::Platform.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let fixture = terrain_fixture(
            &self.core,
            GameObjectId::Platform,
            Shape::rect(self.params.width, PLATFORM_THICKNESS),
            FixtureFlags::ONE_WAY,
        )
        .with_offset(Vec2::new(0.0, -PLATFORM_THICKNESS / 2.0));
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[fixture],
        )?;
        Ok(())
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite);
}

impl HasBody for Platform {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Platform {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

// ============================================================================
// Moving platform
// ============================================================================

static MOVING_PROPS: [PropertySpec; 2] = [
    PropertySpec::optional("width", PropertyKind::Number),
    PropertySpec::optional("period", PropertyKind::Number),
];

fn default_width() -> f32 {
    3.0
}

fn default_period() -> f32 {
    4.0
}

/// Travels between `start` and `end` and back once per `period` seconds,
/// easing in and out at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingPlatformParams {
    pub start: Vec2,
    pub end: Vec2,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_period")]
    pub period: f32,
}

impl MovingPlatformParams {
    /// Position `elapsed` seconds into the cycle.
    pub fn position_at(&self, elapsed: f32) -> Vec2 {
        if self.period <= 0.0 {
            return self.start;
        }
        let phase = (1.0 - (TAU * elapsed / self.period).cos()) / 2.0;
        self.start.lerp(self.end, phase)
    }
}

pub struct MovingPlatform {
    params: MovingPlatformParams,
    core: EntityCore,
    elapsed: f32,
}

impl MovingPlatform {
    pub fn new(params: MovingPlatformParams) -> Self {
        Self {
            core: EntityCore::new("moving_platform", params.start),
            elapsed: 0.0,
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::MovingPlatform.tag(),
            name: GameObjectId::MovingPlatform.name(),
            meta: ObjectMeta::dragged().with_properties(&MOVING_PROPS),
            construct: |params| {
                params.drag()?;
                let width = params.number("width")?.unwrap_or_else(default_width);
                let period = params.number("period")?.unwrap_or_else(default_period);
                if width <= 0.0 || period <= 0.0 {
                    return Err(CreateError::InvalidProperty {
                        name: if width <= 0.0 { "width" } else { "period" }.to_string(),
                        reason: "must be positive".to_string(),
                    });
                }
                Ok(Box::new(MovingPlatform::new(MovingPlatformParams {
                    start: params.drag_start,
                    end: params.drag_end,
                    width,
                    period,
                })))
            },
            deserialize: |data| {
                Ok(Box::new(MovingPlatform::new(serde_json::from_value(
                    data.clone(),
                )?)))
            },
            drag_preview: Some(|params: &CommonParams| vec![params.drag_start, params.drag_end]),
        }
    }
}

impl GameObject<GameEvent> for MovingPlatform {
    fn kind(&self) -> KindTag {
        GameObjectId::MovingPlatform.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let fixture = terrain_fixture(
            &self.core,
            GameObjectId::MovingPlatform,
            Shape::rect(self.params.width, PLATFORM_THICKNESS),
            FixtureFlags::ONE_WAY,
        )
        .with_offset(Vec2::new(0.0, -PLATFORM_THICKNESS / 2.0));
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Kinematic, self.params.start),
            &[fixture],
        )?;
        Ok(())
    }

    fn update(&mut self, dt: f32, ctx: &mut Ctx<'_>) {
        self.core.interpolate(dt, ctx.physics);
    }

    fn fixed_update(&mut self, ctx: &mut Ctx<'_>) {
        self.elapsed = (self.elapsed + ctx.fixed_dt()) % self.params.period.max(f32::EPSILON);
        if let Some(body) = self.core.body() {
            ctx.physics
                .set_next_kinematic_position(body, self.params.position_at(self.elapsed));
        }
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.params)
    }

    game_object_boilerplate!(body, sprite);
}

impl HasBody for MovingPlatform {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for MovingPlatform {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}

// ============================================================================
// Pipe
// ============================================================================

static PIPE_PROPS: [PropertySpec; 3] = [
    PropertySpec::optional("height", PropertyKind::Number),
    PropertySpec::optional("name", PropertyKind::Text),
    PropertySpec::optional("exit", PropertyKind::Text),
];

fn default_pipe_height() -> f32 {
    2.0
}

/// `pos` is the center of the pipe's base. Standing on a pipe that has an
/// `exit` and pressing down travels to the pipe whose `name` matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeParams {
    pub pos: Vec2,
    #[serde(default = "default_pipe_height")]
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,
}

pub struct Pipe {
    params: PipeParams,
    core: EntityCore,
}

impl Pipe {
    pub fn new(params: PipeParams) -> Self {
        Self {
            core: EntityCore::new("pipe", params.pos),
            params,
        }
    }

    pub fn vtable() -> ObjectVTable<GameEvent> {
        ObjectVTable {
            kind: GameObjectId::Pipe.tag(),
            name: GameObjectId::Pipe.name(),
            meta: ObjectMeta::placed().with_properties(&PIPE_PROPS),
            construct: |params| {
                let height = params.number("height")?.unwrap_or_else(default_pipe_height);
                if height <= 0.0 {
                    return Err(CreateError::InvalidProperty {
                        name: "height".to_string(),
                        reason: "must be positive".to_string(),
                    });
                }
                Ok(Box::new(Pipe::new(PipeParams {
                    pos: params.pos,
                    height,
                    name: params.text("name").map(str::to_string),
                    exit: params.text("exit").map(str::to_string),
                })))
            },
            deserialize: |data| Ok(Box::new(Pipe::new(serde_json::from_value(data.clone())?))),
            drag_preview: None,
        }
    }

    /// Center of the top edge, where a player stands and arrives.
    pub fn top(&self) -> Vec2 {
        self.params.pos + Vec2::new(0.0, self.params.height)
    }

    pub fn name(&self) -> Option<&str> {
        self.params.name.as_deref()
    }

    pub fn exit(&self) -> Option<&str> {
        self.params.exit.as_deref()
    }
}

impl GameObject<GameEvent> for Pipe {
    fn kind(&self) -> KindTag {
        GameObjectId::Pipe.tag()
    }

    fn create(&mut self, id: ObjectId, ctx: &mut Ctx<'_>) -> Result<(), CreateError> {
        self.core.bind(id);
        let fixture = terrain_fixture(
            &self.core,
            GameObjectId::Pipe,
            Shape::rect(PIPE_WIDTH, self.params.height),
            FixtureFlags::NONE,
        )
        .with_offset(Vec2::new(0.0, self.params.height / 2.0));
        self.core.build(
            ctx.physics,
            &BodyDef::new(BodyKind::Static, self.params.pos),
            &[fixture],
        )?;
        Ok(())
    }

    fn remove(&mut self, ctx: &mut Ctx<'_>, _cause: RemoveCause) {
        release(&mut self.core, ctx);
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.params)
    }

    game_object_boilerplate!(body, sprite);
}

impl HasBody for Pipe {
    fn body(&self) -> Option<BodyHandle> {
        self.core.body()
    }
}

impl HasSprite for Pipe {
    fn visual(&self) -> Visual {
        self.core.visual
    }
}
