pub mod config;
pub mod contact;
pub mod error;
pub mod input;
pub mod interp;
pub mod level;
pub mod object;
pub mod physics;
pub mod powerup;
pub mod registry;
pub mod time;
pub mod world;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use glam::Vec2;
    use serde::{Deserialize, Serialize};

    use crate::config::EngineConfig;
    use crate::contact::{Contact, ContactPhase};
    use crate::error::CreateError;
    use crate::game_object_boilerplate;
    use crate::object::{GameObject, HasBody, KindTag, ObjectId, RemoveCause};
    use crate::physics::{BodyDef, BodyHandle, BodyKind, FixtureDef, FixtureTag, Shape};
    use crate::registry::{
        CommonParams, ObjectMeta, ObjectRegistry, ObjectVTable, PropertyKind, PropertySpec,
    };
    use crate::time::{FrameRequester, Simulation};
    use crate::world::{World, WorldCtx};

    /// Simulation that only counts what the scheduler asked of it.
    #[derive(Debug, Default)]
    pub struct RecordingSim {
        pub fixed_ticks: u32,
        pub updates: Vec<f32>,
    }

    impl Simulation for RecordingSim {
        fn update(&mut self, dt: f32) {
            self.updates.push(dt);
        }

        fn fixed_update(&mut self) {
            self.fixed_ticks += 1;
        }
    }

    #[derive(Debug, Default)]
    pub struct CountingRequester {
        pub requests: u32,
    }

    impl FrameRequester for CountingRequester {
        fn request_frame(&mut self) {
            self.requests += 1;
        }
    }

    /// A world with default engine configuration.
    pub fn test_world<E: 'static>() -> World<E> {
        World::new(&EngineConfig::default())
    }

    pub fn tag(owner: u64, kind: KindTag) -> FixtureTag {
        FixtureTag::new(ObjectId(owner), kind)
    }

    /// A pre-solve contact seen by `mine`, with the normal pointing toward `other`.
    pub fn presolve(mine: FixtureTag, other: FixtureTag, normal_from_me: Vec2) -> Contact {
        Contact {
            phase: ContactPhase::PreSolve,
            mine,
            other,
            normal: Some(normal_from_me),
            sensor: false,
            enabled: true,
            step: 0,
        }
    }

    pub fn begin(mine: FixtureTag, other: FixtureTag, sensor: bool) -> Contact {
        Contact {
            phase: ContactPhase::Begin,
            mine,
            other,
            normal: None,
            sensor,
            enabled: true,
            step: 0,
        }
    }

    pub fn end(mine: FixtureTag, other: FixtureTag, sensor: bool) -> Contact {
        Contact {
            phase: ContactPhase::End,
            ..begin(mine, other, sensor)
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    enum Flavor {
        #[default]
        Crate,
        Labelled,
        Spark,
    }

    /// Minimal static box object for registry and level tests.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TestCrate {
        pub pos: Vec2,
        pub size: Vec2,
        #[serde(skip)]
        flavor: Flavor,
        #[serde(skip)]
        body: Option<BodyHandle>,
    }

    impl TestCrate {
        pub const KIND: KindTag = KindTag(1);
        pub const LABELLED: KindTag = KindTag(2);
        pub const SPARK: KindTag = KindTag(3);

        pub fn new(pos: Vec2, size: Vec2) -> Self {
            Self {
                pos,
                size,
                flavor: Flavor::Crate,
                body: None,
            }
        }

        /// Transient variant that is never saved.
        pub fn spark() -> Self {
            Self {
                flavor: Flavor::Spark,
                ..Self::new(Vec2::new(0.0, 5.0), Vec2::splat(0.25))
            }
        }

        pub fn vtable<E: 'static>() -> ObjectVTable<E> {
            ObjectVTable {
                kind: Self::KIND,
                name: "crate",
                meta: ObjectMeta::dragged().with_max(2),
                construct: |params| {
                    let size = params.drag()?.abs();
                    let pos = (params.drag_start + params.drag_end) / 2.0;
                    Ok(Box::new(TestCrate::new(pos, size)))
                },
                deserialize: |data| {
                    let c: TestCrate = serde_json::from_value(data.clone())?;
                    Ok(Box::new(c))
                },
                drag_preview: Some(|params: &CommonParams| {
                    let (a, b) = (params.drag_start, params.drag_end);
                    vec![a, Vec2::new(b.x, a.y), b, Vec2::new(a.x, b.y)]
                }),
            }
        }
    }

    impl<E: 'static> GameObject<E> for TestCrate {
        fn kind(&self) -> KindTag {
            match self.flavor {
                Flavor::Crate => Self::KIND,
                Flavor::Labelled => Self::LABELLED,
                Flavor::Spark => Self::SPARK,
            }
        }

        fn create(&mut self, id: ObjectId, ctx: &mut WorldCtx<'_, E>) -> Result<(), CreateError> {
            let tag = FixtureTag::new(id, GameObject::<E>::kind(self));
            let (body, _) = ctx.physics.create_body_with(
                &BodyDef::new(BodyKind::Static, self.pos),
                &[FixtureDef::new(Shape::rect(self.size.x, self.size.y), tag)],
            )?;
            self.body = Some(body);
            Ok(())
        }

        fn remove(&mut self, ctx: &mut WorldCtx<'_, E>, _cause: RemoveCause) {
            if let Some(body) = self.body.take() {
                ctx.physics.queue_destroy(body);
            }
        }

        fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
            serde_json::to_value(self)
        }

        game_object_boilerplate!(body);
    }

    impl HasBody for TestCrate {
        fn body(&self) -> Option<BodyHandle> {
            self.body
        }
    }

    static LABEL_PROPS: [PropertySpec; 1] = [PropertySpec::required("label", PropertyKind::Text)];

    /// Registry with a draggable `crate` (max 2), a `label` kind requiring a
    /// `label` property and a transient `spark`.
    pub fn test_registry<E: 'static>() -> ObjectRegistry<E> {
        let mut registry = ObjectRegistry::new();
        registry.register(TestCrate::vtable());
        registry.register(ObjectVTable {
            kind: TestCrate::LABELLED,
            name: "label",
            meta: ObjectMeta::placed().with_properties(&LABEL_PROPS),
            construct: |params| {
                Ok(Box::new(TestCrate {
                    flavor: Flavor::Labelled,
                    ..TestCrate::new(params.pos, Vec2::ONE)
                }))
            },
            deserialize: |data| {
                let mut c: TestCrate = serde_json::from_value(data.clone())?;
                c.flavor = Flavor::Labelled;
                Ok(Box::new(c))
            },
            drag_preview: None,
        });
        registry.register(ObjectVTable {
            kind: TestCrate::SPARK,
            name: "spark",
            meta: ObjectMeta::transient(),
            construct: |_| Ok(Box::new(TestCrate::spark())),
            deserialize: |data| {
                let mut c: TestCrate = serde_json::from_value(data.clone())?;
                c.flavor = Flavor::Spark;
                Ok(Box::new(c))
            },
            drag_preview: None,
        });
        registry
    }
}
