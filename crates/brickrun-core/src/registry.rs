use std::collections::HashMap;

use glam::Vec2;
use serde_json::Value;
use tracing::warn;

use crate::error::{CreateError, LevelError};
use crate::level::SerializedGo;
use crate::object::{GameObject, KindTag, ObjectId};
use crate::world::World;

/// Editor-facing property type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    Text,
    Number,
    Flag,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub required: bool,
}

impl PropertySpec {
    pub const fn optional(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    pub const fn required(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }
}

/// Static per-kind metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectMeta {
    /// Placed by dragging from `drag_start` to `drag_end` instead of a click.
    pub draggable: bool,
    pub max_instances: Option<usize>,
    /// Runtime-only objects (projectiles) that are never written to a level.
    pub transient: bool,
    pub properties: &'static [PropertySpec],
}

impl ObjectMeta {
    pub const fn placed() -> Self {
        Self {
            draggable: false,
            max_instances: None,
            transient: false,
            properties: &[],
        }
    }

    pub const fn dragged() -> Self {
        Self {
            draggable: true,
            ..Self::placed()
        }
    }

    pub const fn transient() -> Self {
        Self {
            transient: true,
            ..Self::placed()
        }
    }

    pub const fn with_max(mut self, max: usize) -> Self {
        self.max_instances = Some(max);
        self
    }

    pub const fn with_properties(mut self, properties: &'static [PropertySpec]) -> Self {
        self.properties = properties;
        self
    }
}

/// Parameters the editor collects before constructing an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonParams {
    pub pos: Vec2,
    /// Outline drawn by the user, for freeform geometry.
    pub shape: Vec<Vec2>,
    pub drag_start: Vec2,
    pub drag_end: Vec2,
    pub properties: HashMap<String, Value>,
}

impl CommonParams {
    pub fn at(pos: Vec2) -> Self {
        Self {
            pos,
            drag_start: pos,
            drag_end: pos,
            ..Self::default()
        }
    }

    pub fn dragged(start: Vec2, end: Vec2) -> Self {
        Self {
            pos: start,
            drag_start: start,
            drag_end: end,
            ..Self::default()
        }
    }

    pub fn with_shape(mut self, shape: Vec<Vec2>) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Drag vector, rejecting a click-without-drag.
    pub fn drag(&self) -> Result<Vec2, CreateError> {
        let delta = self.drag_end - self.drag_start;
        if delta.length_squared() <= f32::EPSILON {
            return Err(CreateError::ZeroLengthDrag);
        }
        Ok(delta)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    pub fn require_text(&self, name: &str) -> Result<&str, CreateError> {
        match self.properties.get(name) {
            None => Err(CreateError::MissingProperty(name.to_string())),
            Some(v) => v.as_str().ok_or_else(|| CreateError::InvalidProperty {
                name: name.to_string(),
                reason: format!("expected text, got {v}"),
            }),
        }
    }

    pub fn number(&self, name: &str) -> Result<Option<f32>, CreateError> {
        match self.properties.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(|n| Some(n as f32))
                .ok_or_else(|| CreateError::InvalidProperty {
                    name: name.to_string(),
                    reason: format!("expected number, got {v}"),
                }),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

pub type ConstructFn<E> = fn(&CommonParams) -> Result<Box<dyn GameObject<E>>, CreateError>;
pub type DeserializeFn<E> = fn(&Value) -> Result<Box<dyn GameObject<E>>, serde_json::Error>;
pub type DragPreviewFn = fn(&CommonParams) -> Vec<Vec2>;

/// Everything the engine knows about one object kind.
pub struct ObjectVTable<E> {
    pub kind: KindTag,
    pub name: &'static str,
    pub meta: ObjectMeta,
    pub construct: ConstructFn<E>,
    pub deserialize: DeserializeFn<E>,
    pub drag_preview: Option<DragPreviewFn>,
}

/// Registration table mapping kind tags and names to constructors.
///
/// Built once at startup and passed by reference to the level loader and the
/// editor.
pub struct ObjectRegistry<E> {
    entries: Vec<ObjectVTable<E>>,
    by_kind: HashMap<KindTag, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl<E> Default for ObjectRegistry<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_kind: HashMap::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<E: 'static> ObjectRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind. A later registration for the same kind or name replaces the
    /// earlier one.
    pub fn register(&mut self, vtable: ObjectVTable<E>) {
        let existing = self
            .by_kind
            .get(&vtable.kind)
            .or_else(|| self.by_name.get(vtable.name))
            .copied();
        match existing {
            Some(idx) => {
                warn!(name = vtable.name, "object kind registered twice, replacing");
                let old = &self.entries[idx];
                self.by_kind.remove(&old.kind);
                self.by_name.remove(old.name);
                self.by_kind.insert(vtable.kind, idx);
                self.by_name.insert(vtable.name, idx);
                self.entries[idx] = vtable;
            },
            None => {
                let idx = self.entries.len();
                self.by_kind.insert(vtable.kind, idx);
                self.by_name.insert(vtable.name, idx);
                self.entries.push(vtable);
            },
        }
    }

    pub fn get(&self, kind: KindTag) -> Option<&ObjectVTable<E>> {
        self.by_kind.get(&kind).map(|&idx| &self.entries[idx])
    }

    pub fn by_name(&self, name: &str) -> Option<&ObjectVTable<E>> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// Registered kinds in registration order (editor palette order).
    pub fn entries(&self) -> impl Iterator<Item = &ObjectVTable<E>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Editor entry point: build a fresh object from user parameters.
    pub fn construct(
        &self,
        kind: KindTag,
        params: &CommonParams,
    ) -> Result<Box<dyn GameObject<E>>, CreateError> {
        let vtable = self.get(kind).ok_or(CreateError::UnknownKind(kind.0))?;
        for spec in vtable.meta.properties.iter().filter(|p| p.required) {
            if !params.properties.contains_key(spec.name) {
                return Err(CreateError::MissingProperty(spec.name.to_string()));
            }
        }
        (vtable.construct)(params)
    }

    /// Editor placement: construct, enforce the instance limit, add to `world`.
    pub fn place(
        &self,
        world: &mut World<E>,
        kind: KindTag,
        params: &CommonParams,
    ) -> Result<ObjectId, CreateError> {
        let object = self.construct(kind, params)?;
        if let Some(max) = self.get(kind).and_then(|v| v.meta.max_instances)
            && world.count_kind(kind) >= max
        {
            return Err(CreateError::InstanceLimit { kind: kind.0, max });
        }
        world.add_boxed(object)
    }

    /// Outline to draw while the user drags; empty for click-placed kinds.
    pub fn drag_preview(&self, kind: KindTag, params: &CommonParams) -> Vec<Vec2> {
        self.get(kind)
            .and_then(|v| v.drag_preview)
            .map(|preview| preview(params))
            .unwrap_or_default()
    }

    pub fn serialize(&self, object: &dyn GameObject<E>) -> Result<SerializedGo, LevelError> {
        let kind = object.kind();
        let vtable = self
            .get(kind)
            .ok_or_else(|| LevelError::UnknownKind(format!("kind {}", kind.0)))?;
        let data = object.serialize().map_err(LevelError::Encode)?;
        Ok(SerializedGo {
            kind: vtable.name.to_string(),
            data,
        })
    }

    pub fn deserialize(&self, record: &SerializedGo) -> Result<Box<dyn GameObject<E>>, LevelError> {
        let vtable = self
            .by_name(&record.kind)
            .ok_or_else(|| LevelError::UnknownKind(record.kind.clone()))?;
        (vtable.deserialize)(&record.data).map_err(|e| LevelError::InvalidData {
            kind: record.kind.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestCrate, test_registry, test_world};

    #[test]
    fn lookup_by_kind_and_name() {
        let registry = test_registry::<()>();
        let by_name = registry.by_name("crate").unwrap();
        assert_eq!(by_name.kind, TestCrate::KIND);
        assert_eq!(registry.get(TestCrate::KIND).unwrap().name, "crate");
        assert!(registry.by_name("nope").is_none());
    }

    #[test]
    fn construct_checks_required_properties() {
        let registry = test_registry::<()>();
        let params = CommonParams::at(Vec2::ZERO);
        assert!(matches!(
            registry.construct(TestCrate::LABELLED, &params),
            Err(CreateError::MissingProperty(name)) if name == "label"
        ));
        let params = params.with_property("label", "hello");
        assert!(registry.construct(TestCrate::LABELLED, &params).is_ok());
        assert!(matches!(
            registry.construct(KindTag(999), &params),
            Err(CreateError::UnknownKind(999))
        ));
    }

    #[test]
    fn place_enforces_instance_limit() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        let drag = |x: f32| CommonParams::dragged(Vec2::new(x, 0.0), Vec2::new(x + 1.0, 1.0));
        registry.place(&mut world, TestCrate::KIND, &drag(0.0)).unwrap();
        registry.place(&mut world, TestCrate::KIND, &drag(3.0)).unwrap();
        assert_eq!(
            registry.place(&mut world, TestCrate::KIND, &drag(6.0)),
            Err(CreateError::InstanceLimit {
                kind: TestCrate::KIND.0,
                max: 2
            })
        );
        assert_eq!(world.len(), 2);
        assert_eq!(
            registry.place(&mut world, TestCrate::KIND, &CommonParams::at(Vec2::ZERO)),
            Err(CreateError::ZeroLengthDrag)
        );
    }

    #[test]
    fn reregistering_replaces() {
        let mut registry = test_registry::<()>();
        let before = registry.len();
        registry.register(TestCrate::vtable());
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn drag_helpers() {
        let click = CommonParams::at(Vec2::new(1.0, 1.0));
        assert_eq!(click.drag(), Err(CreateError::ZeroLengthDrag));
        let drag = CommonParams::dragged(Vec2::ZERO, Vec2::new(3.0, 0.0));
        assert_eq!(drag.drag(), Ok(Vec2::new(3.0, 0.0)));

        let registry = test_registry::<()>();
        assert_eq!(registry.drag_preview(TestCrate::KIND, &drag).len(), 4);
        assert!(registry.drag_preview(TestCrate::LABELLED, &drag).is_empty());
    }

    #[test]
    fn typed_property_access() {
        let params = CommonParams::default()
            .with_property("speed", 2.5)
            .with_property("name", "pipe")
            .with_property("hidden", true);
        assert_eq!(params.number("speed"), Ok(Some(2.5)));
        assert_eq!(params.number("missing"), Ok(None));
        assert!(params.number("name").is_err());
        assert_eq!(params.text("name"), Some("pipe"));
        assert!(params.flag("hidden"));
        assert!(!params.flag("speed"));
    }
}
