use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LevelError;
use crate::object::{GameObject, ObjectId};
use crate::registry::ObjectRegistry;
use crate::world::World;

/// One persisted object: `{ "type": <kind name>, "data": <payload> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGo {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

pub fn parse_level(text: &str) -> Result<Vec<SerializedGo>, LevelError> {
    serde_json::from_str(text).map_err(LevelError::Parse)
}

/// Compact, newline-free JSON array.
pub fn encode_level(records: &[SerializedGo]) -> Result<String, LevelError> {
    serde_json::to_string(records).map_err(LevelError::Encode)
}

/// Serialize every persistent object in update order.
pub fn snapshot<E: 'static>(
    world: &World<E>,
    registry: &ObjectRegistry<E>,
) -> Result<Vec<SerializedGo>, LevelError> {
    let mut records = Vec::new();
    for (_, object) in world.objects() {
        let transient = registry
            .get(object.kind())
            .is_some_and(|v| v.meta.transient);
        if transient {
            continue;
        }
        records.push(registry.serialize(object)?);
    }
    Ok(records)
}

pub fn save_level<E: 'static>(
    world: &World<E>,
    registry: &ObjectRegistry<E>,
) -> Result<String, LevelError> {
    encode_level(&snapshot(world, registry)?)
}

/// Replace the world's contents with the level in `text`.
///
/// All records are parsed, deserialized and checked against instance limits
/// before the world is touched. If an object then fails to create, the world
/// is cleared again, so a failed load never leaves a partial level behind.
pub fn load_level<E: 'static>(
    world: &mut World<E>,
    registry: &ObjectRegistry<E>,
    text: &str,
) -> Result<Vec<ObjectId>, LevelError> {
    let records = parse_level(text)?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut objects: Vec<(String, Box<dyn GameObject<E>>)> = Vec::with_capacity(records.len());
    for record in &records {
        let object = registry.deserialize(record)?;
        let count = counts.entry(record.kind.as_str()).or_default();
        *count += 1;
        if let Some(max) = registry
            .by_name(&record.kind)
            .and_then(|v| v.meta.max_instances)
            && *count > max
        {
            return Err(LevelError::TooManyInstances {
                kind: record.kind.clone(),
                max,
            });
        }
        objects.push((record.kind.clone(), object));
    }

    world.clear();
    let mut ids = Vec::with_capacity(objects.len());
    for (kind, object) in objects {
        match world.add_boxed(object) {
            Ok(id) => ids.push(id),
            Err(source) => {
                warn!(%kind, "level load aborted: {source}");
                world.clear();
                return Err(LevelError::Create { kind, source });
            },
        }
    }
    debug!(objects = ids.len(), "level loaded");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::test_helpers::{TestCrate, test_registry, test_world};

    fn two_crates() -> String {
        r#"[{"type":"crate","data":{"pos":[0.0,0.0],"size":[1.0,1.0]}},{"type":"crate","data":{"pos":[3.0,0.0],"size":[2.0,1.0]}}]"#
            .to_string()
    }

    #[test]
    fn load_then_save_roundtrips() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        let ids = load_level(&mut world, &registry, &two_crates()).unwrap();
        assert_eq!(ids.len(), 2);

        let saved = save_level(&world, &registry).unwrap();
        assert!(!saved.contains('\n'));
        let before = parse_level(&two_crates()).unwrap();
        let after = parse_level(&saved).unwrap();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            let a: TestCrate = serde_json::from_value(a.data.clone()).unwrap();
            let b: TestCrate = serde_json::from_value(b.data.clone()).unwrap();
            assert!((a.pos - b.pos).length() < 1e-6);
            assert!((a.size - b.size).length() < 1e-6);
        }
    }

    #[test]
    fn unknown_kind_leaves_world_untouched() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        load_level(&mut world, &registry, &two_crates()).unwrap();

        let bad = r#"[{"type":"crate","data":{"pos":[0.0,0.0],"size":[1.0,1.0]}},{"type":"dragon","data":{}}]"#;
        let err = load_level(&mut world, &registry, bad).unwrap_err();
        assert!(matches!(err, LevelError::UnknownKind(ref k) if k == "dragon"));
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        assert!(matches!(
            load_level(&mut world, &registry, "not json"),
            Err(LevelError::Parse(_))
        ));
        let bad = r#"[{"type":"crate","data":{"pos":"left"}}]"#;
        assert!(matches!(
            load_level(&mut world, &registry, bad),
            Err(LevelError::InvalidData { .. })
        ));
    }

    #[test]
    fn instance_limit_is_enforced() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        let three = r#"[
            {"type":"crate","data":{"pos":[0.0,0.0],"size":[1.0,1.0]}},
            {"type":"crate","data":{"pos":[2.0,0.0],"size":[1.0,1.0]}},
            {"type":"crate","data":{"pos":[4.0,0.0],"size":[1.0,1.0]}}
        ]"#;
        assert!(matches!(
            load_level(&mut world, &registry, three),
            Err(LevelError::TooManyInstances { max: 2, .. })
        ));
        assert!(world.is_empty());
    }

    #[test]
    fn create_failure_rolls_back() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        let degenerate = r#"[
            {"type":"crate","data":{"pos":[0.0,0.0],"size":[1.0,1.0]}},
            {"type":"crate","data":{"pos":[2.0,0.0],"size":[0.0,1.0]}}
        ]"#;
        let err = load_level(&mut world, &registry, degenerate).unwrap_err();
        assert!(matches!(err, LevelError::Create { .. }));
        assert!(world.is_empty());
        assert_eq!(world.physics().body_count(), 0);
    }

    #[test]
    fn transient_objects_are_not_saved() {
        let registry = test_registry::<()>();
        let mut world = test_world::<()>();
        world
            .add_entity(TestCrate::new(Vec2::ZERO, Vec2::ONE))
            .unwrap();
        world.add_entity(TestCrate::spark()).unwrap();
        assert_eq!(snapshot(&world, &registry).unwrap().len(), 1);
    }
}
