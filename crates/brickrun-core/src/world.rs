use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::contact::perspectives;
use crate::error::CreateError;
use crate::input::ActionState;
use crate::object::{GameObject, KindTag, ObjectId, RemoveCause, Visual};
use crate::physics::{BodyHandle, ContactReport, PhysicsWorld};

/// Spawns and removals can cascade (a removal spawning a replacement); cap the
/// rounds applied per frame so a misbehaving object cannot hang the loop.
const MAX_COMMAND_ROUNDS: usize = 8;

/// Structural changes requested while objects are being iterated.
pub struct Commands<E> {
    spawns: Vec<(ObjectId, Box<dyn GameObject<E>>)>,
    removals: Vec<(ObjectId, RemoveCause)>,
    pause: Option<bool>,
}

impl<E> Default for Commands<E> {
    fn default() -> Self {
        Self {
            spawns: Vec::new(),
            removals: Vec::new(),
            pause: None,
        }
    }
}

impl<E> Commands<E> {
    fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.removals.is_empty() && self.pause.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    kind: KindTag,
    body: Option<BodyHandle>,
}

/// Read-only lookup of live objects by id, usable while objects are iterated.
#[derive(Debug, Default)]
pub struct Directory {
    entries: BTreeMap<ObjectId, Entry>,
}

impl Directory {
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn kind_of(&self, id: ObjectId) -> Option<KindTag> {
        self.entries.get(&id).map(|e| e.kind)
    }

    pub fn body_of(&self, id: ObjectId) -> Option<BodyHandle> {
        self.entries.get(&id).and_then(|e| e.body)
    }

    /// Oldest live object of the given kind.
    pub fn first_of_kind(&self, kind: KindTag) -> Option<ObjectId> {
        self.entries
            .iter()
            .find(|(_, e)| e.kind == kind)
            .map(|(id, _)| *id)
    }

    pub fn ids_of_kind(&self, kind: KindTag) -> Vec<ObjectId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an object sees of the world while it is being called.
pub struct WorldCtx<'a, E> {
    pub physics: &'a mut PhysicsWorld,
    pub input: &'a ActionState,
    pub directory: &'a Directory,
    commands: &'a mut Commands<E>,
    events: &'a mut Vec<E>,
    next_id: &'a mut u64,
    tick: u64,
    fixed_dt: f32,
    paused: bool,
}

impl<E> WorldCtx<'_, E> {
    /// Queue a new object; it is created after the current iteration.
    pub fn spawn(&mut self, object: Box<dyn GameObject<E>>) -> ObjectId {
        let id = allocate(self.next_id);
        self.commands.spawns.push((id, object));
        id
    }

    /// Queue removal of a live object (possibly the caller itself).
    pub fn remove(&mut self, id: ObjectId, cause: RemoveCause) {
        if !self.commands.removals.iter().any(|(queued, _)| *queued == id) {
            self.commands.removals.push((id, cause));
        }
    }

    pub fn pause(&mut self) {
        self.commands.pause = Some(true);
    }

    pub fn resume(&mut self) {
        self.commands.pause = Some(false);
    }

    pub fn emit(&mut self, event: E) {
        self.events.push(event);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current physics position of another live object.
    pub fn position_of(&self, id: ObjectId) -> Option<Vec2> {
        self.directory
            .body_of(id)
            .and_then(|body| self.physics.position(body))
    }
}

fn allocate(next_id: &mut u64) -> ObjectId {
    let id = ObjectId(*next_id);
    *next_id += 1;
    id
}

struct Slot<E> {
    id: ObjectId,
    object: Box<dyn GameObject<E>>,
}

/// Owns the physics simulation and the live game objects.
///
/// Objects are updated in insertion order. Structural changes requested during
/// iteration are queued in [`Commands`] and applied once the pass finishes.
pub struct World<E> {
    physics: PhysicsWorld,
    slots: Vec<Slot<E>>,
    index: HashMap<ObjectId, usize>,
    directory: Directory,
    input: ActionState,
    commands: Commands<E>,
    events: Vec<E>,
    next_id: u64,
    tick: u64,
    fixed_dt: f32,
    paused: bool,
}

impl<E: 'static> World<E> {
    pub fn new(config: &EngineConfig) -> Self {
        let fixed_dt = config.timing.tick_secs() as f32;
        Self {
            physics: PhysicsWorld::new(&config.physics, fixed_dt),
            slots: Vec::new(),
            index: HashMap::new(),
            directory: Directory::default(),
            input: ActionState::new(),
            commands: Commands::default(),
            events: Vec::new(),
            next_id: 1,
            tick: 0,
            fixed_dt,
            paused: false,
        }
    }

    fn split(&mut self) -> (&mut Vec<Slot<E>>, WorldCtx<'_, E>) {
        let ctx = WorldCtx {
            physics: &mut self.physics,
            input: &self.input,
            directory: &self.directory,
            commands: &mut self.commands,
            events: &mut self.events,
            next_id: &mut self.next_id,
            tick: self.tick,
            fixed_dt: self.fixed_dt,
            paused: self.paused,
        };
        (&mut self.slots, ctx)
    }

    /// Create and append an object. Nothing is appended when `create` fails.
    pub fn add_entity<T: GameObject<E>>(&mut self, object: T) -> Result<ObjectId, CreateError> {
        self.add_boxed(Box::new(object))
    }

    pub fn add_boxed(&mut self, object: Box<dyn GameObject<E>>) -> Result<ObjectId, CreateError> {
        let id = allocate(&mut self.next_id);
        self.insert(id, object)?;
        self.apply_commands();
        Ok(id)
    }

    fn insert(&mut self, id: ObjectId, mut object: Box<dyn GameObject<E>>) -> Result<(), CreateError> {
        {
            let (_, mut ctx) = self.split();
            object.create(id, &mut ctx)?;
        }
        let entry = Entry {
            kind: object.kind(),
            body: object.as_body().and_then(|b| b.body()),
        };
        self.directory.entries.insert(id, entry);
        self.index.insert(id, self.slots.len());
        self.slots.push(Slot { id, object });
        trace!(%id, kind = entry.kind.0, "object created");
        Ok(())
    }

    /// Remove an object immediately. Returns false when `id` is not live.
    ///
    /// Must not be called from inside an object callback; use
    /// [`WorldCtx::remove`] there.
    pub fn remove_entity(&mut self, id: ObjectId, cause: RemoveCause) -> bool {
        let Some(pos) = self.index.get(&id).copied() else {
            trace!(%id, "remove of unknown object ignored");
            return false;
        };
        let mut slot = self.slots.remove(pos);
        {
            let (_, mut ctx) = self.split();
            slot.object.remove(&mut ctx, cause);
        }
        self.directory.entries.remove(&id);
        self.reindex();
        trace!(%id, ?cause, "object removed");
        true
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, slot) in self.slots.iter().enumerate() {
            self.index.insert(slot.id, pos);
        }
    }

    /// Remove every object and flush their bodies.
    pub fn clear(&mut self) {
        while let Some(id) = self.slots.last().map(|s| s.id) {
            self.remove_entity(id, RemoveCause::Unload);
        }
        self.commands = Commands::default();
        self.physics.flush_destroyed();
        self.paused = false;
    }

    /// One fixed tick: step, flush, dispatch contacts, per-object fixed update.
    pub fn fixed_update(&mut self) {
        if self.paused {
            self.apply_commands();
            return;
        }
        let report = self.physics.step();
        self.physics.flush_destroyed();
        self.dispatch_contacts(&report);

        {
            let (slots, mut ctx) = self.split();
            for slot in slots.iter_mut() {
                slot.object.fixed_update(&mut ctx);
            }
        }
        self.apply_commands();
        self.tick += 1;
    }

    fn dispatch_contacts(&mut self, report: &ContactReport) {
        for record in &report.records {
            for view in perspectives(record, report.step) {
                let Some(pos) = self.index.get(&view.mine.owner).copied() else {
                    continue;
                };
                if let Some(reactive) = self.slots[pos].object.as_contact_reactive() {
                    reactive.on_contact(&view);
                }
            }
        }
    }

    /// Once per render frame.
    pub fn update(&mut self, dt: f32) {
        {
            let paused = self.paused;
            let (slots, mut ctx) = self.split();
            for slot in slots.iter_mut() {
                if paused {
                    slot.object.paused_update(dt, &mut ctx);
                } else {
                    slot.object.update(dt, &mut ctx);
                }
            }
        }
        self.apply_commands();
        self.input.end_frame();
    }

    fn apply_commands(&mut self) {
        for _ in 0..MAX_COMMAND_ROUNDS {
            if self.commands.is_empty() {
                return;
            }
            let commands = std::mem::take(&mut self.commands);
            if let Some(paused) = commands.pause {
                if paused != self.paused {
                    debug!(paused, "world pause toggled");
                }
                self.paused = paused;
            }
            for (id, cause) in commands.removals {
                self.remove_entity(id, cause);
            }
            for (id, object) in commands.spawns {
                if let Err(e) = self.insert(id, object) {
                    warn!(%id, "spawned object failed to create: {e}");
                }
            }
        }
        if !self.commands.is_empty() {
            warn!("command cascade did not settle, deferring to next frame");
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    /// Live ids in update order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    pub fn get(&self, id: ObjectId) -> Option<&dyn GameObject<E>> {
        let pos = *self.index.get(&id)?;
        Some(self.slots[pos].object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut dyn GameObject<E>> {
        let pos = *self.index.get(&id)?;
        Some(self.slots[pos].object.as_mut())
    }

    /// Downcast a live object to its concrete type.
    pub fn get_as<T: GameObject<E>>(&self, id: ObjectId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: GameObject<E>>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn count_kind(&self, kind: KindTag) -> usize {
        self.slots.iter().filter(|s| s.object.kind() == kind).count()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Objects in update order, for serialization.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &dyn GameObject<E>)> {
        self.slots.iter().map(|s| (s.id, s.object.as_ref()))
    }

    /// Render state of every drawable object, in update order.
    pub fn visuals(&self) -> Vec<(ObjectId, Visual)> {
        self.slots
            .iter()
            .filter_map(|s| s.object.as_sprite().map(|sprite| (s.id, sprite.visual())))
            .filter(|(_, v)| v.visible)
            .collect()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn input(&self) -> &ActionState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut ActionState {
        &mut self.input
    }

    /// Drain game events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::contact::Contact;
    use crate::game_object_boilerplate;
    use crate::object::{ContactReactive, HasBody, HasSprite};
    use crate::physics::{BodyDef, BodyKind, FixtureDef, FixtureTag, Shape};
    use crate::test_helpers::test_world;

    const BOX: KindTag = KindTag(1);
    const FLOOR: KindTag = KindTag(2);

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every lifecycle call; optionally removes itself or spawns a
    /// sibling on its first update.
    struct Probe {
        log: Log,
        name: &'static str,
        id: ObjectId,
        body: Option<BodyHandle>,
        dynamic: bool,
        remove_self: bool,
        remove_other: Option<ObjectId>,
        spawn_sibling: bool,
        contacts: usize,
    }

    impl Probe {
        fn new(log: &Log, name: &'static str) -> Self {
            Self {
                log: Rc::clone(log),
                name,
                id: ObjectId(0),
                body: None,
                dynamic: false,
                remove_self: false,
                remove_other: None,
                spawn_sibling: false,
                contacts: 0,
            }
        }

        fn push(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}:{what}", self.name));
        }
    }

    impl GameObject<String> for Probe {
        fn kind(&self) -> KindTag {
            if self.dynamic { BOX } else { FLOOR }
        }

        fn create(&mut self, id: ObjectId, ctx: &mut WorldCtx<'_, String>) -> Result<(), CreateError> {
            self.id = id;
            let (kind, pos, shape) = if self.dynamic {
                (BodyKind::Dynamic, Vec2::new(0.0, 1.5), Shape::rect(1.0, 1.0))
            } else {
                (BodyKind::Static, Vec2::ZERO, Shape::rect(10.0, 1.0))
            };
            let (body, _) = ctx.physics.create_body_with(
                &BodyDef::new(kind, pos),
                &[FixtureDef::new(shape, FixtureTag::new(id, self.kind()))],
            )?;
            self.body = Some(body);
            self.push("create");
            Ok(())
        }

        fn update(&mut self, _dt: f32, ctx: &mut WorldCtx<'_, String>) {
            self.push("update");
            if self.remove_self {
                ctx.remove(self.id, RemoveCause::Gameplay);
                ctx.emit(format!("{} left", self.name));
            }
            if let Some(other) = self.remove_other.take() {
                ctx.remove(other, RemoveCause::Gameplay);
            }
            if self.spawn_sibling {
                self.spawn_sibling = false;
                ctx.spawn(Box::new(Probe::new(&self.log, "child")));
            }
        }

        fn paused_update(&mut self, _dt: f32, _ctx: &mut WorldCtx<'_, String>) {
            self.push("paused");
        }

        fn fixed_update(&mut self, _ctx: &mut WorldCtx<'_, String>) {
            self.push("fixed");
        }

        fn remove(&mut self, ctx: &mut WorldCtx<'_, String>, _cause: RemoveCause) {
            if let Some(body) = self.body {
                ctx.physics.queue_destroy(body);
            }
            self.push("remove");
        }

        fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
            Ok(serde_json::json!({ "name": self.name }))
        }

        game_object_boilerplate!(body, sprite, contact);
    }

    impl HasBody for Probe {
        fn body(&self) -> Option<BodyHandle> {
            self.body
        }
    }

    impl HasSprite for Probe {
        fn visual(&self) -> Visual {
            Visual::new(self.name)
        }
    }

    impl ContactReactive for Probe {
        fn on_contact(&mut self, _contact: &Contact) {
            self.contacts += 1;
        }
    }

    struct Broken;

    impl GameObject<String> for Broken {
        fn kind(&self) -> KindTag {
            KindTag(99)
        }

        fn create(&mut self, _id: ObjectId, _ctx: &mut WorldCtx<'_, String>) -> Result<(), CreateError> {
            Err(CreateError::ZeroLengthDrag)
        }

        fn remove(&mut self, _ctx: &mut WorldCtx<'_, String>, _cause: RemoveCause) {}

        fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
            Ok(serde_json::Value::Null)
        }

        game_object_boilerplate!();
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn add_update_remove_in_order() {
        let log = log();
        let mut world = test_world::<String>();
        let a = world.add_entity(Probe::new(&log, "a")).unwrap();
        let b = world.add_entity(Probe::new(&log, "b")).unwrap();
        assert_eq!(world.ids(), vec![a, b]);
        assert!(a < b);

        world.update(0.016);
        assert!(world.remove_entity(a, RemoveCause::Editor));
        assert!(!world.remove_entity(a, RemoveCause::Editor));
        assert_eq!(world.ids(), vec![b]);
        assert_eq!(
            *log.borrow(),
            vec!["a:create", "b:create", "a:update", "b:update", "a:remove"]
        );
    }

    #[test]
    fn failed_create_appends_nothing() {
        let mut world = test_world::<String>();
        assert_eq!(world.add_entity(Broken), Err(CreateError::ZeroLengthDrag));
        assert!(world.is_empty());
    }

    #[test]
    fn self_removal_during_update_is_deferred() {
        let log = log();
        let mut world = test_world::<String>();
        let mut quitter = Probe::new(&log, "q");
        quitter.remove_self = true;
        let q = world.add_entity(quitter).unwrap();
        let s = world.add_entity(Probe::new(&log, "s")).unwrap();

        world.update(0.016);
        assert!(!world.contains(q));
        assert!(world.contains(s));
        assert_eq!(world.take_events(), vec!["q left".to_string()]);
        assert!(world.take_events().is_empty());
        // the survivor was still updated in the same pass
        assert!(log.borrow().contains(&"s:update".to_string()));
        // the body is only queued; the next step flushes it
        world.fixed_update();
        assert_eq!(world.physics().body_count(), 1);
    }

    #[test]
    fn removing_a_neighbour_during_update_is_deferred() {
        let log = log();
        let mut world = test_world::<String>();
        let a = world.add_entity(Probe::new(&log, "a")).unwrap();
        let b = world.add_entity(Probe::new(&log, "b")).unwrap();
        let c = world.add_entity(Probe::new(&log, "c")).unwrap();
        let d = world.add_entity(Probe::new(&log, "d")).unwrap();
        // a removes a later slot, d an earlier one
        world.get_as_mut::<Probe>(a).unwrap().remove_other = Some(c);
        world.get_as_mut::<Probe>(d).unwrap().remove_other = Some(b);

        world.update(0.016);
        assert_eq!(world.ids(), vec![a, d]);
        let log = log.borrow();
        let updates: Vec<_> = log.iter().filter(|l| l.ends_with(":update")).collect();
        assert_eq!(updates, ["a:update", "b:update", "c:update", "d:update"]);
        assert!(log.contains(&"b:remove".to_string()));
        assert!(log.contains(&"c:remove".to_string()));
    }

    #[test]
    fn spawn_from_update_lands_after_the_pass() {
        let log = log();
        let mut world = test_world::<String>();
        let mut parent = Probe::new(&log, "p");
        parent.spawn_sibling = true;
        world.add_entity(parent).unwrap();

        world.update(0.016);
        assert_eq!(world.len(), 2);
        assert_eq!(
            *log.borrow(),
            vec!["p:create", "p:update", "child:create"]
        );
    }

    #[test]
    fn paused_world_runs_paused_update_and_freezes_physics() {
        let log = log();
        let mut world = test_world::<String>();
        let id = world.add_entity(Probe::new(&log, "a")).unwrap();
        world.pause();
        world.update(0.016);
        world.fixed_update();
        assert_eq!(world.tick(), 0);
        assert_eq!(*log.borrow(), vec!["a:create", "a:paused"]);

        world.resume();
        world.fixed_update();
        assert_eq!(world.tick(), 1);
        assert!(world.get_as::<Probe>(id).is_some());
    }

    #[test]
    fn contacts_reach_both_parties_and_stale_owners_are_ignored() {
        let log = log();
        let mut world = test_world::<String>();
        let floor = world.add_entity(Probe::new(&log, "floor")).unwrap();
        let mut falling = Probe::new(&log, "box");
        falling.dynamic = true;
        let b = world.add_entity(falling).unwrap();

        for _ in 0..60 {
            world.fixed_update();
        }
        assert!(world.get_as::<Probe>(floor).unwrap().contacts > 0);
        assert!(world.get_as::<Probe>(b).unwrap().contacts > 0);
        assert_eq!(world.count_kind(BOX), 1);
        assert_eq!(world.directory().first_of_kind(FLOOR), Some(floor));

        world.remove_entity(floor, RemoveCause::Gameplay);
        for _ in 0..5 {
            world.fixed_update();
        }
        assert_eq!(world.len(), 1);
        assert_eq!(world.visuals().len(), 1);
    }

    #[test]
    fn clear_empties_world_and_physics() {
        let log = log();
        let mut world = test_world::<String>();
        world.add_entity(Probe::new(&log, "a")).unwrap();
        world.add_entity(Probe::new(&log, "b")).unwrap();
        world.clear();
        assert!(world.is_empty());
        assert_eq!(world.physics().body_count(), 0);
        assert!(world.directory().is_empty());
    }
}
