//! The engine: an [`EntityIndex`] and [`TableIndex`] pair, and the step
//! transaction that mutates them.
//!
//! Reads during a step's body go straight to the pre-step snapshot; writes
//! are appended to a lock-free [`crossbeam::queue::SegQueue`] and applied,
//! strictly in enqueue order, only after the body returns. This mirrors the
//! `CommandBuffer`/`flush` split the teacher's own `ecs::system::command`
//! module uses for exactly the same reason — parallel systems can't take
//! exclusive world access, so they submit commands instead.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use crossbeam::queue::SegQueue;

use crate::ecs::component::{Component, Value};
use crate::ecs::entity::{Entity, EntityIndex, Location};
use crate::ecs::error::{Error, Result};
use crate::ecs::query::Query;
use crate::ecs::signature::Signature;
use crate::ecs::storage::TableIndex;

/// A deferred structural mutation, enqueued during a step's body and
/// applied at drain time in strict FIFO order.
enum Command {
    DestroyEntity(Entity),
    AddComponent(Entity, Component, Value),
    RemoveComponent(Entity, Component),
    SetComponent(Entity, Component, Value),
}

struct Storage {
    entities: EntityIndex,
    tables: TableIndex,
}

impl Storage {
    fn new() -> Self {
        Self { entities: EntityIndex::new(), tables: TableIndex::new() }
    }

    fn signature_of(&self, e: Entity) -> Option<&Signature> {
        let location = self.entities.get(e)?;
        self.tables.get_by_id(location.table).map(|t| t.signature())
    }

    fn has_component(&self, e: Entity, c: Component) -> Result<bool> {
        let location = self.entities.get(e).ok_or(Error::InvalidEntity(e))?;
        let table = self.tables.get_by_id(location.table).expect("entity location must resolve to a table");
        Ok(table.column_index(c).is_some())
    }

    fn get_component(&self, e: Entity, c: Component) -> Result<Value> {
        let location = self.entities.get(e).ok_or(Error::InvalidEntity(e))?;
        let table = self.tables.get_by_id(location.table).expect("entity location must resolve to a table");
        let column = table.column_index(c).ok_or(Error::MissingComponent(e, c))?;
        table.get(location.row, column).map(|v| v.clone())
    }
}

/// The storage core's transactional engine.
///
/// Exactly one [`Engine::step`] may run at a time across the whole process;
/// a second concurrent attempt fails fast with [`Error::ConcurrentStep`]
/// rather than blocking.
pub struct Engine {
    storage: RwLock<Storage>,
    busy: AtomicBool,
}

impl Engine {
    /// Construct a new, empty engine.
    pub fn new() -> Self {
        Self { storage: RwLock::new(Storage::new()), busy: AtomicBool::new(false) }
    }

    /// Whether `e` currently resolves to a live location.
    pub fn exists(&self, e: Entity) -> bool {
        self.storage.read().unwrap().entities.exists(e)
    }

    /// Whether `e` carries component `c`.
    pub fn has_component(&self, e: Entity, c: Component) -> Result<bool> {
        self.storage.read().unwrap().has_component(e, c)
    }

    /// Read `e`'s value for `c`.
    ///
    /// # Errors
    /// [`Error::InvalidEntity`] if `e` is not live; [`Error::MissingComponent`]
    /// if `e` does not carry `c`.
    pub fn get_component(&self, e: Entity, c: Component) -> Result<Value> {
        self.storage.read().unwrap().get_component(e, c)
    }

    /// Read `e`'s value for `c`, or `None` if either is absent.
    pub fn get_component_or_none(&self, e: Entity, c: Component) -> Option<Value> {
        self.get_component(e, c).ok()
    }

    /// Iterate over every entity whose archetype matches `query`, invoking
    /// `callback` with each. Must be called from within a step; reads bypass
    /// the deferred-command queue entirely.
    pub fn for_each(&self, query: &Query, mut callback: impl FnMut(Entity)) {
        let storage = self.storage.read().unwrap();
        for table in storage.tables.iter() {
            if !query.matches(table.signature()) {
                continue;
            }
            for entity in table.iter() {
                callback(entity);
            }
        }
    }

    /// Run `body` as a transactional step.
    ///
    /// Acquires single-step exclusivity, runs `body` inside a supervised
    /// `crossbeam` scope so that launched child tasks are joined before the
    /// step completes, then drains the deferred-command queue strictly in
    /// enqueue order.
    ///
    /// # Errors
    /// [`Error::ConcurrentStep`] if another step is already in progress.
    pub fn step<R: Send>(&self, body: impl FnOnce(&StepScope) -> R + Send) -> Result<R> {
        let _guard = BusyGuard::acquire(&self.busy)?;

        let first_entity = self.storage.read().unwrap().entities.draft();
        let scope = StepScope {
            engine: self,
            first_entity,
            next_draft: AtomicU32::new(first_entity.id()),
            commands: SegQueue::new(),
        };

        log::trace!("step acquired, first_entity={first_entity:?}");
        let result = crossbeam::thread::scope(|thread_scope| {
            thread_scope.spawn(|_| body(&scope)).join().expect("step body panicked")
        })
        .expect("step body's supervised scope panicked");

        self.drain(first_entity, &scope);
        log::trace!("step released");
        Ok(result)
    }

    fn drain(&self, first_entity: Entity, scope: &StepScope) {
        let mut storage = self.storage.write().unwrap();

        let drafted = scope.next_draft.load(Ordering::Relaxed) - first_entity.id();
        if drafted > 0 {
            let (first, last) = storage.entities.new_batch(drafted);
            debug_assert_eq!(first, first_entity);
            let empty_table = storage.tables.empty_table_id();
            for id in first.id()..=last.id() {
                let entity = Entity::new(id);
                let row = storage.tables.get_by_id_mut(empty_table).unwrap().add(entity);
                storage.entities.record_unsafe(entity, Location::new(empty_table, row));
            }
        }

        while let Some(command) = scope.commands.pop() {
            apply(&mut storage, command);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one drain-time command to `storage`.
///
/// Every command was already checked against the pre-step snapshot when its
/// `StepScope` method was called, so the checks here only catch a command
/// made stale by an earlier command in the *same* step's drain (e.g. an
/// entity destroyed, then mutated, within one step). That is not a wedged
/// engine — it is reported and the stale command is skipped, same as the
/// `DestroyEntity` no-op case below.
fn apply(storage: &mut Storage, command: Command) {
    match command {
        Command::DestroyEntity(e) => {
            if let Some(location) = storage.entities.remove(e) {
                storage.tables.destroy_row(location.table, location.row);
            } else {
                log::debug!("destroy_entity({e:?}) was a no-op: already destroyed");
            }
        }
        Command::AddComponent(e, c, v) => {
            if let Err(err) = storage.tables.add_component(&mut storage.entities, e, c, v) {
                log::warn!("deferred add_component({e:?}, {c:?}) could not be applied at drain: {err}");
            }
        }
        Command::RemoveComponent(e, c) => {
            if let Err(err) = storage.tables.remove_component(&mut storage.entities, e, c) {
                log::warn!("deferred remove_component({e:?}, {c:?}) could not be applied at drain: {err}");
            }
        }
        Command::SetComponent(e, c, v) => {
            let has_it = storage.signature_of(e).map(|sig| sig.contains(c)).unwrap_or(false);
            if has_it {
                let location = storage.entities.get(e).expect("signature_of confirmed liveness");
                let table = storage.tables.get_by_id_mut(location.table).unwrap();
                let column = table.column_index(c).expect("signature confirmed the column exists");
                table.set(location.row, column, v);
            } else if let Err(err) = storage.tables.add_component(&mut storage.entities, e, c, v) {
                log::warn!("deferred set_component({e:?}, {c:?}) could not be applied at drain: {err}");
            }
        }
    }
}

/// Releases the engine's busy flag on every exit path, including panic
/// unwind, so a step that fails mid-body can never wedge the engine.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(busy: &'a AtomicBool) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { busy })
            .map_err(|_| Error::ConcurrentStep)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// The view of the engine available inside a step's body.
///
/// Reads (`exists`, `has_component`, `get_component`, `for_each`) observe the
/// pre-step snapshot directly. Mutating calls are deferred: they enqueue a
/// [`Command`] applied at drain time, after the body returns.
pub struct StepScope<'a> {
    engine: &'a Engine,
    first_entity: Entity,
    next_draft: AtomicU32,
    commands: SegQueue<Command>,
}

impl StepScope<'_> {
    /// Reserve a fresh entity identifier.
    ///
    /// The identifier returned here is guaranteed to match what
    /// `entities.new_batch` assigns at drain: `next_draft` is seeded from the
    /// same `draft()` peek the drain phase starts from, and single-step
    /// exclusivity guarantees no other allocation can happen in between.
    pub fn new_entity(&self) -> Entity {
        Entity::new(self.next_draft.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether `e` was drafted earlier in *this* step.
    ///
    /// A fresh draft is not yet in `entities` — it is only committed to the
    /// empty-signature table at drain step 4a, before any command in step 4b
    /// runs — so the pre-step snapshot (`engine.exists`/`has_component`) has
    /// no way to see it. Such an entity is live by construction and carries
    /// no components yet, which the mutation methods below treat specially
    /// rather than misreporting it as `InvalidEntity`.
    fn is_fresh_draft(&self, e: Entity) -> bool {
        let next = self.next_draft.load(Ordering::Relaxed);
        e.id() >= self.first_entity.id() && e.id() < next
    }

    /// Whether `e` currently resolves to a live location (bypasses the queue).
    pub fn exists(&self, e: Entity) -> bool {
        self.engine.exists(e)
    }

    /// Whether `e` carries component `c` (bypasses the queue).
    pub fn has_component(&self, e: Entity, c: Component) -> Result<bool> {
        self.engine.has_component(e, c)
    }

    /// Read `e`'s value for `c` (bypasses the queue).
    pub fn get_component(&self, e: Entity, c: Component) -> Result<Value> {
        self.engine.get_component(e, c)
    }

    /// Read `e`'s value for `c`, or `None` if either is absent (bypasses the queue).
    pub fn get_component_or_none(&self, e: Entity, c: Component) -> Option<Value> {
        self.engine.get_component_or_none(e, c)
    }

    /// Iterate matching entities against the pre-step snapshot (bypasses the queue).
    pub fn for_each(&self, query: &Query, callback: impl FnMut(Entity)) {
        self.engine.for_each(query, callback)
    }

    /// Defer destruction of `e`. Idempotent: destroying twice is not an error.
    pub fn destroy_entity(&self, e: Entity) {
        self.commands.push(Command::DestroyEntity(e));
    }

    /// Defer adding `c = v` to `e`.
    ///
    /// Checked synchronously against the pre-step snapshot before the
    /// command is enqueued, consistent with §5's read-stability guarantee —
    /// the caller finds out immediately rather than the engine panicking (and
    /// poisoning its lock) at drain time. An `e` drafted earlier in this same
    /// step is not yet in that snapshot; it is treated as live and
    /// component-less, since drain always commits drafts (step 4a) before
    /// applying commands (step 4b).
    ///
    /// # Errors
    /// [`Error::InvalidEntity`] if `e` is not live; [`Error::DuplicateComponent`]
    /// if `e` already carries `c`.
    pub fn add_component(&self, e: Entity, c: Component, v: Value) -> Result<()> {
        if !self.is_fresh_draft(e) && self.engine.has_component(e, c)? {
            return Err(Error::DuplicateComponent(e, c));
        }
        self.commands.push(Command::AddComponent(e, c, v));
        Ok(())
    }

    /// Defer removing `c` from `e`.
    ///
    /// A same-step draft carries no components yet, so this always fails
    /// with `MissingComponent` for one rather than consulting the pre-step
    /// snapshot (which cannot see the draft at all).
    ///
    /// # Errors
    /// [`Error::InvalidEntity`] if `e` is not live; [`Error::MissingComponent`]
    /// if `e` does not carry `c`.
    pub fn remove_component(&self, e: Entity, c: Component) -> Result<()> {
        if self.is_fresh_draft(e) || !self.engine.has_component(e, c)? {
            return Err(Error::MissingComponent(e, c));
        }
        self.commands.push(Command::RemoveComponent(e, c));
        Ok(())
    }

    /// Defer writing `c = v` on `e`, in place if already present, else as an add.
    ///
    /// # Errors
    /// [`Error::InvalidEntity`] if `e` is not live.
    pub fn set_component(&self, e: Entity, c: Component, v: Value) -> Result<()> {
        if !self.is_fresh_draft(e) && !self.engine.exists(e) {
            return Err(Error::InvalidEntity(e));
        }
        self.commands.push(Command::SetComponent(e, c, v));
        Ok(())
    }
}
