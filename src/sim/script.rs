//! Behavior units and the executor that schedules them
//!
//! A unit is spawned from a registered type name, activated through one of N
//! double-buffered activation queues and finally killed through the kill
//! queue. Spawning is deferred: requests wait in a FIFO until the driver
//! drains them between queue runs.
//!
//! Requests issued while a queue is being run land in that queue's push list
//! and are only visited the next time the queue runs. This bounds the work of
//! one tick no matter what units do from inside their callbacks.

use std::any::Any;
use std::collections::{HashMap, VecDeque};

use super::body::Transform;
use super::slots::{OwnerId, SlotAllocator, SlotId};
use crate::config::KernelConfig;
use crate::error::{DrainError, KernelError, Result};

/// Downcasting support for boxed units.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A behavior unit driven by an [`Executor`].
///
/// `C` is the game context handed to every callback.
pub trait Script<C>: AsAny {
    /// Runs once, right before the first activation.
    fn on_init(&mut self, _cx: &mut ScriptCx<'_, C>) {}

    /// Runs on every activation of a unit that is not killed.
    fn on_activate(&mut self, cx: &mut ScriptCx<'_, C>);

    /// Runs exactly once when the unit is killed.
    fn on_kill(&mut self, _cx: &mut ScriptCx<'_, C>) {}
}

/// Names one unit inside the executor that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHandle {
    owner: OwnerId,
    slot: SlotId,
    generation: u32,
}

impl ScriptHandle {
    #[inline]
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

/// What an allocator is told about the unit it must produce.
#[derive(Debug, Clone, Copy)]
pub struct Spawn<'a> {
    pub handle: ScriptHandle,
    pub type_name: &'a str,
    /// Opaque routing value carried from the spawn request
    pub tag: u64,
    pub transform: Transform,
}

pub type Allocator<C> = Box<dyn FnMut(&Spawn<'_>, &mut C) -> Box<dyn Script<C>>>;
pub type Hook<C> = Box<dyn FnMut(ScriptHandle, &mut C)>;

/// How to build and classify units of one type name.
pub struct Registration<C> {
    group: i32,
    remove_on_kill: bool,
    allocator: Allocator<C>,
    on_spawn: Option<Hook<C>>,
    on_remove: Option<Hook<C>>,
}

impl<C> Registration<C> {
    pub fn new<F>(allocator: F) -> Self
    where
        F: FnMut(&Spawn<'_>, &mut C) -> Box<dyn Script<C>> + 'static,
    {
        Self {
            group: 0,
            remove_on_kill: false,
            allocator: Box::new(allocator),
            on_spawn: None,
            on_remove: None,
        }
    }

    pub fn group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    /// Free the slot as soon as the unit is killed
    pub fn remove_on_kill(mut self, remove: bool) -> Self {
        self.remove_on_kill = remove;
        self
    }

    pub fn on_spawn<F>(mut self, hook: F) -> Self
    where
        F: FnMut(ScriptHandle, &mut C) + 'static,
    {
        self.on_spawn = Some(Box::new(hook));
        self
    }

    pub fn on_remove<F>(mut self, hook: F) -> Self
    where
        F: FnMut(ScriptHandle, &mut C) + 'static,
    {
        self.on_remove = Some(Box::new(hook));
        self
    }
}

/// Read-only view of a unit's scheduler bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStatus {
    pub group: i32,
    pub initialized: bool,
    pub killed: bool,
    pub activation_pending: bool,
    pub kill_pending: bool,
    /// Queue the unit last ran in
    pub last_queue: Option<usize>,
}

#[derive(Debug, Clone)]
struct SpawnRequest {
    type_name: String,
    queue: Option<usize>,
    tag: u64,
    transform: Transform,
}

struct Record<C> {
    /// Empty only while one of the unit's own callbacks is running
    script: Option<Box<dyn Script<C>>>,
    type_name: String,
    group: i32,
    remove_on_kill: bool,
    last_queue: Option<usize>,
    initialized: bool,
    killed: bool,
    activation_pending: bool,
    kill_pending: bool,
}

impl<C> Record<C> {
    fn status(&self) -> ScriptStatus {
        ScriptStatus {
            group: self.group,
            initialized: self.initialized,
            killed: self.killed,
            activation_pending: self.activation_pending,
            kill_pending: self.kill_pending,
            last_queue: self.last_queue,
        }
    }
}

/// Push list filled during a tick, run list drained during a tick.
#[derive(Debug, Default)]
struct QueuePair {
    push: Vec<ScriptHandle>,
    run: Vec<ScriptHandle>,
}

impl QueuePair {
    /// Swap the buffers and hand out what was pushed so far.
    fn swap(&mut self) -> Vec<ScriptHandle> {
        std::mem::swap(&mut self.push, &mut self.run);
        std::mem::take(&mut self.run)
    }

    /// Give the drained run buffer back so its allocation is reused.
    fn recycle(&mut self, mut run: Vec<ScriptHandle>) {
        run.clear();
        self.run = run;
    }

    fn clear(&mut self) {
        self.push.clear();
        self.run.clear();
    }
}

/// Owns behavior units and runs their callbacks queue by queue.
pub struct Executor<C> {
    owner: OwnerId,
    slots: SlotAllocator,
    records: Vec<Option<Record<C>>>,
    generations: Vec<u32>,
    registry: HashMap<String, Registration<C>>,
    queues: Vec<QueuePair>,
    kills: QueuePair,
    pending: VecDeque<SpawnRequest>,
    max_count: usize,
}

impl<C> Executor<C> {
    /// Executor with `queue_count` activation queues holding at most `max_count` units.
    pub fn new(queue_count: usize, max_count: usize) -> Self {
        Self {
            owner: OwnerId::next(),
            slots: SlotAllocator::new(),
            records: Vec::new(),
            generations: Vec::new(),
            registry: HashMap::new(),
            queues: (0..queue_count).map(|_| QueuePair::default()).collect(),
            kills: QueuePair::default(),
            pending: VecDeque::new(),
            max_count,
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.activation_queues, config.max_scripts)
    }

    /// Bind `type_name` to a registration. Each name may be registered once.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        registration: Registration<C>,
    ) -> Result<()> {
        let type_name = type_name.into();
        if self.registry.contains_key(&type_name) {
            return Err(KernelError::DuplicateRegistration(type_name));
        }
        log::debug!(
            "Registered script `{}` (group {}, remove_on_kill {})",
            type_name,
            registration.group,
            registration.remove_on_kill
        );
        self.registry.insert(type_name, registration);
        Ok(())
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.contains_key(type_name)
    }

    /// Record a deferred spawn; nothing is allocated until [`Self::drain_spawn_queue`].
    pub fn request_spawn(
        &mut self,
        type_name: &str,
        queue: Option<usize>,
        tag: u64,
        transform: Transform,
    ) -> Result<()> {
        if !self.registry.contains_key(type_name) {
            return Err(KernelError::UnknownScript(type_name.to_string()));
        }
        if let Some(index) = queue {
            self.check_queue(index)?;
        }
        self.pending.push_back(SpawnRequest {
            type_name: type_name.to_string(),
            queue,
            tag,
            transform,
        });
        Ok(())
    }

    /// Create every pending unit in request order.
    ///
    /// On failure the offending request is dropped and later requests stay
    /// pending. Units created before it stay alive and come back in
    /// [`DrainError::spawned`].
    pub fn drain_spawn_queue(
        &mut self,
        game: &mut C,
    ) -> std::result::Result<Vec<ScriptHandle>, DrainError> {
        let mut spawned = Vec::with_capacity(self.pending.len());
        while let Some(request) = self.pending.pop_front() {
            match self.spawn(request, game) {
                Ok(handle) => spawned.push(handle),
                Err(error) => return Err(DrainError { spawned, error }),
            }
        }
        Ok(spawned)
    }

    fn spawn(&mut self, request: SpawnRequest, game: &mut C) -> Result<ScriptHandle> {
        if self.slots.len() >= self.max_count {
            return Err(KernelError::CapacityExceeded {
                max: self.max_count,
            });
        }
        let registration = self
            .registry
            .get_mut(&request.type_name)
            .ok_or_else(|| KernelError::UnknownScript(request.type_name.clone()))?;

        let slot = self.slots.acquire();
        if slot >= self.records.len() {
            self.records.push(None);
            self.generations.push(0);
        }
        let handle = ScriptHandle {
            owner: self.owner,
            slot,
            generation: self.generations[slot],
        };

        let script = (registration.allocator)(
            &Spawn {
                handle,
                type_name: &request.type_name,
                tag: request.tag,
                transform: request.transform,
            },
            game,
        );
        self.records[slot] = Some(Record {
            script: Some(script),
            type_name: request.type_name.clone(),
            group: registration.group,
            remove_on_kill: registration.remove_on_kill,
            last_queue: None,
            initialized: false,
            killed: false,
            activation_pending: false,
            kill_pending: false,
        });
        log::debug!("Spawned `{}` in slot {}", request.type_name, slot);

        if let Some(queue) = request.queue {
            self.enqueue_activation(handle, queue)?;
        }
        if let Some(hook) = self
            .registry
            .get_mut(&request.type_name)
            .and_then(|r| r.on_spawn.as_mut())
        {
            hook(handle, game);
        }
        Ok(handle)
    }

    /// Queue one activation. A unit with an unconsumed activation is not queued again.
    pub fn enqueue_activation(&mut self, handle: ScriptHandle, queue: usize) -> Result<()> {
        self.check_queue(queue)?;
        let record = self.record_mut(handle)?;
        if record.activation_pending {
            return Ok(());
        }
        record.activation_pending = true;
        self.queues[queue].push.push(handle);
        Ok(())
    }

    /// Queue a kill. Duplicate requests before the kill queue runs coalesce.
    pub fn enqueue_kill(&mut self, handle: ScriptHandle) -> Result<()> {
        let record = self.record_mut(handle)?;
        if record.kill_pending {
            return Ok(());
        }
        record.kill_pending = true;
        self.kills.push.push(handle);
        Ok(())
    }

    /// Run every activation queued in `queue` before this call. Returns how many units ran.
    pub fn run_activation_queue(&mut self, queue: usize, game: &mut C) -> Result<usize> {
        self.check_queue(queue)?;
        let mut run = self.queues[queue].swap();
        let mut ran = 0;

        for handle in run.drain(..) {
            // Removed since it was queued
            let Ok(slot) = self.locate(handle) else {
                continue;
            };
            let Some(record) = self.records[slot].as_mut() else {
                continue;
            };
            record.activation_pending = false;
            if record.killed {
                continue;
            }
            let first = !record.initialized;
            record.initialized = true;
            let Some(mut script) = record.script.take() else {
                continue;
            };

            {
                let mut cx = ScriptCx {
                    executor: self,
                    game: &mut *game,
                    handle,
                };
                if first {
                    script.on_init(&mut cx);
                }
                script.on_activate(&mut cx);
            }
            log::trace!("Activated slot {} in queue {}", slot, queue);

            if let Some(record) = self.records[slot].as_mut() {
                record.script = Some(script);
                record.last_queue = Some(queue);
            }
            ran += 1;
        }

        self.queues[queue].recycle(run);
        Ok(ran)
    }

    /// Kill every unit queued before this call. Returns how many units were killed.
    ///
    /// `on_kill` runs before the unit is flagged killed.
    pub fn run_kill_queue(&mut self, game: &mut C) -> usize {
        let mut run = self.kills.swap();
        let mut killed = 0;

        for handle in run.drain(..) {
            let Ok(slot) = self.locate(handle) else {
                continue;
            };
            let Some(record) = self.records[slot].as_mut() else {
                continue;
            };
            if record.killed {
                record.kill_pending = false;
                continue;
            }

            if let Some(mut script) = record.script.take() {
                {
                    let mut cx = ScriptCx {
                        executor: self,
                        game: &mut *game,
                        handle,
                    };
                    script.on_kill(&mut cx);
                }
                if let Some(record) = self.records[slot].as_mut() {
                    record.script = Some(script);
                }
            }
            killed += 1;

            let remove = match self.records[slot].as_mut() {
                Some(record) => {
                    record.killed = true;
                    if !record.remove_on_kill {
                        record.kill_pending = false;
                    }
                    record.remove_on_kill
                }
                None => false,
            };
            if remove {
                if let Err(e) = self.remove(handle, game) {
                    log::warn!("Failed to remove killed unit in slot {}: {}", slot, e);
                }
            }
        }

        self.kills.recycle(run);
        killed
    }

    fn remove(&mut self, handle: ScriptHandle, game: &mut C) -> Result<()> {
        let slot = handle.slot;
        let Some(record) = self.records[slot].take() else {
            return Ok(());
        };
        if let Some(hook) = self
            .registry
            .get_mut(&record.type_name)
            .and_then(|r| r.on_remove.as_mut())
        {
            hook(handle, game);
        }
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.slots.release(slot)?;
        log::debug!("Removed `{}` from slot {}", record.type_name, slot);
        Ok(())
    }

    pub fn get(&self, handle: ScriptHandle) -> Option<&dyn Script<C>> {
        let slot = self.locate(handle).ok()?;
        self.records[slot].as_ref()?.script.as_deref()
    }

    pub fn get_mut(&mut self, handle: ScriptHandle) -> Option<&mut (dyn Script<C> + 'static)> {
        let slot = self.locate(handle).ok()?;
        self.records[slot].as_mut()?.script.as_deref_mut()
    }

    /// The unit behind `handle` as its concrete type.
    pub fn get_as<T: Any>(&self, handle: ScriptHandle) -> Option<&T> {
        self.get(handle)?.as_any().downcast_ref()
    }

    pub fn get_as_mut<T: Any>(&mut self, handle: ScriptHandle) -> Option<&mut T> {
        self.get_mut(handle)?.as_any_mut().downcast_mut()
    }

    pub fn status(&self, handle: ScriptHandle) -> Option<ScriptStatus> {
        let slot = self.locate(handle).ok()?;
        self.records[slot].as_ref().map(Record::status)
    }

    pub fn type_name(&self, handle: ScriptHandle) -> Option<&str> {
        let slot = self.locate(handle).ok()?;
        self.records[slot].as_ref().map(|r| r.type_name.as_str())
    }

    #[inline]
    pub fn has(&self, handle: ScriptHandle) -> bool {
        self.locate(handle).is_ok()
    }

    /// Live units tagged with `group`, in slot order.
    pub fn all_by_group(&self, group: i32) -> Vec<ScriptHandle> {
        let mut found: Vec<ScriptHandle> = self
            .slots
            .used_ids()
            .iter()
            .filter(|&&slot| matches!(&self.records[slot], Some(r) if r.group == group))
            .map(|&slot| self.handle_at(slot))
            .collect();
        found.sort_unstable_by_key(|h| h.slot);
        found
    }

    /// Number of live units (killed-but-resident units included)
    #[inline]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    #[inline]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    #[inline]
    pub fn pending_spawns(&self) -> usize {
        self.pending.len()
    }

    /// Drop every unit, queued request and pending spawn. Registrations stay.
    ///
    /// No callbacks run. Handles issued before the call become inactive.
    pub fn clear(&mut self) {
        for (record, generation) in self.records.iter_mut().zip(self.generations.iter_mut()) {
            if record.take().is_some() {
                *generation = generation.wrapping_add(1);
            }
        }
        self.slots.clear();
        for queue in &mut self.queues {
            queue.clear();
        }
        self.kills.clear();
        self.pending.clear();
    }

    fn handle_at(&self, slot: SlotId) -> ScriptHandle {
        ScriptHandle {
            owner: self.owner,
            slot,
            generation: self.generations[slot],
        }
    }

    fn check_queue(&self, index: usize) -> Result<()> {
        if index >= self.queues.len() {
            return Err(KernelError::InvalidQueue {
                index,
                count: self.queues.len(),
            });
        }
        Ok(())
    }

    fn locate(&self, handle: ScriptHandle) -> Result<SlotId> {
        if handle.owner != self.owner {
            return Err(KernelError::NotOwned);
        }
        let generation = *self
            .generations
            .get(handle.slot)
            .ok_or(KernelError::InvalidIdentifier(handle.slot))?;
        if generation != handle.generation || self.records[handle.slot].is_none() {
            return Err(KernelError::InactiveIdentifier(handle.slot));
        }
        Ok(handle.slot)
    }

    fn record_mut(&mut self, handle: ScriptHandle) -> Result<&mut Record<C>> {
        let slot = self.locate(handle)?;
        self.records[slot]
            .as_mut()
            .ok_or(KernelError::InactiveIdentifier(slot))
    }
}

/// What a running unit may do: schedule itself and others, request spawns,
/// and reach the game context.
pub struct ScriptCx<'a, C> {
    executor: &'a mut Executor<C>,
    game: &'a mut C,
    handle: ScriptHandle,
}

impl<C> ScriptCx<'_, C> {
    /// The running unit
    #[inline]
    pub fn handle(&self) -> ScriptHandle {
        self.handle
    }

    #[inline]
    pub fn game(&mut self) -> &mut C {
        self.game
    }

    pub fn activate_self(&mut self, queue: usize) -> Result<()> {
        self.executor.enqueue_activation(self.handle, queue)
    }

    pub fn kill_self(&mut self) -> Result<()> {
        self.executor.enqueue_kill(self.handle)
    }

    pub fn enqueue_activation(&mut self, handle: ScriptHandle, queue: usize) -> Result<()> {
        self.executor.enqueue_activation(handle, queue)
    }

    pub fn enqueue_kill(&mut self, handle: ScriptHandle) -> Result<()> {
        self.executor.enqueue_kill(handle)
    }

    pub fn request_spawn(
        &mut self,
        type_name: &str,
        queue: Option<usize>,
        tag: u64,
        transform: Transform,
    ) -> Result<()> {
        self.executor.request_spawn(type_name, queue, tag, transform)
    }

    pub fn status(&self, handle: ScriptHandle) -> Option<ScriptStatus> {
        self.executor.status(handle)
    }

    pub fn all_by_group(&self, group: i32) -> Vec<ScriptHandle> {
        self.executor.all_by_group(group)
    }

    /// Another unit as its concrete type. The running unit itself is not reachable here.
    pub fn get_as<T: Any>(&self, handle: ScriptHandle) -> Option<&T> {
        self.executor.get_as(handle)
    }

    pub fn get_as_mut<T: Any>(&mut self, handle: ScriptHandle) -> Option<&mut T> {
        self.executor.get_as_mut(handle)
    }
}
