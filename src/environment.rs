//! Scope frames and the arena that owns them.
//!
//! Frames are addressed by generation‑checked [`EnvId`] handles instead of
//! shared pointers.  A closure stores the handle of its defining frame; a
//! frame stores the handle of its enclosing frame.  Because handles carry no
//! ownership, reference cycles between frames, closures and instances cannot
//! keep memory alive on their own.
//!
//! Frames are reclaimed three ways:
//! - **eagerly**: a block or call frame that no closure ever captured is
//!   released as soon as the block or call exits;
//! - **on drop**: a frame owned by a value through a [`FrameGuard`] is queued
//!   when the guard drops and freed by [`Environments::drain_released`];
//! - **by tracing**: [`Environments::collect`] marks every frame reachable from
//!   the globals (and any extra roots), following enclosing links and every
//!   closure reachable through values, then frees the rest.
//!
//! Using a stale handle is detected (the generation no longer matches) and
//! reported as `None` rather than reading a recycled frame.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, trace};

use crate::value::Value;

/// Live‑frame count below which tracing collection is never attempted.
const MIN_COLLECTION_THRESHOLD: usize = 1024;

/// Frames whose owning guard has dropped, waiting for the arena to free them.
type ReleaseQueue = Rc<RefCell<Vec<EnvId>>>;

/// Handle to a frame in [`Environments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId {
    index: u32,
    generation: u32,
}

/// Ties a frame's lifetime to the value holding the guard.  Dropping the
/// guard queues the frame; it is freed at the next drain unless a closure
/// captured it in the meantime.
#[derive(Debug)]
pub struct FrameGuard {
    frame: EnvId,
    queue: ReleaseQueue,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        // Frames dropped while the queue is borrowed are left to the collector.
        if let Ok(mut queue) = self.queue.try_borrow_mut() {
            queue.push(self.frame);
        }
    }
}

#[derive(Debug)]
struct Frame {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,

    /// Set once a closure (or a frame below one) refers to this frame; a
    /// captured frame may outlive the block that created it.
    captured: bool,
}

#[derive(Debug)]
enum Slot {
    Occupied { generation: u32, frame: Frame },
    Vacant { generation: u32 },
}

/// Arena of scope frames.  The global frame is created with the arena and is
/// never released.
#[derive(Debug)]
pub struct Environments {
    slots: Vec<Slot>,
    free: Vec<u32>,
    globals: EnvId,
    live: usize,
    next_collection: usize,
    released: ReleaseQueue,
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

impl Environments {
    pub fn new() -> Self {
        let globals = EnvId {
            index: 0,
            generation: 0,
        };

        Environments {
            slots: vec![Slot::Occupied {
                generation: 0,
                frame: Frame {
                    values: HashMap::new(),
                    enclosing: None,
                    captured: true,
                },
            }],
            free: Vec::new(),
            globals,
            live: 1,
            next_collection: MIN_COLLECTION_THRESHOLD,
            released: ReleaseQueue::default(),
        }
    }

    /// The single frame without an enclosing frame.
    pub fn globals(&self) -> EnvId {
        self.globals
    }

    /// Number of frames currently allocated (the globals included).
    pub fn live_frames(&self) -> usize {
        self.live
    }

    /// Allocate an empty frame whose enclosing frame is `enclosing`.
    pub fn create(&mut self, enclosing: EnvId) -> EnvId {
        let frame = Frame {
            values: HashMap::new(),
            enclosing: Some(enclosing),
            captured: false,
        };

        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = match slot {
                Slot::Vacant { generation } => *generation,
                Slot::Occupied { generation, .. } => *generation + 1,
            };
            *slot = Slot::Occupied { generation, frame };

            return EnvId { index, generation };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            generation: 0,
            frame,
        });

        EnvId {
            index,
            generation: 0,
        }
    }

    fn frame(&self, id: EnvId) -> Option<&Frame> {
        match self.slots.get(id.index as usize)? {
            Slot::Occupied { generation, frame } if *generation == id.generation => Some(frame),
            _ => None,
        }
    }

    fn frame_mut(&mut self, id: EnvId) -> Option<&mut Frame> {
        match self.slots.get_mut(id.index as usize)? {
            Slot::Occupied { generation, frame } if *generation == id.generation => Some(frame),
            _ => None,
        }
    }

    /// Does `id` still name a live frame?
    pub fn contains(&self, id: EnvId) -> bool {
        self.frame(id).is_some()
    }

    /// Bind `name` in frame `id`.  Redefinition overwrites.
    pub fn define(&mut self, id: EnvId, name: &str, value: Value) {
        if let Some(frame) = self.frame_mut(id) {
            frame.values.insert(name.to_string(), value);
        }
    }

    /// Read `name` from frame `id` only.
    pub fn get(&self, id: EnvId, name: &str) -> Option<Value> {
        self.frame(id)?.values.get(name).cloned()
    }

    /// Overwrite an existing binding of `name` in frame `id` only.  Returns
    /// `false` when the frame has no such binding.
    pub fn assign(&mut self, id: EnvId, name: &str, value: Value) -> bool {
        match self.frame_mut(id).and_then(|f| f.values.get_mut(name)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// The frame `distance` enclosing links away from `id`.
    pub fn ancestor(&self, id: EnvId, distance: usize) -> Option<EnvId> {
        let mut current = id;
        for _ in 0..distance {
            current = self.frame(current)?.enclosing?;
        }

        self.frame(current).map(|_| current)
    }

    pub fn get_at(&self, id: EnvId, distance: usize, name: &str) -> Option<Value> {
        self.get(self.ancestor(id, distance)?, name)
    }

    pub fn assign_at(&mut self, id: EnvId, distance: usize, name: &str, value: Value) -> bool {
        match self.ancestor(id, distance) {
            Some(target) => self.assign(target, name, value),
            None => false,
        }
    }

    /// Names bound in frame `id`.
    pub fn names(&self, id: EnvId) -> Vec<String> {
        self.frame(id)
            .map(|f| f.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Record that a closure refers to `id`: it and all its ancestors must
    /// survive the exit of the block that created them.
    pub fn capture(&mut self, id: EnvId) {
        let mut current = Some(id);

        while let Some(cur) = current {
            let Some(frame) = self.frame_mut(cur) else {
                return;
            };

            if frame.captured {
                return; // ancestors of a captured frame are captured already
            }

            frame.captured = true;
            current = frame.enclosing;
        }
    }

    /// Free `id` now unless it has been captured.  Returns whether it was freed.
    pub fn release(&mut self, id: EnvId) -> bool {
        match self.frame(id) {
            Some(frame) if !frame.captured => {
                self.free_slot(id.index);
                true
            }
            _ => false,
        }
    }

    /// Hand ownership of `id` to a value.  The frame is queued for release
    /// once the returned guard drops.
    pub fn guard(&self, id: EnvId) -> FrameGuard {
        FrameGuard {
            frame: id,
            queue: Rc::clone(&self.released),
        }
    }

    /// Release every frame whose guard has dropped.  Freeing a frame can drop
    /// further guards, so this runs until the queue stays empty.  Returns the
    /// number of frames freed.
    pub fn drain_released(&mut self) -> usize {
        let mut freed = 0;

        loop {
            let pending = std::mem::take(&mut *self.released.borrow_mut());
            if pending.is_empty() {
                break;
            }

            for id in pending {
                if self.release(id) {
                    freed += 1;
                }
            }
        }

        if freed > 0 {
            trace!("Released {} guarded frame(s)", freed);
        }

        freed
    }

    fn free_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];

        if let Slot::Occupied { generation, .. } = slot {
            *slot = Slot::Vacant {
                generation: generation.wrapping_add(1),
            };
            self.free.push(index);
            self.live -= 1;
        }
    }

    /// Has the live‑frame count grown enough to make a collection worthwhile?
    pub fn should_collect(&self) -> bool {
        self.live >= self.next_collection
    }

    /// Mark every frame reachable from the globals and `roots`, free the rest.
    /// Returns the number of frames freed.
    pub fn collect(&mut self, roots: &[EnvId]) -> usize {
        let marked: Vec<bool> = self.mark(roots);
        let before = self.live;

        for (index, reachable) in marked.iter().enumerate() {
            if !reachable {
                self.free_slot(index as u32);
            }
        }

        let freed = before - self.live;
        self.next_collection = (self.live * 2).max(MIN_COLLECTION_THRESHOLD);

        debug!(
            "Collected {} frame(s), {} live, next collection at {}",
            freed, self.live, self.next_collection
        );

        freed
    }

    fn mark(&self, roots: &[EnvId]) -> Vec<bool> {
        let mut marked: Vec<bool> = vec![false; self.slots.len()];
        let mut frames: Vec<EnvId> = Vec::with_capacity(roots.len() + 1);
        let mut values: Vec<Value> = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();

        frames.push(self.globals);
        frames.extend_from_slice(roots);

        loop {
            if let Some(id) = frames.pop() {
                let Some(frame) = self.frame(id) else {
                    continue;
                };

                if std::mem::replace(&mut marked[id.index as usize], true) {
                    continue;
                }

                trace!("Marking frame {:?}", id);

                frames.extend(frame.enclosing);
                values.extend(frame.values.values().cloned());
                continue;
            }

            let Some(value) = values.pop() else {
                break;
            };

            match value {
                Value::Function(function) => {
                    frames.push(function.closure);
                }

                Value::Class(class) => {
                    if seen.insert(Rc::as_ptr(&class) as *const () as usize) {
                        frames.extend(class.methods.values().map(|m| m.closure));
                        if let Some(superclass) = &class.superclass {
                            values.push(Value::Class(Rc::clone(superclass)));
                        }
                    }
                }

                Value::Instance(instance) => {
                    if seen.insert(Rc::as_ptr(&instance) as *const () as usize) {
                        values.push(Value::Class(Rc::clone(&instance.class)));
                        values.extend(instance.fields.borrow().values().cloned());
                    }
                }

                Value::Array(array) | Value::ArrayMethod(array, _) => {
                    if seen.insert(Rc::as_ptr(&array) as *const () as usize) {
                        values.extend(array.elements.borrow().iter().cloned());
                    }
                }

                Value::Nil
                | Value::Bool(_)
                | Value::Number(_)
                | Value::String(_)
                | Value::Native(_) => {}
            }
        }

        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_are_rejected() {
        let mut envs = Environments::new();
        let block = envs.create(envs.globals());
        envs.define(block, "a", Value::Number(1.0));

        assert!(envs.release(block));
        assert_eq!(envs.get(block, "a"), None);

        // The slot is reused under a new generation.
        let reused = envs.create(envs.globals());
        assert_ne!(reused, block);
        assert!(envs.contains(reused));
        assert!(!envs.contains(block));
    }

    #[test]
    fn captured_frames_survive_release() {
        let mut envs = Environments::new();
        let outer = envs.create(envs.globals());
        let inner = envs.create(outer);

        envs.capture(inner);

        assert!(!envs.release(inner));
        assert!(!envs.release(outer));
        assert!(envs.contains(outer));
    }

    #[test]
    fn get_at_walks_enclosing_links() {
        let mut envs = Environments::new();
        let globals = envs.globals();
        envs.define(globals, "x", Value::Number(1.0));

        let a = envs.create(globals);
        envs.define(a, "x", Value::Number(2.0));
        let b = envs.create(a);

        assert_eq!(envs.get_at(b, 1, "x"), Some(Value::Number(2.0)));
        assert_eq!(envs.get_at(b, 2, "x"), Some(Value::Number(1.0)));
        assert_eq!(envs.get_at(b, 0, "x"), None);
        assert!(envs.assign_at(b, 2, "x", Value::Number(3.0)));
        assert_eq!(envs.get(globals, "x"), Some(Value::Number(3.0)));
    }

    #[test]
    fn collect_frees_unreachable_captured_frames() {
        let mut envs = Environments::new();
        let globals = envs.globals();

        let kept = envs.create(globals);
        envs.capture(kept);
        let dropped = envs.create(globals);
        envs.capture(dropped);

        assert_eq!(envs.collect(&[kept]), 1);
        assert!(envs.contains(kept));
        assert!(!envs.contains(dropped));
        assert!(envs.contains(globals));
    }

    #[test]
    fn dropped_guards_release_uncaptured_frames() {
        let mut envs = Environments::new();
        let globals = envs.globals();

        let owned = envs.create(globals);
        let kept = envs.create(globals);
        let guards = (envs.guard(owned), envs.guard(kept));
        envs.capture(kept);

        drop(guards);

        assert_eq!(envs.drain_released(), 1);
        assert!(!envs.contains(owned));
        assert!(envs.contains(kept));
        assert_eq!(envs.drain_released(), 0);
    }

    #[test]
    fn guards_of_freed_frames_are_ignored() {
        let mut envs = Environments::new();
        let block = envs.create(envs.globals());
        let guard = envs.guard(block);

        assert!(envs.release(block));
        let reused = envs.create(envs.globals());
        drop(guard);

        assert_eq!(envs.drain_released(), 0);
        assert!(envs.contains(reused));
    }
}
