//! Object allocation and cycle collection.
//!
//! Objects are reference counted. The heap keeps a weak list of every
//! allocation so that it can:
//!
//! - enforce an optional live-object limit,
//! - find objects that are only kept alive by reference cycles (mark from
//!   the roots, then clear whatever was not reached),
//! - clear every remaining object when the owning VM is torn down.
//!
//! Clearing an object releases everything it references; the memory itself
//! is reclaimed by reference counting once the cycle is broken.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use stylescript_foundation::{Error, ErrorKind, Result};

use crate::object::{Object, ObjectKind, Upvalue};
use crate::value::{ObjectRef, Value};

/// Default number of allocations between cycle collections.
pub const DEFAULT_GC_THRESHOLD: usize = 4096;

/// Allocation statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects currently alive.
    pub live_objects: usize,
    /// Objects allocated since the last collection.
    pub allocations_since_collect: usize,
    /// Total objects allocated.
    pub total_allocations: u64,
    /// Collections run so far.
    pub collections: u64,
    /// Objects cleared by collections (cycle members).
    pub cleared_objects: u64,
}

/// Tracks every allocated object.
#[derive(Debug)]
pub struct Heap {
    objects: Vec<Weak<RefCell<Object>>>,
    threshold: usize,
    limit: Option<usize>,
    stats: HeapStats,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(DEFAULT_GC_THRESHOLD, None)
    }
}

impl Heap {
    /// Creates a heap that collects every `threshold` allocations and
    /// refuses to hold more than `limit` live objects.
    #[must_use]
    pub fn new(threshold: usize, limit: Option<usize>) -> Self {
        Self {
            objects: Vec::new(),
            threshold: threshold.max(1),
            limit,
            stats: HeapStats::default(),
        }
    }

    /// Allocates a new object.
    ///
    /// # Errors
    /// Returns `HeapExhausted` if the live-object limit is reached.
    pub fn alloc(&mut self, object: Object) -> Result<ObjectRef> {
        if let Some(limit) = self.limit {
            if self.objects.len() >= limit {
                self.prune();
            }
            if self.objects.len() >= limit {
                return Err(Error::new(ErrorKind::HeapExhausted { limit }));
            }
        }
        let obj = ObjectRef::new(object);
        self.objects.push(obj.downgrade());
        self.stats.allocations_since_collect += 1;
        self.stats.total_allocations += 1;
        Ok(obj)
    }

    /// Allocates an ordinary object.
    ///
    /// # Errors
    /// Returns `HeapExhausted` if the live-object limit is reached.
    pub fn alloc_object(&mut self) -> Result<Value> {
        self.alloc(Object::new(ObjectKind::Ordinary)).map(Value::Object)
    }

    /// Allocates an array holding `items`.
    ///
    /// # Errors
    /// Returns `HeapExhausted` if the live-object limit is reached.
    pub fn alloc_array(&mut self, items: Vec<Value>) -> Result<Value> {
        self.alloc(Object::new(ObjectKind::Array(items)))
            .map(Value::Object)
    }

    /// Changes the live-object limit. Objects already allocated stay alive.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    /// Returns true once enough allocations happened to warrant a collection.
    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.stats.allocations_since_collect >= self.threshold
    }

    /// Returns a fresh marker for a collection.
    #[must_use]
    pub fn marker(&self) -> Marker {
        Marker::default()
    }

    /// Clears every object that is neither reached by the marker nor held
    /// from outside the heap. Returns the number of objects cleared.
    ///
    /// An unreached object whose strong count exceeds the references held by
    /// other unreached objects is owned by the embedder; it is treated as a
    /// root, together with everything it reaches.
    pub fn sweep(&mut self, marker: &mut Marker) -> usize {
        let unreached: Vec<ObjectRef> = self
            .objects
            .iter()
            .filter_map(Weak::upgrade)
            .map(ObjectRef::from_rc)
            .filter(|obj| !marker.is_marked(obj))
            .collect();

        let internal = internal_references(&unreached);
        for obj in &unreached {
            let held = internal.get(&obj.id()).copied().unwrap_or(0);
            // One strong reference belongs to `unreached` itself.
            if obj.strong_count() > held + 1 {
                marker.mark(&Value::Object(obj.clone()));
            }
        }

        // Hold every garbage object alive until all of them are released.
        let garbage: Vec<ObjectRef> = unreached
            .into_iter()
            .filter(|obj| !marker.is_marked(obj))
            .collect();
        let cleared = garbage.len();
        for obj in &garbage {
            release(obj);
        }
        drop(garbage);
        self.prune();
        self.stats.allocations_since_collect = 0;
        self.stats.collections += 1;
        self.stats.cleared_objects += cleared as u64;
        cleared
    }

    /// Clears every live object. Used when the owning VM is dropped.
    pub fn clear_all(&mut self) {
        for weak in std::mem::take(&mut self.objects) {
            if let Some(rc) = weak.upgrade() {
                release(&ObjectRef::from_rc(rc));
            }
        }
    }

    /// Returns allocation statistics.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let live_objects = self
            .objects
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count();
        HeapStats {
            live_objects,
            ..self.stats
        }
    }

    fn prune(&mut self) {
        self.objects.retain(|weak| weak.strong_count() > 0);
    }
}

/// Counts, per object, the strong references held by members of `objects`.
///
/// A value inside an upvalue counts only when every holder of that upvalue
/// is itself a member.
fn internal_references(objects: &[ObjectRef]) -> HashMap<usize, usize> {
    let mut cell_holders: HashMap<*const RefCell<Value>, (Upvalue, usize)> = HashMap::new();
    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut count = |value: &Value| {
        if let Value::Object(child) = value {
            *counts.entry(child.id()).or_default() += 1;
        }
    };

    for obj in objects {
        let object = obj.borrow();
        object.properties.values().for_each(&mut count);
        match &object.kind {
            ObjectKind::Array(items) => items.iter().for_each(&mut count),
            ObjectKind::Function(closure) => {
                for upvalue in &closure.upvalues {
                    cell_holders
                        .entry(Rc::as_ptr(upvalue))
                        .or_insert_with(|| (upvalue.clone(), 0))
                        .1 += 1;
                }
            }
            ObjectKind::Ordinary | ObjectKind::Native(_) | ObjectKind::Host(_) => {}
        }
    }

    for (upvalue, holders) in cell_holders.values() {
        // The map holds one clone of its own.
        if Rc::strong_count(upvalue) == holders + 1 {
            count(&*upvalue.borrow());
        }
    }
    counts
}

/// Releases an object's references, dropping them after the borrow ends.
fn release(obj: &ObjectRef) {
    let released = obj.borrow_mut().clear_contents();
    drop(released);
}

/// Reachability marker for one collection.
#[derive(Debug, Default)]
pub struct Marker {
    marked: HashSet<usize>,
    pending: Vec<ObjectRef>,
}

impl Marker {
    /// Marks a root value and everything reachable from it.
    pub fn mark(&mut self, value: &Value) {
        self.push(value);
        self.drain();
    }

    /// Marks the value held by an upvalue.
    pub fn mark_upvalue(&mut self, upvalue: &Upvalue) {
        let value = upvalue.borrow().clone();
        self.mark(&value);
    }

    fn is_marked(&self, obj: &ObjectRef) -> bool {
        self.marked.contains(&obj.id())
    }

    fn push(&mut self, value: &Value) {
        if let Value::Object(obj) = value {
            if self.marked.insert(obj.id()) {
                self.pending.push(obj.clone());
            }
        }
    }

    fn drain(&mut self) {
        while let Some(obj) = self.pending.pop() {
            let object = obj.borrow();
            let mut children: Vec<Value> = object.properties.values().cloned().collect();
            match &object.kind {
                ObjectKind::Array(items) => children.extend(items.iter().cloned()),
                ObjectKind::Function(closure) => {
                    children.extend(closure.upvalues.iter().map(|u| u.borrow().clone()));
                }
                ObjectKind::Ordinary | ObjectKind::Native(_) | ObjectKind::Host(_) => {}
            }
            drop(object);
            for child in &children {
                self.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_counts() {
        let mut heap = Heap::default();
        let a = heap.alloc_object().expect("alloc");
        let _b = heap.alloc_array(vec![a]).expect("alloc");
        let stats = heap.stats();
        assert_eq!(stats.live_objects, 2);
        assert_eq!(stats.total_allocations, 2);
    }

    #[test]
    fn limit_is_enforced_on_live_objects() {
        let mut heap = Heap::new(DEFAULT_GC_THRESHOLD, Some(2));
        let a = heap.alloc_object().expect("first");
        {
            let _temp = heap.alloc_object().expect("second");
        }
        // The dropped temporary no longer counts.
        let _c = heap.alloc_object().expect("third fits after prune");
        let err = heap.alloc_object().expect_err("limit reached");
        assert!(matches!(err.kind, ErrorKind::HeapExhausted { limit: 2 }));
        drop(a);
    }

    #[test]
    fn sweep_breaks_unreachable_cycles() {
        let mut heap = Heap::default();
        let a = heap.alloc_object().expect("alloc");
        let b = heap.alloc_object().expect("alloc");
        let (Value::Object(ra), Value::Object(rb)) = (&a, &b) else {
            panic!("objects expected");
        };
        ra.borrow_mut().properties.set("peer", b.clone());
        rb.borrow_mut().properties.set("peer", a.clone());
        drop((a, b));
        assert_eq!(heap.stats().live_objects, 2);

        let mut marker = heap.marker();
        let cleared = heap.sweep(&mut marker);
        assert_eq!(cleared, 2);
        assert_eq!(heap.stats().live_objects, 0);
    }

    #[test]
    fn sweep_keeps_reachable_objects() {
        let mut heap = Heap::default();
        let inner = heap.alloc_object().expect("alloc");
        let root = heap.alloc_array(vec![inner.clone()]).expect("alloc");
        let Value::Object(rinner) = &inner else {
            panic!("object expected");
        };
        rinner.borrow_mut().properties.set("back", root.clone());

        let mut marker = heap.marker();
        marker.mark(&root);
        assert_eq!(heap.sweep(&mut marker), 0);
        assert!(rinner.borrow().properties.contains("back"));
    }

    #[test]
    fn sweep_keeps_objects_held_outside_the_heap() {
        let mut heap = Heap::default();
        let held = heap.alloc_object().expect("alloc");
        let child = heap.alloc_array(vec![held.clone()]).expect("alloc");
        let Value::Object(rheld) = &held else {
            panic!("object expected");
        };
        rheld.borrow_mut().properties.set("child", child.clone());
        drop(child);

        let mut marker = heap.marker();
        assert_eq!(heap.sweep(&mut marker), 0);
        assert!(rheld.borrow().properties.contains("child"));
        assert_eq!(heap.stats().live_objects, 2);

        drop(held);
        let mut marker = heap.marker();
        assert_eq!(heap.sweep(&mut marker), 2);
    }
}
