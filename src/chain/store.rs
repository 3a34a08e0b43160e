//! Object Store
//!
//! Keyed tables with create/modify/remove and time-ordered secondary
//! indices. Every index is a `BTreeSet<(Timestamp, Id)>`, so lookups come
//! back ordered by deadline and then by identifier on every node.
//!
//! Between `begin` and `commit` a table journals the pre-image of every
//! object it touches, so `rollback` can restore it without a full copy.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::ids::ObjectId;
use crate::core::time::Timestamp;

/// An object kind the store can hold.
pub trait StoredObject: Clone {
    /// Identifier type.
    type Id: ObjectId;

    /// Number of time-ordered secondary indices this kind maintains.
    const TIME_INDICES: usize = 0;

    /// The object's identifier.
    fn id(&self) -> Self::Id;

    /// Key of this object in secondary index `index`; `None` leaves it out.
    fn time_key(&self, _index: usize) -> Option<Timestamp> {
        None
    }
}

/// Pre-images recorded since `begin`; `None` marks an object created
/// inside the journal.
#[derive(Clone, Debug)]
struct UndoLog<T: StoredObject> {
    next_instance: u64,
    pre_images: BTreeMap<T::Id, Option<T>>,
}

/// One table of objects plus its secondary indices.
#[derive(Clone, Debug)]
pub struct ObjectTable<T: StoredObject> {
    objects: BTreeMap<T::Id, T>,
    time_indices: Vec<BTreeSet<(Timestamp, T::Id)>>,
    next_instance: u64,
    undo: Option<UndoLog<T>>,
}

impl<T: StoredObject> Default for ObjectTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoredObject> ObjectTable<T> {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            time_indices: vec![BTreeSet::new(); T::TIME_INDICES],
            next_instance: 0,
            undo: None,
        }
    }

    /// Start journaling. A journal already open is discarded.
    pub fn begin(&mut self) {
        self.undo = Some(UndoLog {
            next_instance: self.next_instance,
            pre_images: BTreeMap::new(),
        });
    }

    /// Keep every change since `begin` and stop journaling.
    pub fn commit(&mut self) {
        self.undo = None;
    }

    /// Restore the table to its state at `begin`. No-op without a journal.
    pub fn rollback(&mut self) {
        let Some(log) = self.undo.take() else { return };
        for (id, pre_image) in log.pre_images {
            self.detach(id);
            if let Some(object) = pre_image {
                self.index(&object);
                self.objects.insert(id, object);
            }
        }
        self.next_instance = log.next_instance;
    }

    /// Is a journal open?
    #[inline]
    pub fn is_journaling(&self) -> bool {
        self.undo.is_some()
    }

    /// Allocate the next identifier and insert the object built from it.
    pub fn create<F>(&mut self, build: F) -> T::Id
    where
        F: FnOnce(T::Id) -> T,
    {
        let id = T::Id::from_instance(self.next_instance);
        self.next_instance += 1;
        self.record(id);
        let object = build(id);
        debug_assert_eq!(object.id(), id, "object built with a foreign id");
        self.index(&object);
        self.objects.insert(id, object);
        id
    }

    /// Identifier the next `create` will allocate.
    #[inline]
    pub fn next_id(&self) -> T::Id {
        T::Id::from_instance(self.next_instance)
    }

    /// Look up by identifier.
    #[inline]
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.objects.get(&id)
    }

    /// Mutate an object in place, keeping indices current.
    pub fn modify<R, F>(&mut self, id: T::Id, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        if !self.objects.contains_key(&id) {
            return None;
        }
        self.record(id);
        let object = self.objects.get_mut(&id)?;
        for (index, set) in self.time_indices.iter_mut().enumerate() {
            if let Some(key) = object.time_key(index) {
                set.remove(&(key, id));
            }
        }
        let result = f(object);
        for (index, set) in self.time_indices.iter_mut().enumerate() {
            if let Some(key) = object.time_key(index) {
                set.insert((key, id));
            }
        }
        Some(result)
    }

    /// Remove an object.
    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        if !self.objects.contains_key(&id) {
            return None;
        }
        self.record(id);
        self.detach(id)
    }

    fn record(&mut self, id: T::Id) {
        let Some(log) = self.undo.as_mut() else { return };
        if let Entry::Vacant(slot) = log.pre_images.entry(id) {
            slot.insert(self.objects.get(&id).cloned());
        }
    }

    fn detach(&mut self, id: T::Id) -> Option<T> {
        let object = self.objects.remove(&id)?;
        for (index, set) in self.time_indices.iter_mut().enumerate() {
            if let Some(key) = object.time_key(index) {
                set.remove(&(key, id));
            }
        }
        Some(object)
    }

    /// All objects in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.values()
    }

    /// Number of stored objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Is the table empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Identifiers whose key in `index` is at or before `now`, ordered by
    /// key and then identifier.
    pub fn due(&self, index: usize, now: Timestamp) -> Vec<T::Id> {
        match self.time_indices.get(index) {
            Some(set) => set.iter()
                .take_while(|(key, _)| *key <= now)
                .map(|(_, id)| *id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Full contents of secondary index `index`, in order.
    pub fn by_time(&self, index: usize) -> impl Iterator<Item = &(Timestamp, T::Id)> {
        self.time_indices.get(index).into_iter().flatten()
    }

    fn index(&mut self, object: &T) {
        let id = object.id();
        for (index, set) in self.time_indices.iter_mut().enumerate() {
            if let Some(key) = object.time_key(index) {
                set.insert((key, id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::GameId;

    #[derive(Clone, Debug, PartialEq)]
    struct Timer {
        id: GameId,
        deadline: Option<Timestamp>,
    }

    impl StoredObject for Timer {
        type Id = GameId;
        const TIME_INDICES: usize = 1;

        fn id(&self) -> GameId {
            self.id
        }

        fn time_key(&self, _index: usize) -> Option<Timestamp> {
            self.deadline
        }
    }

    fn t(secs: u32) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut table: ObjectTable<Timer> = ObjectTable::new();
        let a = table.create(|id| Timer { id, deadline: None });
        let b = table.create(|id| Timer { id, deadline: None });
        assert_eq!(a, GameId::new(0));
        assert_eq!(b, GameId::new(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_due_is_ordered_by_deadline_then_id() {
        let mut table: ObjectTable<Timer> = ObjectTable::new();
        let late = table.create(|id| Timer { id, deadline: Some(t(30)) });
        let early_b = table.create(|id| Timer { id, deadline: Some(t(10)) });
        let early_a = table.create(|id| Timer { id, deadline: Some(t(10)) });
        let _future = table.create(|id| Timer { id, deadline: Some(t(99)) });
        let _none = table.create(|id| Timer { id, deadline: None });

        assert_eq!(table.due(0, t(30)), vec![early_b, early_a, late]);
        assert_eq!(table.due(0, t(9)), Vec::<GameId>::new());
    }

    #[test]
    fn test_modify_reindexes() {
        let mut table: ObjectTable<Timer> = ObjectTable::new();
        let id = table.create(|id| Timer { id, deadline: Some(t(10)) });

        table.modify(id, |timer| timer.deadline = Some(t(50)));
        assert!(table.due(0, t(10)).is_empty());
        assert_eq!(table.due(0, t(50)), vec![id]);

        table.modify(id, |timer| timer.deadline = None);
        assert_eq!(table.by_time(0).count(), 0);
    }

    #[test]
    fn test_remove_unindexes() {
        let mut table: ObjectTable<Timer> = ObjectTable::new();
        let id = table.create(|id| Timer { id, deadline: Some(t(10)) });
        assert!(table.remove(id).is_some());
        assert!(table.due(0, t(10)).is_empty());
        assert!(table.get(id).is_none());
        assert!(table.modify(id, |_| ()).is_none());
    }

    #[test]
    fn test_rollback_restores_objects_indices_and_ids() {
        let mut table: ObjectTable<Timer> = ObjectTable::new();
        let kept = table.create(|id| Timer { id, deadline: Some(t(10)) });
        let doomed = table.create(|id| Timer { id, deadline: Some(t(20)) });

        table.begin();
        table.modify(kept, |timer| timer.deadline = Some(t(90)));
        table.modify(kept, |timer| timer.deadline = None);
        table.remove(doomed);
        let fresh = table.create(|id| Timer { id, deadline: Some(t(5)) });
        assert_eq!(table.due(0, t(99)), vec![fresh]);
        table.rollback();

        assert!(!table.is_journaling());
        assert_eq!(table.get(kept), Some(&Timer { id: kept, deadline: Some(t(10)) }));
        assert!(table.get(doomed).is_some());
        assert!(table.get(fresh).is_none());
        assert_eq!(table.due(0, t(99)), vec![kept, doomed]);
        assert_eq!(table.next_id(), fresh);
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut table: ObjectTable<Timer> = ObjectTable::new();
        let id = table.create(|id| Timer { id, deadline: Some(t(10)) });

        table.begin();
        table.modify(id, |timer| timer.deadline = Some(t(40)));
        table.commit();
        assert!(!table.is_journaling());

        // Nothing left to undo
        table.rollback();
        assert_eq!(table.due(0, t(40)), vec![id]);
    }
}
