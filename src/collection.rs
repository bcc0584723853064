//! EntityCollection - normalized, insertion-ordered records keyed by id.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::record::{Record, Tracked};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

fn next_instance() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// An entry as it was before an optimistic mutation, with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Prior<R> {
    pub entry: Tracked<R>,
    pub index: usize,
}

/// Serializable `{ids, entities}` form of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
pub struct CollectionSnapshot<R> {
    pub ids: Vec<String>,
    pub entities: BTreeMap<String, Tracked<R>>,
}

/// Ordered, id-keyed mapping from id to tracked record.
///
/// Every collection carries a process-unique `instance` and a `revision`
/// bumped on each mutation. Together they identify one exact state, which is
/// what summaries memoize on. Neither takes part in equality.
#[derive(Debug)]
pub struct EntityCollection<R> {
    ids: Vec<String>,
    entities: HashMap<String, Tracked<R>>,
    instance: u64,
    revision: u64,
}

impl<R: Record> Default for EntityCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone> Clone for EntityCollection<R> {
    fn clone(&self) -> Self {
        // A clone can diverge from its source, so it gets its own identity.
        Self {
            ids: self.ids.clone(),
            entities: self.entities.clone(),
            instance: next_instance(),
            revision: 0,
        }
    }
}

impl<R: PartialEq> PartialEq for EntityCollection<R> {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids && self.entities == other.entities
    }
}

impl<R: Record> EntityCollection<R> {
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            entities: HashMap::new(),
            instance: next_instance(),
            revision: 0,
        }
    }

    /// Build a collection of synced records, keeping the first of any repeated id.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut collection = Self::new();
        for record in records {
            if !collection.contains(record.id()) {
                collection.insert(Tracked::synced(record));
            }
        }
        collection
    }

    /// Rebuild a collection from its snapshot. Ids without an entity are
    /// skipped; repeated ids keep their first position.
    pub fn from_snapshot(snapshot: CollectionSnapshot<R>) -> Self {
        let CollectionSnapshot { ids, mut entities } = snapshot;
        let mut collection = Self::new();
        for id in ids {
            if let Some(entry) = entities.remove(&id) {
                if entry.id() == id {
                    collection.insert(entry);
                }
            }
        }
        collection
    }

    pub fn snapshot(&self) -> CollectionSnapshot<R> {
        CollectionSnapshot {
            ids: self.ids.clone(),
            entities: self
                .entities
                .iter()
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect(),
        }
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Tracked<R>> {
        self.entities.get(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tracked<R>> {
        self.ids.iter().filter_map(|id| self.entities.get(id))
    }

    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.iter().map(|entry| &entry.record)
    }

    pub fn find_by_natural_key(&self, key: &str) -> Option<&Tracked<R>> {
        self.iter().find(|entry| entry.record.natural_key() == key)
    }

    /// Insert an entry, replacing in place if its id is already present.
    pub fn insert(&mut self, entry: Tracked<R>) {
        let id = entry.id().to_string();
        if !self.entities.contains_key(&id) {
            self.ids.push(id.clone());
        }
        self.entities.insert(id, entry);
        self.touch();
    }

    /// Insert an entry at `index` (clamped), moving it if already present.
    pub fn insert_at(&mut self, index: usize, entry: Tracked<R>) {
        let id = entry.id().to_string();
        if let Some(current) = self.position(&id) {
            self.ids.remove(current);
        }
        let index = index.min(self.ids.len());
        self.ids.insert(index, id.clone());
        self.entities.insert(id, entry);
        self.touch();
    }

    /// Swap the entry under `old_id` for `entry` (which may carry a new id),
    /// keeping the position. Any other entry already holding the new id is
    /// dropped. Returns false if `old_id` is absent.
    pub fn replace_key(&mut self, old_id: &str, entry: Tracked<R>) -> bool {
        let Some(index) = self.position(old_id) else {
            return false;
        };
        let new_id = entry.id().to_string();
        self.entities.remove(old_id);
        if new_id != old_id {
            if let Some(other) = self.position(&new_id) {
                self.ids.remove(other);
                self.entities.remove(&new_id);
            }
        }
        let index = self.position(old_id).unwrap_or(index);
        self.ids[index] = new_id.clone();
        self.entities.insert(new_id, entry);
        self.touch();
        true
    }

    /// Mutate an entry in place.
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Tracked<R>),
    {
        match self.entities.get_mut(id) {
            Some(entry) => {
                f(entry);
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Remove an entry, returning it with the index it occupied.
    pub fn remove(&mut self, id: &str) -> Option<Prior<R>> {
        let index = self.position(id)?;
        self.ids.remove(index);
        let entry = self.entities.remove(id)?;
        self.touch();
        Some(Prior { entry, index })
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.entities.clear();
        self.touch();
    }

    /// Replace the whole content with `other`'s, keeping this identity.
    pub fn replace_with(&mut self, other: EntityCollection<R>) {
        self.ids = other.ids;
        self.entities = other.entities;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
