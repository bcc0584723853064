//! EntityStore - owns one collection and applies pure state transitions.
//!
//! Every mutation goes through [`EntityStore::apply`], an exhaustive match
//! over [`Mutation`]. The named methods (`apply_optimistic_add`, `reconcile`,
//! `revert`, ...) are thin wrappers. None of them can fail: correctness
//! depends on callers reconciling or reverting once the remote side answers.
//!
//! Observers registered with [`EntityStore::subscribe`] run synchronously
//! after each mutation that changed the collection, in registration order.

use log::debug;

use crate::collection::{EntityCollection, Prior};
use crate::error::SyncError;
use crate::record::{Record, SyncStatus, Tracked};
use crate::summary::{Summary, SummaryCache};

/// A state transition on the entity store.
#[derive(Debug, Clone)]
pub enum Mutation<R> {
    /// Insert a pending record under a client-generated id.
    OptimisticAdd { record: R, temp_id: String },
    /// Replace a record's fields ahead of the server; status becomes pending.
    OptimisticUpdate { id: String, record: R },
    /// Remove a record ahead of the server.
    OptimisticRemove { id: String },
    /// Swap the entry under `id` for the server's canonical record.
    Reconcile { id: String, record: R },
    /// Tag a record as failed, keeping it in place.
    MarkError { id: String, error: SyncError },
    /// Undo an optimistic mutation.
    Revert { id: String, prior: Option<Prior<R>> },
    RemoveConfirmed { id: String },
    Clear,
    /// Replace the collection with server truth.
    Load { records: Vec<R> },
    /// Replace the collection wholesale (failed clear, persisted state).
    Restore { collection: EntityCollection<R> },
    /// Drop an error-tagged record at the user's request.
    Dismiss { id: String },
}

/// What kind of change observers are told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
    Reconciled,
    Errored,
    Reverted,
    Cleared,
    Loaded,
    Restored,
    Dismissed,
}

/// Notification payload handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub kind: ChangeKind,
    /// The record id the change concerns; `None` for whole-collection changes.
    pub id: Option<String>,
}

/// Handle returned by [`EntityStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<R> = Box<dyn Fn(&StoreChange, &EntityCollection<R>) + Send + Sync>;

/// The authoritative in-memory collection for one record type.
pub struct EntityStore<R: Record> {
    collection: EntityCollection<R>,
    observers: Vec<(SubscriptionId, Observer<R>)>,
    next_subscription: u64,
    summaries: SummaryCache,
}

impl<R: Record> Default for EntityStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> EntityStore<R> {
    pub fn new() -> Self {
        Self::with_collection(EntityCollection::new())
    }

    pub fn with_collection(collection: EntityCollection<R>) -> Self {
        Self {
            collection,
            observers: Vec::new(),
            next_subscription: 1,
            summaries: SummaryCache::default(),
        }
    }

    pub fn collection(&self) -> &EntityCollection<R> {
        &self.collection
    }

    pub fn get(&self, id: &str) -> Option<&Tracked<R>> {
        self.collection.get(id)
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Memoized aggregate over the current collection.
    pub fn summary<S>(&self) -> S
    where
        S: Summary<R>,
    {
        self.summaries.get_or_compute(&self.collection)
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&StoreChange, &EntityCollection<R>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(candidate, _)| *candidate != id);
        self.observers.len() != before
    }

    pub fn apply_optimistic_add(&mut self, record: R, temp_id: impl Into<String>) {
        self.apply(Mutation::OptimisticAdd {
            record,
            temp_id: temp_id.into(),
        });
    }

    pub fn apply_optimistic_update(&mut self, id: &str, record: R) -> Option<Prior<R>> {
        self.apply(Mutation::OptimisticUpdate {
            id: id.to_string(),
            record,
        })
    }

    pub fn apply_optimistic_remove(&mut self, id: &str) -> Option<Prior<R>> {
        self.apply(Mutation::OptimisticRemove { id: id.to_string() })
    }

    pub fn reconcile(&mut self, id: &str, record: R) {
        self.apply(Mutation::Reconcile {
            id: id.to_string(),
            record,
        });
    }

    pub fn mark_error(&mut self, id: &str, error: SyncError) {
        self.apply(Mutation::MarkError {
            id: id.to_string(),
            error,
        });
    }

    pub fn revert(&mut self, id: &str, prior: Option<Prior<R>>) {
        self.apply(Mutation::Revert {
            id: id.to_string(),
            prior,
        });
    }

    pub fn remove_confirmed(&mut self, id: &str) {
        self.apply(Mutation::RemoveConfirmed { id: id.to_string() });
    }

    pub fn clear(&mut self) {
        self.apply(Mutation::Clear);
    }

    pub fn load(&mut self, records: Vec<R>) {
        self.apply(Mutation::Load { records });
    }

    pub fn restore(&mut self, collection: EntityCollection<R>) {
        self.apply(Mutation::Restore { collection });
    }

    pub fn dismiss(&mut self, id: &str) -> Option<Prior<R>> {
        self.apply(Mutation::Dismiss { id: id.to_string() })
    }

    /// Apply one mutation. Returns the entry it displaced, if any.
    pub fn apply(&mut self, mutation: Mutation<R>) -> Option<Prior<R>> {
        let (change, displaced) = match mutation {
            Mutation::OptimisticAdd { mut record, temp_id } => {
                record.set_id(temp_id.clone());
                self.collection.insert(Tracked::pending_local(record));
                (Some(change(ChangeKind::Added, &temp_id)), None)
            }
            Mutation::OptimisticUpdate { id, mut record } => {
                match (self.collection.position(&id), self.collection.get(&id)) {
                    (Some(index), Some(existing)) => {
                        let prior = Prior {
                            entry: existing.clone(),
                            index,
                        };
                        record.set_id(id.clone());
                        self.collection.insert(Tracked {
                            record,
                            status: SyncStatus::Pending,
                            error: None,
                            local: prior.entry.local,
                        });
                        (Some(change(ChangeKind::Updated, &id)), Some(prior))
                    }
                    _ => (None, None),
                }
            }
            Mutation::OptimisticRemove { id } => match self.collection.remove(&id) {
                Some(prior) => (Some(change(ChangeKind::Removed, &id)), Some(prior)),
                None => (None, None),
            },
            Mutation::Reconcile { id, record } => (self.reconcile_entry(&id, record), None),
            Mutation::MarkError { id, error } => {
                let updated = self.collection.update(&id, |entry| {
                    entry.status = SyncStatus::Error;
                    entry.error = Some(error);
                });
                (updated.then(|| change(ChangeKind::Errored, &id)), None)
            }
            Mutation::Revert { id, prior } => {
                let removed = self.collection.remove(&id).is_some();
                match prior {
                    Some(prior) => {
                        self.collection.remove(prior.entry.id());
                        self.collection.insert_at(prior.index, prior.entry);
                        (Some(change(ChangeKind::Reverted, &id)), None)
                    }
                    None => (removed.then(|| change(ChangeKind::Reverted, &id)), None),
                }
            }
            Mutation::RemoveConfirmed { id } => match self.collection.remove(&id) {
                Some(prior) => (Some(change(ChangeKind::Removed, &id)), Some(prior)),
                None => (None, None),
            },
            Mutation::Clear => {
                self.collection.clear();
                (Some(whole(ChangeKind::Cleared)), None)
            }
            Mutation::Load { records } => {
                self.load_entries(records);
                (Some(whole(ChangeKind::Loaded)), None)
            }
            Mutation::Restore { collection } => {
                self.collection.replace_with(collection);
                (Some(whole(ChangeKind::Restored)), None)
            }
            Mutation::Dismiss { id } => {
                let dismissable = self.collection.get(&id).is_some_and(Tracked::is_error);
                if dismissable {
                    let prior = self.collection.remove(&id);
                    (Some(change(ChangeKind::Dismissed, &id)), prior)
                } else {
                    (None, None)
                }
            }
        };

        if let Some(change) = change {
            self.notify(&change);
        }
        displaced
    }

    fn reconcile_entry(&mut self, id: &str, record: R) -> Option<StoreChange> {
        let server_id = record.id().to_string();
        let key = record.natural_key();
        let entry = Tracked::synced(record);

        if self.collection.contains(id) {
            self.collection.replace_key(id, entry);
        } else if self.collection.contains(&server_id) {
            // Last write wins: responses are not sequenced.
            debug!(
                "{}: reconciling {} over existing {}",
                R::COLLECTION,
                id,
                server_id
            );
            self.collection.insert(entry);
        } else {
            debug!(
                "{}: ignoring reconciliation for {}, no longer in collection",
                R::COLLECTION,
                id
            );
            return None;
        }

        let duplicates: Vec<String> = self
            .collection
            .iter()
            .filter(|other| other.id() != server_id && other.record.natural_key() == key)
            .map(|other| other.id().to_string())
            .collect();
        for duplicate in duplicates {
            debug!("{}: dropping duplicate {} for key {}", R::COLLECTION, duplicate, key);
            self.collection.remove(&duplicate);
        }

        Some(change(ChangeKind::Reconciled, &server_id))
    }

    fn load_entries(&mut self, records: Vec<R>) {
        let mut loaded = EntityCollection::from_records(records);
        // Optimistic creates still in flight survive a reload.
        for entry in self.collection.iter().filter(|entry| entry.local) {
            let key = entry.record.natural_key();
            if loaded.find_by_natural_key(&key).is_none() {
                loaded.insert(entry.clone());
            }
        }
        self.collection.replace_with(loaded);
    }

    fn notify(&self, change: &StoreChange) {
        for (_, observer) in &self.observers {
            observer(change, &self.collection);
        }
    }
}

fn change(kind: ChangeKind, id: &str) -> StoreChange {
    StoreChange {
        kind,
        id: Some(id.to_string()),
    }
}

fn whole(kind: ChangeKind) -> StoreChange {
    StoreChange { kind, id: None }
}
