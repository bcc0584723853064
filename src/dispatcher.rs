//! Command dispatch - user intents in, optimistic mutations and sync requests out.
//!
//! [`Dispatcher::submit`] applies the optimistic half of a command to the
//! store right away and hands back the [`SyncRequest`] the caller must
//! execute. Once the remote side answers, [`Dispatcher::complete`] turns the
//! outcome into reconciling mutations. Between the two calls the store is
//! free to take other commands.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::collection::EntityCollection;
use crate::config::{FailurePolicy, StoreConfig};
use crate::error::{DropReason, SyncError};
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::persist::{Persister, SnapshotStorage};
use crate::record::{temp_id, Record, SyncStatus, Tracked};
use crate::store::{EntityStore, StoreChange, SubscriptionId};
use crate::summary::Summary;
use crate::sync::{SyncOp, SyncRequest, SyncResponse};

/// A user intent against one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<R> {
    /// Add a record, or merge it into the record sharing its natural key.
    Add(R),
    /// Replace the record carrying the same id.
    Update(R),
    Remove(String),
    Clear,
    /// Reload the collection from the server.
    Load,
    /// Resend the request for an error-tagged record.
    Retry(String),
    /// Drop an error-tagged record without contacting the server.
    Dismiss(String),
}

/// What `submit` did with a command.
#[derive(Debug, Clone)]
pub enum Submission<R> {
    /// The store changed optimistically; execute this request and pass the
    /// outcome to [`Dispatcher::complete`].
    Dispatched(SyncRequest<R>),
    /// Rejected locally. The store is unchanged.
    Dropped(DropReason),
    /// Handled entirely on the client.
    Local,
}

impl<R> Submission<R> {
    pub fn request(&self) -> Option<&SyncRequest<R>> {
        match self {
            Submission::Dispatched(request) => Some(request),
            _ => None,
        }
    }

    pub fn into_request(self) -> Option<SyncRequest<R>> {
        match self {
            Submission::Dispatched(request) => Some(request),
            _ => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, Submission::Dropped(_))
    }
}

/// Owns an entity store and drives it through the optimistic sync cycle.
pub struct Dispatcher<R: Record> {
    store: EntityStore<R>,
    config: StoreConfig,
    notifier: Arc<dyn Notifier>,
    persister: Option<Persister<R>>,
    next_ticket: u64,
}

impl<R: Record> Default for Dispatcher<R> {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl<R: Record> Dispatcher<R> {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            store: EntityStore::new(),
            config,
            notifier: Arc::new(LogNotifier),
            persister: None,
            next_ticket: 1,
        }
    }

    pub fn with_notifier<N>(mut self, notifier: N) -> Self
    where
        N: Notifier + 'static,
    {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Attach snapshot storage and seed the store from it.
    ///
    /// Does nothing when persistence is disabled in the config.
    pub fn with_storage(mut self, storage: Arc<dyn SnapshotStorage>) -> Self {
        if !self.config.persist {
            debug!("{}: persistence disabled, ignoring storage", R::COLLECTION);
            return self;
        }
        let mut persister = Persister::new(
            storage,
            self.config.storage_key_for::<R>(),
            self.config.debounce(),
        );
        persister.seed(&mut self.store);
        self.persister = Some(persister);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore<R> {
        &self.store
    }

    pub fn collection(&self) -> &EntityCollection<R> {
        self.store.collection()
    }

    pub fn get(&self, id: &str) -> Option<&Tracked<R>> {
        self.store.get(id)
    }

    pub fn summary<S: Summary<R>>(&self) -> S {
        self.store.summary::<S>()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&StoreChange, &EntityCollection<R>) + Send + Sync + 'static,
    {
        self.store.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Write any snapshot held back by the debounce window.
    pub fn flush(&mut self) {
        if let Some(persister) = self.persister.as_mut() {
            persister.flush();
        }
    }

    /// Apply a command optimistically.
    pub fn submit(&mut self, command: Command<R>) -> Submission<R> {
        let revision = self.store.collection().revision();
        let submission = match command {
            Command::Add(record) => self.submit_add(record),
            Command::Update(record) => self.submit_update(record),
            Command::Remove(id) => self.submit_remove(&id),
            Command::Clear => {
                let snapshot = self.store.collection().clone();
                self.store.clear();
                self.dispatch(SyncOp::Clear { snapshot })
            }
            Command::Load => self.dispatch(SyncOp::Load),
            Command::Retry(id) => match self.store.get(&id) {
                None => Submission::Dropped(DropReason::UnknownRecord),
                Some(entry) if entry.is_error() => {
                    let record = entry.record.clone();
                    self.resend(&id, record)
                }
                Some(_) => Submission::Dropped(DropReason::NotInError),
            },
            Command::Dismiss(id) => match self.store.get(&id).map(|entry| entry.status) {
                None => Submission::Dropped(DropReason::UnknownRecord),
                Some(SyncStatus::Error) => {
                    self.store.dismiss(&id);
                    Submission::Local
                }
                Some(_) => Submission::Dropped(DropReason::NotInError),
            },
        };

        match &submission {
            Submission::Dropped(reason) => debug!("{}: dropped command: {}", R::COLLECTION, reason),
            Submission::Dispatched(request) => debug!(
                "{}: dispatched {} ticket {}",
                R::COLLECTION,
                request.op.name(),
                request.ticket
            ),
            Submission::Local => {}
        }

        self.persist_if_changed(revision);
        submission
    }

    /// Fold a sync outcome back into the store.
    ///
    /// Failures are handled here, reported to the notifier and never
    /// returned to the caller.
    pub fn complete(&mut self, request: SyncRequest<R>, outcome: Result<SyncResponse<R>, SyncError>) {
        let revision = self.store.collection().revision();
        let SyncRequest { ticket, op } = request;
        let name = op.name();

        match (op, outcome) {
            (SyncOp::Create { temp_id, .. }, Ok(SyncResponse::Record(record))) => {
                let id = record.id().to_string();
                self.store.reconcile(&temp_id, record);
                self.succeeded(name, Some(&id));
            }
            (SyncOp::Update { id, .. }, Ok(SyncResponse::Record(record))) => {
                self.store.reconcile(&id, record);
                self.succeeded(name, Some(&id));
            }
            (SyncOp::Delete { id, .. }, Ok(_)) => {
                self.store.remove_confirmed(&id);
                self.succeeded(name, Some(&id));
            }
            // Already cleared when the command was submitted.
            (SyncOp::Clear { .. }, Ok(_)) => self.succeeded(name, None),
            (SyncOp::Load, Ok(SyncResponse::Records(records))) => {
                info!("{}: loaded {} records", R::COLLECTION, records.len());
                self.store.load(records);
                self.succeeded(name, None);
            }
            (op, Ok(response)) => {
                let error = SyncError::server(format!(
                    "unexpected {} response to {}",
                    response_kind(&response),
                    name
                ))
                .with_context(format!("ticket {}", ticket));
                self.failed(op, error);
            }
            (op, Err(error)) => {
                warn!("{}: {} ticket {} failed: {}", R::COLLECTION, name, ticket, error);
                self.failed(op, error);
            }
        }

        self.persist_if_changed(revision);
    }

    fn submit_add(&mut self, record: R) -> Submission<R> {
        let key = record.natural_key();
        let existing = self
            .store
            .collection()
            .find_by_natural_key(&key)
            .map(|entry| (entry.id().to_string(), entry.status, entry.record.clone()));

        match existing {
            Some((_, SyncStatus::Pending, _)) => Submission::Dropped(DropReason::DuplicatePending),
            Some((id, SyncStatus::Synced, current)) => {
                let merged = record.absorb(&current);
                debug!("{}: add of {} becomes update of {}", R::COLLECTION, key, id);
                self.optimistic_update(&id, merged)
            }
            Some((id, SyncStatus::Error, _)) => {
                let mut record = record;
                record.set_id(id.clone());
                self.resend(&id, record)
            }
            None => {
                let temp_id = temp_id();
                self.store.apply_optimistic_add(record.clone(), temp_id.clone());
                let mut record = record;
                record.set_id(temp_id.clone());
                self.dispatch(SyncOp::Create { temp_id, record })
            }
        }
    }

    fn submit_update(&mut self, mut record: R) -> Submission<R> {
        let id = record.id().to_string();
        let Some(entry) = self.store.get(&id) else {
            return Submission::Dropped(DropReason::UnknownRecord);
        };
        match (entry.local, entry.status) {
            (true, SyncStatus::Pending) => Submission::Dropped(DropReason::AwaitingCreate),
            // Never reached the server, so the new payload is a fresh create.
            (true, _) => self.resend(&id, record),
            (false, _) => {
                record.set_id(id.clone());
                self.optimistic_update(&id, record)
            }
        }
    }

    fn submit_remove(&mut self, id: &str) -> Submission<R> {
        let Some(entry) = self.store.get(id) else {
            return Submission::Dropped(DropReason::UnknownRecord);
        };
        match (entry.local, entry.status) {
            (true, SyncStatus::Pending) => Submission::Dropped(DropReason::AwaitingCreate),
            (true, _) => {
                self.store.dismiss(id);
                Submission::Local
            }
            (false, _) => match self.store.apply_optimistic_remove(id) {
                Some(prior) => self.dispatch(SyncOp::Delete {
                    id: id.to_string(),
                    prior,
                }),
                None => Submission::Dropped(DropReason::UnknownRecord),
            },
        }
    }

    fn optimistic_update(&mut self, id: &str, record: R) -> Submission<R> {
        match self.store.apply_optimistic_update(id, record.clone()) {
            Some(prior) => self.dispatch(SyncOp::Update {
                id: id.to_string(),
                record,
                prior,
            }),
            None => Submission::Dropped(DropReason::UnknownRecord),
        }
    }

    /// Send an error-tagged record again: as a create if the server never
    /// saw it, as an update otherwise.
    fn resend(&mut self, id: &str, mut record: R) -> Submission<R> {
        let local = self.store.get(id).is_some_and(|entry| entry.local);
        record.set_id(id.to_string());
        if !local {
            return self.optimistic_update(id, record);
        }
        if self.store.apply_optimistic_update(id, record.clone()).is_none() {
            return Submission::Dropped(DropReason::UnknownRecord);
        }
        self.dispatch(SyncOp::Create {
            temp_id: id.to_string(),
            record,
        })
    }

    fn failed(&mut self, op: SyncOp<R>, error: SyncError) {
        let target = op.target().map(str::to_string);
        match op {
            SyncOp::Create { temp_id, .. } => {
                self.store.mark_error(&temp_id, error.clone());
                if self.config.failure_policy == FailurePolicy::Revert {
                    self.store.revert(&temp_id, None);
                }
            }
            SyncOp::Update { id, prior, .. } => {
                // Removed while the update was in flight: nothing to roll back.
                if self.store.collection().contains(&id) {
                    self.store.mark_error(&id, error.clone());
                    self.store.revert(&id, Some(prior));
                }
            }
            SyncOp::Delete { id, prior } => self.store.revert(&id, Some(prior)),
            SyncOp::Clear { snapshot } => {
                // Entries still present are newer than the snapshot; the
                // snapshot only fills in what is gone.
                let current = self.store.collection();
                let mut restored = EntityCollection::new();
                for entry in snapshot.iter() {
                    if let Some(newer) = current.get(entry.id()) {
                        restored.insert(newer.clone());
                    } else if current.find_by_natural_key(&entry.record.natural_key()).is_none() {
                        restored.insert(entry.clone());
                    }
                }
                for entry in current.iter() {
                    if !restored.contains(entry.id()) {
                        restored.insert(entry.clone());
                    }
                }
                self.store.restore(restored);
            }
            SyncOp::Load => {}
        }

        let mut notification = Notification::failure(R::COLLECTION, &error);
        if let Some(id) = target {
            notification = notification.for_record(id);
        }
        self.notifier.notify(notification);
    }

    fn succeeded(&self, name: &str, id: Option<&str>) {
        if !self.config.notify_success {
            return;
        }
        let mut notification =
            Notification::success(R::COLLECTION, format!("{} confirmed", name));
        if let Some(id) = id {
            notification = notification.for_record(id);
        }
        self.notifier.notify(notification);
    }

    fn dispatch(&mut self, op: SyncOp<R>) -> Submission<R> {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        Submission::Dispatched(SyncRequest { ticket, op })
    }

    fn persist_if_changed(&mut self, revision: u64) {
        if self.store.collection().revision() == revision {
            return;
        }
        if let Some(persister) = self.persister.as_mut() {
            persister.save(self.store.collection());
        }
    }
}

fn response_kind<R>(response: &SyncResponse<R>) -> &'static str {
    match response {
        SyncResponse::Record(_) => "record",
        SyncResponse::Records(_) => "records",
        SyncResponse::Removed => "removed",
    }
}
