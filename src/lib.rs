// Lets `#[derive(Record)]` expand to `storefront_sync::...` paths inside this crate too.
extern crate self as storefront_sync;

mod collection;
mod config;
mod dispatcher;
mod engine;
mod error;
mod notify;
mod persist;
mod record;
#[cfg(feature = "runtime")]
mod runtime;
mod store;
mod summary;

pub mod slices;
pub mod sync;

pub use collection::{CollectionSnapshot, EntityCollection, Prior};
pub use config::{FailurePolicy, StoreConfig};
pub use dispatcher::{Command, Dispatcher, Submission};
pub use engine::SyncEngine;
pub use error::{DropReason, ErrorCode, StoreError, SyncError};
pub use notify::{BufferNotifier, Level, LogNotifier, Notification, Notifier};
pub use persist::{FileStorage, InMemoryStorage, Persister, SnapshotStorage};
pub use record::{is_temp_id, temp_id, KeyPart, Record, SyncStatus, Tracked};
#[cfg(feature = "runtime")]
pub use runtime::{RuntimeStats, StoreHandle, StoreRuntime};
pub use store::{ChangeKind, EntityStore, Mutation, StoreChange, SubscriptionId};
pub use summary::{summarize, Selector, Summary};
pub use sync::{InMemorySyncAdapter, SyncAdapter, SyncOp, SyncRequest, SyncResponse};

#[cfg(feature = "http")]
pub use sync::HttpSyncAdapter;

#[cfg(feature = "emitter")]
pub use notify::EmitterNotifier;

// Derive macro; lives in the macro namespace next to the trait.
pub use storefront_sync_macros::Record;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
