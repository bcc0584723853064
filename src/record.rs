//! Records - the domain objects held by an entity store.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;

const TEMP_ID_PREFIX: &str = "tmp-";

/// Trait for domain objects kept in an entity collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection name for this record type (e.g., "cart_lines", "reviews").
    /// Used for storage keys and remote routes.
    const COLLECTION: &'static str;

    /// Returns the surrogate identifier (temporary while pending creation).
    fn id(&self) -> &str;

    /// Replaces the surrogate identifier.
    fn set_id(&mut self, id: String);

    /// Business key used to detect duplicates, e.g. `product:variant`.
    fn natural_key(&self) -> String;

    /// Merge an incoming add into an already synced record with the same
    /// natural key. The result keeps `existing`'s id.
    fn absorb(&self, existing: &Self) -> Self {
        let mut merged = self.clone();
        merged.set_id(existing.id().to_string());
        merged
    }
}

/// Renders a field as one segment of a natural key.
pub trait KeyPart {
    fn key_part(&self) -> String;
}

impl KeyPart for String {
    fn key_part(&self) -> String {
        self.clone()
    }
}

impl KeyPart for &str {
    fn key_part(&self) -> String {
        (*self).to_string()
    }
}

impl<T: KeyPart> KeyPart for Option<T> {
    fn key_part(&self) -> String {
        match self {
            Some(value) => value.key_part(),
            None => String::new(),
        }
    }
}

macro_rules! key_part_display {
    ($($ty:ty),*) => {
        $(
            impl KeyPart for $ty {
                fn key_part(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

key_part_display!(u8, u16, u32, u64, i32, i64, usize, Uuid);

/// Generate a client-side temporary id.
pub fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

/// True if `id` was generated by [`temp_id`].
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Synchronization state of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Error,
}

/// A record together with its sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
pub struct Tracked<R> {
    pub record: R,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SyncError>,
    /// True until the server has confirmed the record and assigned its id.
    #[serde(default)]
    pub local: bool,
}

impl<R: Record> Tracked<R> {
    /// A record confirmed by the server.
    pub fn synced(record: R) -> Self {
        Self {
            record,
            status: SyncStatus::Synced,
            error: None,
            local: false,
        }
    }

    /// An optimistic record not yet created on the server.
    pub fn pending_local(record: R) -> Self {
        Self {
            record,
            status: SyncStatus::Pending,
            error: None,
            local: true,
        }
    }

    pub fn id(&self) -> &str {
        self.record.id()
    }

    pub fn is_pending(&self) -> bool {
        self.status == SyncStatus::Pending
    }

    pub fn is_synced(&self) -> bool {
        self.status == SyncStatus::Synced
    }

    pub fn is_error(&self) -> bool {
        self.status == SyncStatus::Error
    }
}
