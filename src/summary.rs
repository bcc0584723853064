//! Derived views - read-only aggregates computed from a collection.
//!
//! A summary has no lifecycle of its own. It is a pure function of the
//! collection, memoized on the collection's identity (instance + revision),
//! so repeated reads of an unchanged collection return the cached value.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Mutex;

use crate::collection::EntityCollection;
use crate::record::Record;

/// An aggregate derived from an entity collection.
///
/// Implementations must not fail: records missing the data an aggregate needs
/// contribute zero so the view always renders.
pub trait Summary<R: Record>: Clone + Send + 'static {
    fn summarize(collection: &EntityCollection<R>) -> Self;
}

/// Compute a summary without memoization.
pub fn summarize<R, S>(collection: &EntityCollection<R>) -> S
where
    R: Record,
    S: Summary<R>,
{
    S::summarize(collection)
}

/// Memoizes one summary type over whichever collection it is handed.
pub struct Selector<R, S> {
    cache: Mutex<Option<(u64, u64, S)>>,
    _marker: PhantomData<fn(&R)>,
}

impl<R: Record, S: Summary<R>> Default for Selector<R, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record, S: Summary<R>> Selector<R, S> {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    pub fn select(&self, collection: &EntityCollection<R>) -> S {
        let identity = (collection.instance(), collection.revision());
        let Ok(mut cache) = self.cache.lock() else {
            return S::summarize(collection);
        };

        if let Some((instance, revision, value)) = cache.as_ref() {
            if (*instance, *revision) == identity {
                return value.clone();
            }
        }

        let value = S::summarize(collection);
        *cache = Some((identity.0, identity.1, value.clone()));
        value
    }
}

struct Memo {
    instance: u64,
    revision: u64,
    value: Box<dyn Any + Send>,
}

/// Type-keyed memo table used by the entity store.
#[derive(Default)]
pub(crate) struct SummaryCache {
    entries: Mutex<HashMap<TypeId, Memo>>,
}

impl SummaryCache {
    pub(crate) fn get_or_compute<R, S>(&self, collection: &EntityCollection<R>) -> S
    where
        R: Record,
        S: Summary<R>,
    {
        let Ok(mut entries) = self.entries.lock() else {
            return S::summarize(collection);
        };

        let key = TypeId::of::<S>();
        if let Some(memo) = entries.get(&key) {
            if memo.instance == collection.instance() && memo.revision == collection.revision() {
                if let Some(value) = memo.value.downcast_ref::<S>() {
                    return value.clone();
                }
            }
        }

        let value = S::summarize(collection);
        entries.insert(
            key,
            Memo {
                instance: collection.instance(),
                revision: collection.revision(),
                value: Box::new(value.clone()),
            },
        );
        value
    }
}
