//! In-memory content store.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;

use crate::drive::{ContentId, ContentStore, DriveError, FetchFuture};

/// [`ContentStore`] backed by a shared map, counting every upstream fetch.
///
/// Clones share their contents and fetch counter, so a test can keep one handle for
/// assertions while the drive owns the other.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<ContentId, Bytes>>>,
    fetches: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Stores a content body under `id`.
    pub fn insert(&mut self, id: impl Into<ContentId>, body: impl Into<Bytes>) {
        self.items.lock().unwrap().insert(id.into(), body.into());
    }

    /// Number of fetches served so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ContentStore for MemoryStore {
    fn fetch<'a>(&'a self, id: &'a ContentId) -> FetchFuture<'a> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let item = self.items.lock().unwrap().get(id).cloned();
            item.ok_or_else(|| DriveError::Fetch {
                id: id.clone(),
                reason: "not found".to_owned(),
            })
        })
    }
}
