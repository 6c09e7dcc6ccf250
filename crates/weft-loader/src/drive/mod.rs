//! Admission-gated virtual drive: read access to remote, content-addressed data exposed
//! to the guest as pseudo-files.
//!
//! # Overview
//!
//! Guests open virtual paths of the form `/data/{id}` and read the identified content in
//! cursor-advancing chunks. Two properties make this safe to expose to untrusted code:
//!
//! - **Admission before network.** [`VirtualDrive::open`] resolves the path and checks the
//!   identifier against the [`AdmissionList`] without performing any I/O. A rejected
//!   identifier never reaches the content-lookup step, so the sandbox cannot be used to
//!   probe arbitrary external content.
//! - **One fetch per instance.** Content is fetched lazily on first read and cached for
//!   the lifetime of the instance; later reads of the same identifier are served from the
//!   cache.
//!
//! Upstream failures are not harness-fatal: they surface to the calling guest code, which
//! sees `open` return `0` on denial and `read` return `-1` on fetch failure. The typed
//! [`DriveError`] values are what the Rust API reports.
//!
//! # Module Structure
//!
//! - `admission` - [`ContentId`], [`AdmissionList`] and virtual path resolution
//! - `store` - the [`ContentStore`] trait, the HTTP implementation and [`StoreMode`]
//! - `error` - [`DriveError`]

mod admission;
pub use admission::*;

mod error;
pub use error::*;

mod store;
pub use store::*;

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use bytes::Bytes;

use crate::{constants::drive::DEFAULT_ENDPOINT, ProcessInfo};

/// Configuration of the virtual drive overlay.
#[derive(Clone, Debug)]
pub struct DriveConfig {
    /// Base URL of the content store.
    pub endpoint: String,
    /// Which mirror layout the endpoint serves.
    pub mode: StoreMode,
    /// Identifiers the drive may resolve.
    pub admission: AdmissionList,
    /// Height of the block the hosting process is evaluating at; opaque context.
    pub block_height: u64,
    /// Scheduler wallet for spawned processes; opaque context.
    pub scheduler: Option<String>,
    /// Descriptor of the hosting process; opaque context.
    pub process: ProcessInfo,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            mode: StoreMode::default(),
            admission: AdmissionList::default(),
            block_height: 0,
            scheduler: None,
            process: ProcessInfo::default(),
        }
    }
}

/// An open descriptor: the admitted identifier and the guest's read position in it.
#[derive(Debug)]
struct OpenHandle {
    id: ContentId,
    cursor: usize,
}

/// The drive overlay owned by one sandbox instance.
#[derive(Debug)]
pub struct VirtualDrive {
    admission: AdmissionList,
    store: Arc<dyn ContentStore>,
    cache: HashMap<ContentId, Bytes>,
    handles: Vec<Option<OpenHandle>>,
}

impl VirtualDrive {
    /// Builds a drive over the HTTP content store described by `config`.
    pub fn new(config: DriveConfig) -> Result<Self, DriveError> {
        let store = HttpContentStore::new(&config.endpoint, config.mode)?;
        tracing::debug!(
            endpoint = %config.endpoint,
            mode = %config.mode,
            admitted = config.admission.len(),
            block_height = config.block_height,
            scheduler = config.scheduler.as_deref().unwrap_or_default(),
            process = %config.process.id,
            "virtual drive attached"
        );
        Ok(Self::with_store(config.admission, Arc::new(store)))
    }

    /// Builds a drive over an arbitrary content store.
    pub fn with_store(admission: AdmissionList, store: Arc<dyn ContentStore>) -> Self {
        Self { admission, store, cache: HashMap::new(), handles: Vec::new() }
    }

    /// Resolves a virtual path and allocates a descriptor for it.
    ///
    /// Performs no I/O: the only check is the admission list, so a denial can never leak
    /// a network request.
    pub fn open(&mut self, path: &str) -> Result<u32, DriveError> {
        let Some(id) = parse_virtual_path(path) else {
            tracing::debug!(path, "drive open denied: path outside the drive namespace");
            return Err(DriveError::PermissionDenied(path.to_owned()));
        };
        if !self.admission.is_admitted(&id) {
            tracing::debug!(id = %id, "drive open denied: identifier not admitted");
            return Err(DriveError::PermissionDenied(path.to_owned()));
        }
        self.handles.push(Some(OpenHandle { id, cursor: 0 }));
        Ok(self.handles.len() as u32)
    }

    /// Reads up to `len` bytes at the descriptor's cursor, fetching and caching the
    /// content on first use. Returns an empty chunk at end of content.
    pub async fn read_chunk(&mut self, fd: u32, len: usize) -> Result<Bytes, DriveError> {
        let index = (fd as usize).checked_sub(1).ok_or(DriveError::BadDescriptor(fd))?;
        let (id, cursor) = match self.handles.get(index) {
            Some(Some(handle)) => (handle.id.clone(), handle.cursor),
            _ => return Err(DriveError::BadDescriptor(fd)),
        };
        let content = match self.cache.entry(id.clone()) {
            Entry::Occupied(entry) => {
                tracing::trace!(id = %id, "drive cache hit");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let bytes = self.store.fetch(&id).await?;
                tracing::debug!(id = %id, bytes = bytes.len(), "fetched drive content");
                entry.insert(bytes)
            }
        };
        let take = len.min(content.len().saturating_sub(cursor));
        let chunk = content.slice(cursor..cursor + take);
        if let Some(Some(handle)) = self.handles.get_mut(index) {
            handle.cursor += take;
        }
        Ok(chunk)
    }

    /// Releases a descriptor. Unknown or already-closed descriptors are ignored.
    pub fn close(&mut self, fd: u32) {
        if let Some(slot) = (fd as usize).checked_sub(1).and_then(|i| self.handles.get_mut(i)) {
            *slot = None;
        }
    }

    /// The admission list this drive enforces.
    pub fn admission(&self) -> &AdmissionList {
        &self.admission
    }

    /// Number of content items currently cached.
    pub fn cached_items(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryStore;

    fn drive_with(items: &[(&str, &[u8])], admitted: &[&str]) -> (VirtualDrive, MemoryStore) {
        let mut store = MemoryStore::default();
        for (id, bytes) in items {
            store.insert(*id, bytes.to_vec());
        }
        let admission = admitted.iter().copied().collect();
        let drive = VirtualDrive::with_store(admission, Arc::new(store.clone()));
        (drive, store)
    }

    #[tokio::test]
    async fn chunked_reads_advance_the_cursor() {
        let (mut drive, _) = drive_with(&[("item", b"hello world")], &["item"]);
        let fd = drive.open("/data/item").unwrap();
        assert_eq!(drive.read_chunk(fd, 5).await.unwrap().as_ref(), b"hello");
        assert_eq!(drive.read_chunk(fd, 5).await.unwrap().as_ref(), b" worl");
        assert_eq!(drive.read_chunk(fd, 5).await.unwrap().as_ref(), b"d");
        assert!(drive.read_chunk(fd, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_is_fetched_once_per_instance() {
        let (mut drive, store) = drive_with(&[("item", b"payload")], &["item"]);
        let first = drive.open("/data/item").unwrap();
        let second = drive.open("/data/item").unwrap();
        drive.read_chunk(first, 16).await.unwrap();
        drive.read_chunk(second, 16).await.unwrap();
        assert_eq!(store.fetches(), 1);
        assert_eq!(drive.cached_items(), 1);
    }

    #[tokio::test]
    async fn unadmitted_identifier_is_denied_without_a_fetch() {
        let (mut drive, store) = drive_with(&[("item", b"payload")], &["other"]);
        assert!(matches!(
            drive.open("/data/item"),
            Err(DriveError::PermissionDenied(path)) if path == "/data/item"
        ));
        assert_eq!(store.fetches(), 0);
    }

    #[tokio::test]
    async fn closed_descriptor_is_rejected() {
        let (mut drive, _) = drive_with(&[("item", b"payload")], &["item"]);
        let fd = drive.open("/data/item").unwrap();
        drive.close(fd);
        drive.close(fd);
        let err = drive.read_chunk(fd, 4).await;
        assert!(matches!(err, Err(DriveError::BadDescriptor(found)) if found == fd));
    }

    #[tokio::test]
    async fn missing_content_surfaces_as_a_fetch_error() {
        let (mut drive, _) = drive_with(&[], &["ghost"]);
        let fd = drive.open("/data/ghost").unwrap();
        let err = drive.read_chunk(fd, 4).await;
        assert!(matches!(err, Err(DriveError::Fetch { id, .. }) if id.as_str() == "ghost"));
    }
}
