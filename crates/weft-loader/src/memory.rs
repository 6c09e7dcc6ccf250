//! Linear-memory snapshots and heap growth.

use bytes::Bytes;
use wasmtime::{Memory, Store};

use crate::{constants::memory::PAGE_SIZE, InvokeError};

/// An immutable copy of a sandbox instance's full linear memory at the end of an
/// invocation.
///
/// A snapshot is always a copy, never a view: growth may relocate the live buffer, so a
/// view could be invalidated by the very next call. The handle itself is cheap to clone
/// and hand around; callers are responsible for storing it if they want to resume from it
/// later.
#[derive(Clone, Debug, Default, PartialEq, Eq, derive_more::Deref)]
pub struct MemorySnapshot(Bytes);

impl MemorySnapshot {
    /// The raw snapshot bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Unwraps the snapshot into its backing buffer.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for MemorySnapshot {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for MemorySnapshot {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl AsRef<[u8]> for MemorySnapshot {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Grows `memory` until it holds at least `needed` bytes, in whole pages.
///
/// Growth is monotonic: a request at or below the current size is a no-op. Requests past
/// `ceiling` fail before any growth is attempted.
pub(crate) fn grow_to<T>(
    store: &mut Store<T>,
    memory: Memory,
    needed: usize,
    ceiling: usize,
) -> Result<(), InvokeError> {
    let current = memory.data_size(&mut *store);
    if needed <= current {
        return Ok(());
    }
    if needed > ceiling {
        return Err(InvokeError::HeapResize { requested: needed, ceiling });
    }
    let target_pages = needed.div_ceil(PAGE_SIZE) as u64;
    let delta = target_pages.saturating_sub(memory.size(&mut *store));
    memory
        .grow(&mut *store, delta)
        .map_err(|_| InvokeError::HeapResize { requested: needed, ceiling })?;
    tracing::debug!(from = current, to = needed, "grew sandbox memory");
    Ok(())
}

/// Writes a prior snapshot into `memory`, growing it first when the snapshot is larger.
///
/// Bytes past the snapshot length are left untouched. Writing past the current bounds is
/// never attempted: the grow step precedes the copy.
pub(crate) fn load<T>(
    store: &mut Store<T>,
    memory: Memory,
    snapshot: &MemorySnapshot,
    ceiling: usize,
) -> Result<(), InvokeError> {
    grow_to(store, memory, snapshot.len(), ceiling)?;
    memory.data_mut(&mut *store)[..snapshot.len()].copy_from_slice(snapshot.as_slice());
    Ok(())
}

/// Captures the entire current memory as a fresh snapshot, by copy.
pub(crate) fn capture<T>(store: &Store<T>, memory: Memory) -> MemorySnapshot {
    MemorySnapshot(Bytes::copy_from_slice(memory.data(store)))
}
