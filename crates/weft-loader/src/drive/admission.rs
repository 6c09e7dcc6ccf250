//! Content identifiers, path resolution and the admission list.

use std::collections::HashSet;

use crate::constants::drive::PATH_PREFIX;

/// Identifier of one content item in the remote store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub struct ContentId(String);

impl ContentId {
    /// Wraps a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// The fixed set of identifiers a drive may resolve.
///
/// Admission is checked against this list before any network activity. An empty list
/// denies every identifier; there is no wildcard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdmissionList(HashSet<ContentId>);

impl AdmissionList {
    /// An empty list, denying all identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identifier to the list.
    pub fn insert(&mut self, id: impl Into<ContentId>) {
        self.0.insert(id.into());
    }

    /// Whether `id` may be resolved.
    pub fn is_admitted(&self, id: &ContentId) -> bool {
        self.0.contains(id)
    }

    /// Number of admitted identifiers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list admits nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<I: Into<ContentId>> FromIterator<I> for AdmissionList {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Resolves a guest-visible virtual path to the content identifier it names.
///
/// Only single-segment paths under the drive namespace resolve; anything else is outside
/// the drive and yields `None`.
pub(crate) fn parse_virtual_path(path: &str) -> Option<ContentId> {
    let id = path.strip_prefix(PATH_PREFIX)?;
    (!id.is_empty() && !id.contains('/')).then(|| ContentId::new(id))
}
