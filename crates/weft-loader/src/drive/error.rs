//! Virtual drive error type.

use super::ContentId;

/// Errors surfaced by the virtual drive.
///
/// These are reported through the host API; the sandboxed guest only ever observes the
/// sentinel values (`open` returning `0`, `read` returning `-1`).
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    /// The path is outside the drive namespace or its identifier is not admitted.
    #[error("permission denied: `{0}` is not admissible")]
    PermissionDenied(String),
    /// The upstream store failed to produce the content body.
    #[error("failed to fetch `{id}`: {reason}")]
    Fetch {
        /// Identifier whose fetch failed.
        id: ContentId,
        /// Upstream failure description.
        reason: String,
    },
    /// The descriptor is unknown or already closed.
    #[error("unknown drive descriptor {0}")]
    BadDescriptor(u32),
    /// The HTTP client could not be constructed.
    #[error("failed to build the content store client: {0}")]
    Client(reqwest::Error),
}
