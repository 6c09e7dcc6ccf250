//! Content-store abstraction and the HTTP gateway implementation.

use core::{fmt::Debug, future::Future, pin::Pin, str::FromStr};

use auto_impl::auto_impl;
use bytes::Bytes;

use super::{ContentId, DriveError};

/// Future returned by [`ContentStore::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Bytes, DriveError>> + Send + 'a>>;

/// Source of content bodies, keyed by [`ContentId`].
///
/// Implementations fetch the complete body in one call; chunking and caching are the
/// drive's concern, not the store's.
#[auto_impl(&, Box, Arc)]
pub trait ContentStore: Debug + Send + Sync {
    /// Fetches the full content body for `id`.
    fn fetch<'a>(&'a self, id: &'a ContentId) -> FetchFuture<'a>;
}

/// URL layout served by a gateway endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
pub enum StoreMode {
    /// Flat layout: content lives at `{endpoint}/{id}`.
    #[display("test")]
    Test,
    /// Gateway layout: raw bodies live at `{endpoint}/raw/{id}`.
    #[default]
    #[display("production")]
    Production,
}

impl FromStr for StoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown store mode `{other}`, expected `test` or `production`")),
        }
    }
}

/// [`ContentStore`] over an HTTP gateway.
#[derive(Clone, Debug)]
pub struct HttpContentStore {
    client: reqwest::Client,
    endpoint: String,
    mode: StoreMode,
}

impl HttpContentStore {
    /// Builds a store for `endpoint`, normalising away any trailing slash.
    pub fn new(endpoint: impl Into<String>, mode: StoreMode) -> Result<Self, DriveError> {
        let client = reqwest::Client::builder().build().map_err(DriveError::Client)?;
        let endpoint = endpoint.into().trim_end_matches('/').to_owned();
        Ok(Self { client, endpoint, mode })
    }

    fn content_url(&self, id: &ContentId) -> String {
        match self.mode {
            StoreMode::Test => format!("{}/{id}", self.endpoint),
            StoreMode::Production => format!("{}/raw/{id}", self.endpoint),
        }
    }
}

impl ContentStore for HttpContentStore {
    fn fetch<'a>(&'a self, id: &'a ContentId) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = self.content_url(id);
            tracing::trace!(%url, "fetching drive content");
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|err| DriveError::Fetch { id: id.clone(), reason: err.to_string() })?;
            if !response.status().is_success() {
                return Err(DriveError::Fetch {
                    id: id.clone(),
                    reason: format!("unexpected status {}", response.status()),
                });
            }
            response
                .bytes()
                .await
                .map_err(|err| DriveError::Fetch { id: id.clone(), reason: err.to_string() })
        })
    }
}
