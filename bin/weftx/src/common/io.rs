//! File input helpers for weftx

use std::path::Path;

use serde::de::DeserializeOwned;

use super::Result;

/// Reads a JSON value from `path`, or returns the type's default when no path is given.
pub fn load_json<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => Ok(serde_json::from_slice(&std::fs::read(path)?)?),
        None => Ok(T::default()),
    }
}
