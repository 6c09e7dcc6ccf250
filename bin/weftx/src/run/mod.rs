//! Run module for executing a single message
//!
//! This module drives one message through a WASM module and prints the
//! resulting bundle, optionally persisting the heap snapshot for later calls.

mod cmd;

pub use cmd::*;

// Re-export from common module
pub use crate::common::{
    load_json, DriveArgs, HarnessArgs, LogArgs, Result, WeftxError as RunError,
};
