//! Replay module for driving recorded message sequences
//!
//! This module re-executes a recorded sequence of messages against a module,
//! threading the heap snapshot from each step into the next.

mod cmd;

pub use cmd::*;

// Re-export WeftxError and Result from common module
pub use crate::common::{Result, WeftxError as ReplayError};
