//! Deterministic WASM execution harness: instantiate a guest module behind a metered,
//! capability-injected import surface, drive it with messages, and carry its linear memory
//! forward between calls so any party can re-execute the same sequence bit-for-bit.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod config;
pub use config::*;

mod determinism;
pub use determinism::*;

mod error;
pub use error::*;

mod gas;
pub use gas::*;

mod imports;

mod instance;
pub use instance::*;

mod memory;
pub use memory::*;

mod message;
pub use message::*;

pub mod drive;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
