//! Test utilities: canned guest programs and an in-memory content store.

mod fixtures;
pub use fixtures::*;

mod store;
pub use store::*;

use serde_json::Value;

use crate::{Environment, Message, ProcessInfo, Tag};

/// A representative message carrying `id`, addressed to the canned test process.
pub fn message(id: &str) -> Message {
    Message {
        id: id.to_owned(),
        target: "process-1".to_owned(),
        owner: "owner-1".to_owned(),
        module: "module-1".to_owned(),
        block_height: "1000".to_owned(),
        tags: vec![Tag::new("Action", "Eval")],
        data: Value::String(String::new()),
    }
}

/// The environment the canned test process runs in.
pub fn environment() -> Environment {
    Environment {
        process: ProcessInfo {
            id: "process-1".to_owned(),
            owner: "owner-1".to_owned(),
            tags: vec![Tag::new("Name", "test-process")],
        },
    }
}
