//! Wire types exchanged with the sandboxed program.
//!
//! Messages and environments travel into the guest as JSON frames; the guest answers with
//! a `{ok, response}` verdict that must decode into [`HandlerOutcome`]. Field casing on
//! the wire follows the process protocol (`Target`, `Block-Height`, `GasUsed`, ...), which
//! is why every struct here pins its serde renames.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::MemorySnapshot;

/// A name/value pair attached to messages and process descriptors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Creates a tag from anything string-like.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// One unit of work delivered to the guest's entry point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Message {
    /// Identifier of this message.
    pub id: String,
    /// The process the message addresses.
    pub target: String,
    /// Wallet that signed the message.
    pub owner: String,
    /// Identifier of the module the target process runs.
    pub module: String,
    /// Height of the block the message was assigned in.
    #[serde(rename = "Block-Height")]
    pub block_height: String,
    /// Ordered name/value pairs describing the message.
    pub tags: Vec<Tag>,
    /// Opaque payload, often program source text.
    pub data: Value,
}

/// Ambient description of the process hosting the computation, supplied per invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Environment {
    /// The hosting process.
    pub process: ProcessInfo,
}

/// Identity of a process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProcessInfo {
    /// Process identifier.
    pub id: String,
    /// Wallet that owns the process.
    pub owner: String,
    /// Tags the process was spawned with.
    pub tags: Vec<Tag>,
}

/// The verdict a guest returns from its entry point: a success flag plus the structured
/// response body.
///
/// This is the schema boundary: replies that do not decode into this shape (missing or
/// non-boolean `ok`, non-array message lists) are rejected as
/// [`InvokeError::Decode`](crate::InvokeError::Decode) before any field is interpreted.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HandlerOutcome {
    /// Whether the guest considers the call successful.
    pub ok: bool,
    /// The structured response body; defaults to empty when omitted.
    #[serde(default)]
    pub response: HandlerResponse,
}

/// Structured body of a guest reply. All payload fields are opaque to the harness; only
/// their shape is enforced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HandlerResponse {
    /// Guest-defined error payload, present on failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Guest-defined output value.
    pub output: Value,
    /// Outbound messages scheduled by the guest.
    pub messages: Vec<Value>,
    /// Process spawns requested by the guest.
    pub spawns: Vec<Value>,
    /// Assignments requested by the guest.
    pub assignments: Vec<Value>,
}

impl fmt::Display for HandlerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{error}"),
            None => f.write_str("handler signalled failure without an error payload"),
        }
    }
}

/// Everything one successful invocation yields: the post-call memory image, the guest's
/// response fields, and the gas consumed producing them.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultBundle {
    /// Fresh snapshot of the full linear memory, for chaining into the next invocation.
    #[serde(skip)]
    pub memory: MemorySnapshot,
    /// Guest-defined error payload, if the guest attached one to a successful reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Guest-defined output value.
    pub output: Value,
    /// Outbound messages scheduled by the guest.
    pub messages: Vec<Value>,
    /// Process spawns requested by the guest.
    pub spawns: Vec<Value>,
    /// Assignments requested by the guest.
    pub assignments: Vec<Value>,
    /// Gas consumed by this invocation.
    pub gas_used: u64,
}

impl ResultBundle {
    pub(crate) fn new(memory: MemorySnapshot, response: HandlerResponse, gas_used: u64) -> Self {
        Self {
            memory,
            error: response.error,
            output: response.output,
            messages: response.messages,
            spawns: response.spawns,
            assignments: response.assignments,
            gas_used,
        }
    }
}
