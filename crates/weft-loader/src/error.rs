//! Error types raised by the harness.

use crate::{drive::DriveError, HandlerResponse};

/// Failures while building a [`Loader`](crate::Loader) or one of its sandbox instances.
///
/// All of these are fatal for the construction attempt; the harness never retries.
#[derive(Debug, thiserror::Error)]
pub enum InstantiationError {
    /// The execution engine rejected its configuration.
    #[error("engine setup failed: {0}")]
    Engine(wasmtime::Error),
    /// The guest binary (or text source) does not compile.
    #[error("malformed guest module: {0}")]
    InvalidBinary(wasmtime::Error),
    /// The module could not be linked against the import surface, or its start section
    /// trapped. Importing a capability that is not enabled lands here.
    #[error("linkage failed: {0}")]
    Linkage(wasmtime::Error),
    /// The module does not export a required part of the ABI.
    #[error("guest does not export `{0}`")]
    MissingExport(&'static str),
    /// A required export exists but its signature does not match the configured format.
    #[error("export `{name}` has an unsupported signature for {format}")]
    BadSignature {
        /// Name of the offending export.
        name: &'static str,
        /// The format the instance was configured with.
        format: crate::ModuleFormat,
    },
    /// An extension was enabled without the configuration it needs.
    #[error("extension `{0}` enabled without configuration")]
    MissingExtensionConfig(&'static str),
    /// The virtual drive could not be constructed.
    #[error(transparent)]
    Drive(#[from] DriveError),
}

/// Failures while dispatching one message into a sandbox instance.
///
/// After any of these, the instance's memory must not be trusted for a snapshot-based
/// continuation: discard the instance or re-load a known-good prior snapshot.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The compute budget was exhausted mid-execution.
    #[error("out of gas")]
    OutOfGas,
    /// A prior memory image does not fit under the instance's heap ceiling.
    #[error("cannot grow sandbox memory to {requested} bytes (ceiling is {ceiling})")]
    HeapResize {
        /// Bytes the memory would have to hold.
        requested: usize,
        /// Configured ceiling in bytes.
        ceiling: usize,
    },
    /// The guest flagged the message as failed; carries its decoded response verbatim.
    #[error("handler fault: {0}")]
    Handler(Box<HandlerResponse>),
    /// The guest's reply was not a well-formed result payload.
    #[error("undecodable handler reply: {0}")]
    Decode(String),
    /// The sandbox trapped or violated the exchange ABI.
    #[error("sandbox fault: {0}")]
    Fault(wasmtime::Error),
}

impl From<serde_json::Error> for InvokeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
