//! Constants for the weft harness.
//!
//! It groups the constants per subsystem as sub-modules.

/// Constants for the gas meter.
pub mod gas {
    /// Compute budget applied when the caller configures none. Large enough that an
    /// unconfigured instance is effectively unmetered while still bounded.
    pub const DEFAULT_COMPUTE_LIMIT: u64 = 9_000_000_000_000_000;
}

/// Constants for linear-memory handling.
pub mod memory {
    /// Size of one WebAssembly linear-memory page in bytes.
    pub const PAGE_SIZE: usize = 64 * 1024;
    /// Heap ceiling for 32-bit modules: the full 4 GiB address space.
    pub const DEFAULT_CEILING_WASM32: usize = 4 * 1024 * 1024 * 1024;
    /// Heap ceiling for 64-bit modules.
    pub const DEFAULT_CEILING_WASM64: usize = 16 * 1024 * 1024 * 1024;
}

/// Names making up the sandbox ABI: host imports the guest may call and exports the
/// harness requires of the guest.
pub mod abi {
    /// Import module carrying the gas hook.
    pub const METERING_MODULE: &str = "metering";
    /// Gas hook: `usegas(amount: i64)`. Charged at the guest's accounting points.
    pub const USEGAS: &str = "usegas";

    /// Import module carrying the determinism capabilities.
    pub const ENV_MODULE: &str = "env";
    /// Random capability: `random_f64() -> f64`.
    pub const RANDOM_F64: &str = "random_f64";
    /// Clock capability: `clock_ms() -> i64`.
    pub const CLOCK_MS: &str = "clock_ms";

    /// Import module carrying the virtual drive, present only when the extension is enabled.
    pub const DRIVE_MODULE: &str = "drive";
    /// Drive open: `open(path_ptr, path_len) -> fd`, `0` when denied.
    pub const DRIVE_OPEN: &str = "open";
    /// Drive read: `read(fd, dst_ptr, len) -> n`, `-1` on fetch failure.
    pub const DRIVE_READ: &str = "read";
    /// Drive close: `close(fd) -> 0`.
    pub const DRIVE_CLOSE: &str = "close";

    /// Required export: the guest's linear memory.
    pub const EXPORT_MEMORY: &str = "memory";
    /// Required export: guest allocator used to deliver encoded payloads.
    pub const EXPORT_ALLOC: &str = "alloc";
    /// Required export: the message entry point.
    pub const EXPORT_HANDLE: &str = "handle";

    /// Width of the length prefix on every exchanged payload frame.
    pub const FRAME_HEADER: usize = 4;
}

/// Constants for the virtual drive overlay.
pub mod drive {
    /// Path namespace under which content identifiers are exposed to the guest.
    pub const PATH_PREFIX: &str = "/data/";
    /// Content gateway consulted when the caller configures no endpoint.
    pub const DEFAULT_ENDPOINT: &str = "https://gateway.weft.dev";
}
