//! Construction-time configuration for sandbox instances.

use std::{str::FromStr, sync::Arc};

use wasmtime::{Val, ValType};

use crate::{
    constants::{gas::DEFAULT_COMPUTE_LIMIT, memory},
    drive::DriveConfig,
    Clock, FixedRandom, FrozenClock, RandomSource,
};

bitflags::bitflags! {
    /// Optional capability modules linked into the sandbox import surface.
    ///
    /// A guest importing functions from a capability that is not enabled fails to link.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Extensions: u8 {
        /// Admission-gated remote content overlay, exposed as the `drive.*` imports.
        const DRIVE = 1 << 0;
    }
}

/// Pointer width and ABI flavor of the guest binary.
///
/// The format decides the type of every pointer-sized value crossing the sandbox
/// boundary: the `alloc`/`handle` signatures and the drive import signatures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
pub enum ModuleFormat {
    /// 32-bit linear memory, `i32` pointers.
    #[default]
    #[display("wasm32")]
    Wasm32,
    /// 64-bit linear memory (`memory64`), `i64` pointers.
    #[display("wasm64")]
    Wasm64,
}

impl ModuleFormat {
    /// Heap ceiling applied when the caller configures none.
    pub const fn default_memory_ceiling(self) -> usize {
        match self {
            Self::Wasm32 => memory::DEFAULT_CEILING_WASM32,
            Self::Wasm64 => memory::DEFAULT_CEILING_WASM64,
        }
    }

    /// The value type of pointer-sized ABI parameters.
    pub(crate) const fn ptr_ty(self) -> ValType {
        match self {
            Self::Wasm32 => ValType::I32,
            Self::Wasm64 => ValType::I64,
        }
    }

    /// Whether `ty` is this format's pointer type.
    pub(crate) fn matches_ptr(self, ty: &ValType) -> bool {
        matches!((self, ty), (Self::Wasm32, ValType::I32) | (Self::Wasm64, ValType::I64))
    }

    /// Wraps a host-side address into the guest's pointer representation.
    pub(crate) const fn ptr_val(self, ptr: u64) -> Val {
        match self {
            Self::Wasm32 => Val::I32(ptr as i32),
            Self::Wasm64 => Val::I64(ptr as i64),
        }
    }

    /// Unwraps a guest pointer value, if it has this format's width.
    pub(crate) fn val_to_ptr(self, val: &Val) -> Option<u64> {
        match (self, val) {
            (Self::Wasm32, Val::I32(v)) => Some(*v as u32 as u64),
            (Self::Wasm64, Val::I64(v)) => Some(*v as u64),
            _ => None,
        }
    }
}

impl FromStr for ModuleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wasm32" => Ok(Self::Wasm32),
            "wasm64" => Ok(Self::Wasm64),
            other => Err(format!("unknown module format `{other}`, expected wasm32 or wasm64")),
        }
    }
}

/// Construction-time options for a [`Loader`](crate::Loader) and the instances it spawns.
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Gas budget per invocation (or overall, with [`accumulate_gas`](Self::accumulate_gas)).
    pub compute_limit: u64,
    /// Upper bound for heap growth in bytes; defaults per format when `None`.
    pub memory_limit: Option<usize>,
    /// Expected binary flavor.
    pub format: ModuleFormat,
    /// Capability modules to link.
    pub extensions: Extensions,
    /// Keep the used-gas counter across invocations instead of refilling per message.
    pub accumulate_gas: bool,
    /// Random capability behind the guest's `random_f64` import.
    pub random: Arc<dyn RandomSource>,
    /// Clock capability behind the guest's `clock_ms` import.
    pub clock: Arc<dyn Clock>,
    /// Virtual drive configuration; required when [`Extensions::DRIVE`] is enabled.
    pub drive: Option<DriveConfig>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            compute_limit: DEFAULT_COMPUTE_LIMIT,
            memory_limit: None,
            format: ModuleFormat::default(),
            extensions: Extensions::empty(),
            accumulate_gas: false,
            random: Arc::new(FixedRandom::default()),
            clock: Arc::new(FrozenClock::default()),
            drive: None,
        }
    }
}

impl LoaderConfig {
    /// Sets the gas budget.
    pub fn with_compute_limit(mut self, limit: u64) -> Self {
        self.compute_limit = limit;
        self
    }

    /// Sets the heap ceiling in bytes.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Sets the binary flavor.
    pub fn with_format(mut self, format: ModuleFormat) -> Self {
        self.format = format;
        self
    }

    /// Keeps the used-gas counter across invocations.
    pub fn with_accumulate_gas(mut self, accumulate: bool) -> Self {
        self.accumulate_gas = accumulate;
        self
    }

    /// Enables the drive extension with the given configuration.
    pub fn with_drive(mut self, drive: DriveConfig) -> Self {
        self.extensions |= Extensions::DRIVE;
        self.drive = Some(drive);
        self
    }

    /// Replaces the random capability.
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Replaces the clock capability.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The heap ceiling in effect: the configured limit or the format default.
    pub fn memory_ceiling(&self) -> usize {
        self.memory_limit.unwrap_or_else(|| self.format.default_memory_ceiling())
    }
}
