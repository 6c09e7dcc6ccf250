//! Harness configuration for weftx

use clap::Parser;
use weft_loader::{
    constants::{drive::DEFAULT_ENDPOINT, gas::DEFAULT_COMPUTE_LIMIT},
    drive::{DriveConfig, StoreMode},
    LoaderConfig, ModuleFormat, ProcessInfo,
};

/// Sandbox configuration arguments (compute budget, heap ceiling, module format)
#[derive(Parser, Debug, Clone)]
pub struct HarnessArgs {
    /// Compute budget per invocation, in gas units
    #[arg(long = "compute-limit", default_value_t = DEFAULT_COMPUTE_LIMIT)]
    pub compute_limit: u64,

    /// Heap ceiling in bytes. Defaults to the full address space of the module format.
    #[arg(long = "memory-limit")]
    pub memory_limit: Option<usize>,

    /// Module format, possible values: `wasm32`, `wasm64`
    #[arg(long = "format", default_value = "wasm32")]
    pub format: ModuleFormat,

    /// Carry gas spend across invocations instead of refilling each call
    #[arg(long = "accumulate-gas")]
    pub accumulate_gas: bool,
}

impl HarnessArgs {
    /// Creates the [`LoaderConfig`] described by these arguments.
    pub fn to_config(&self, drive: Option<DriveConfig>) -> LoaderConfig {
        let mut config = LoaderConfig::default()
            .with_compute_limit(self.compute_limit)
            .with_format(self.format)
            .with_accumulate_gas(self.accumulate_gas);

        if let Some(limit) = self.memory_limit {
            config = config.with_memory_limit(limit);
        }
        if let Some(drive) = drive {
            config = config.with_drive(drive);
        }

        config
    }
}

/// Virtual drive arguments (gateway endpoint, admission list, process identity)
#[derive(Parser, Debug, Clone)]
pub struct DriveArgs {
    /// Enable the virtual drive extension
    #[arg(long = "drive")]
    pub drive: bool,

    /// Gateway endpoint content is fetched from
    #[arg(long = "drive.endpoint", env = "WEFT_GATEWAY", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Store routing mode, possible values: `test`, `production`
    #[arg(long = "drive.mode", default_value = "production")]
    pub mode: StoreMode,

    /// Content identifier the guest may open.
    /// Can be specified multiple times for different identifiers.
    #[arg(long = "admit", value_name = "ID")]
    pub admit: Vec<String>,

    // Process identity exposed to the guest
    /// Block height reported to the guest
    #[arg(long = "block-height", default_value_t = 0)]
    pub block_height: u64,

    /// Scheduler address reported to the guest
    #[arg(long = "scheduler")]
    pub scheduler: Option<String>,

    /// Process identifier reported to the guest
    #[arg(long = "process.id", default_value = "")]
    pub process_id: String,

    /// Process owner reported to the guest
    #[arg(long = "process.owner", default_value = "")]
    pub process_owner: String,
}

impl DriveArgs {
    /// Creates the [`DriveConfig`] described by these arguments, or `None` when the
    /// drive extension is not enabled.
    pub fn to_config(&self) -> Option<DriveConfig> {
        self.drive.then(|| DriveConfig {
            endpoint: self.endpoint.clone(),
            mode: self.mode,
            admission: self.admit.iter().map(String::as_str).collect(),
            block_height: self.block_height,
            scheduler: self.scheduler.clone(),
            process: ProcessInfo {
                id: self.process_id.clone(),
                owner: self.process_owner.clone(),
                tags: Vec::new(),
            },
        })
    }
}
