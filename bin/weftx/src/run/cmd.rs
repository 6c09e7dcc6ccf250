use std::path::PathBuf;

use clap::Parser;
use weft_loader::{Environment, Loader, MemorySnapshot, Message};

use super::{load_json, Result};

/// Run a single message through a WASM module
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Path to the WASM module binary (positional argument)
    #[arg(value_name = "MODULE")]
    pub module: PathBuf,

    /// File containing the JSON message to dispatch. Defaults to an empty message.
    #[arg(long = "message")]
    pub message: Option<PathBuf>,

    /// File containing the JSON process environment
    #[arg(long = "env")]
    pub environment: Option<PathBuf>,

    /// File containing a heap snapshot to restore before the call
    #[arg(long = "memory-in")]
    pub memory_in: Option<PathBuf>,

    /// File the post-call heap snapshot is written to
    #[arg(long = "memory-out")]
    pub memory_out: Option<PathBuf>,

    // Shared argument groups
    /// Sandbox configuration
    #[command(flatten)]
    pub harness_args: super::HarnessArgs,

    /// Virtual drive configuration
    #[command(flatten)]
    pub drive_args: super::DriveArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: super::LogArgs,
}

impl Cmd {
    /// Execute the run command
    pub async fn run(&self) -> Result<()> {
        self.log_args.init();

        // Step 1: Load the module binary
        let binary = std::fs::read(&self.module)?;

        // Step 2: Load the message and environment
        let message: Message = load_json(self.message.as_deref())?;
        let environment: Environment = load_json(self.environment.as_deref())?;

        // Step 3: Load the prior heap snapshot, if any
        let prior = match &self.memory_in {
            Some(path) => Some(MemorySnapshot::from(std::fs::read(path)?)),
            None => None,
        };

        // Step 4: Instantiate the sandbox and dispatch the message
        let config = self.harness_args.to_config(self.drive_args.to_config());
        let loader = Loader::new(&binary, config)?;
        let mut instance = loader.instantiate().await?;
        let bundle = instance.invoke(prior.as_ref(), &message, &environment).await?;

        // Step 5: Persist the heap and print the outcome
        if let Some(path) = &self.memory_out {
            std::fs::write(path, bundle.memory.as_slice())?;
        }
        println!("{}", serde_json::to_string_pretty(&bundle)?);

        Ok(())
    }
}
