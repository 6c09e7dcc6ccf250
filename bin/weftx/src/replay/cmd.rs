use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use weft_loader::{Environment, Loader, Message};

use crate::run;

use super::{ReplayError, Result};

/// One recorded step: a message plus the environment it was delivered under.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Step {
    /// Message dispatched at this step
    pub message: Message,
    /// Environment for this step; carried forward from the previous step when omitted
    #[serde(default)]
    pub environment: Option<Environment>,
}

/// Replay a recorded message sequence against a WASM module
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Path to the WASM module binary (positional argument)
    #[arg(value_name = "MODULE")]
    pub module: PathBuf,

    /// File containing the JSON array of recorded steps
    #[arg(long = "sequence")]
    pub sequence: PathBuf,

    /// File the final heap snapshot is written to
    #[arg(long = "memory-out")]
    pub memory_out: Option<PathBuf>,

    // Shared argument groups
    /// Sandbox configuration
    #[command(flatten)]
    pub harness_args: run::HarnessArgs,

    /// Virtual drive configuration
    #[command(flatten)]
    pub drive_args: run::DriveArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: run::LogArgs,
}

impl Cmd {
    /// Execute the replay command
    pub async fn run(&self) -> Result<()> {
        self.log_args.init();

        // Step 1: Load the module binary and the recorded sequence
        let binary = std::fs::read(&self.module)?;
        let steps: Vec<Step> = serde_json::from_slice(&std::fs::read(&self.sequence)?)?;
        if steps.is_empty() {
            return Err(ReplayError::InvalidInput("sequence contains no steps".to_owned()));
        }

        // Step 2: Instantiate the sandbox once for the whole sequence
        let config = self.harness_args.to_config(self.drive_args.to_config());
        let loader = Loader::new(&binary, config)?;
        let mut instance = loader.instantiate().await?;

        // Step 3: Drive each step, threading the heap from one into the next
        let mut environment = Environment::default();
        let mut memory = None;
        let mut outputs = Vec::with_capacity(steps.len());
        for (step, record) in steps.into_iter().enumerate() {
            if let Some(env) = record.environment {
                environment = env;
            }
            let bundle = instance.invoke(memory.as_ref(), &record.message, &environment).await?;
            tracing::info!(step, gas_used = bundle.gas_used, "step complete");
            memory = Some(bundle.memory.clone());
            outputs.push(bundle);
        }

        // Step 4: Persist the final heap and print the outcomes
        if let (Some(path), Some(memory)) = (&self.memory_out, &memory) {
            std::fs::write(path, memory.as_slice())?;
        }
        println!("{}", serde_json::to_string_pretty(&outputs)?);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_recorded_sequence() {
        let raw = r#"[
            {
                "Message": { "Id": "m1", "Target": "p1" },
                "Environment": { "Process": { "Id": "p1", "Owner": "o1" } }
            },
            { "Message": { "Id": "m2", "Target": "p1" } }
        ]"#;

        let steps: Vec<Step> = serde_json::from_str(raw).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].message.id, "m1");
        assert!(steps[0].environment.is_some());
        assert!(steps[1].environment.is_none());
    }
}
