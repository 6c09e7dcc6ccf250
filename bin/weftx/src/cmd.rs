use clap::Parser;

/// Main command enumeration for the weftx CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version = "0.1")]
pub enum MainCmd {
    /// Execute one message against a guest module
    Run(crate::run::Cmd),
    /// Replay a recorded message sequence against a guest module
    Replay(crate::replay::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Weftx error (used by the run and replay commands)
    #[error("{0}")]
    Weftx(#[from] crate::common::WeftxError),
}

impl MainCmd {
    /// Execute the main command
    pub async fn run(&self) -> Result<(), Error> {
        match self {
            Self::Run(cmd) => {
                cmd.run().await?;
                Ok(())
            }
            Self::Replay(cmd) => {
                cmd.run().await?;
                Ok(())
            }
        }
    }
}
