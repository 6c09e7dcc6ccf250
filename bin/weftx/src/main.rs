//! `weftx` CLI tool for running sandboxed weft processes
//!
//! This tool provides a command-line interface for executing messages against sandboxed
//! WASM modules and replaying recorded message sequences deterministically.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use clap::Parser;

mod cmd;
pub use cmd::*;

/// Shared argument groups, errors and helpers
pub mod common;
/// Replay module for driving recorded message sequences
pub mod replay;
/// Run module for executing a single message
pub mod run;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    set_thread_panic_hook();
    MainCmd::parse().run().await.inspect_err(|e| println!("{e:?}"))
}

/// Sets thread panic hook, useful for having tests that panic.
fn set_thread_panic_hook() {
    use std::{
        backtrace::Backtrace,
        panic::{set_hook, take_hook},
        process::exit,
    };
    let orig_hook = take_hook();
    set_hook(Box::new(move |panic_info| {
        println!("Custom backtrace: {}", Backtrace::capture());
        orig_hook(panic_info);
        exit(1);
    }));
}
