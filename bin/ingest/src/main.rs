//! The `ingest` binary.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod cli;
pub mod commands;
pub mod flags;

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    cadence_cli::backtrace::enable();

    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version are printed to stdout and are not failures.
            let code = if err.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            let _ = err.print();
            return code;
        }
    };

    if let Err(err) = cli.run() {
        eprintln!("Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
