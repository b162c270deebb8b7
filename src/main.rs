//! predecir CLI
//!
//! Training and inspection entry points for the churn pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Train on an uploaded dataset, writing the artifact set
//! predecir train data.csv --out models
//!
//! # Train with hyperparameter overrides from a config file
//! predecir train data.csv --config train.yaml
//!
//! # Show the metadata of a saved artifact set
//! predecir inspect models
//! ```

use clap::Parser;
use predecir::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
