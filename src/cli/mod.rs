//! Command-line interface
//!
//! The training entry point consumed by upload plumbing: a single
//! dataset-path invocation that writes the artifact set to a fixed output
//! directory and signals success or failure through the process exit status
//! plus a diagnostic log.

pub mod logging;

use crate::bundle::io::{load_bundle, save_bundle};
use crate::data::load::read_csv;
use crate::schema::SchemaDetector;
use crate::train::{TrainConfig, Trainer};
use clap::{Parser, Subcommand};
use logging::{say, LogLevel};
use std::path::Path;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "predecir", about = "Churn prediction pipeline", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print per-column schema detail
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Train on a dataset and write the artifact set
    Train {
        /// Path to the dataset (CSV)
        data: PathBuf,

        /// Output directory for the artifact set
        #[arg(long, default_value = "models")]
        out: PathBuf,

        /// Optional YAML training-config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the metadata of a saved artifact set
    Inspect {
        /// Artifact-set directory
        dir: PathBuf,
    },
}

/// Dispatch a parsed command
pub fn run_command(cli: Cli) -> crate::Result<()> {
    let level = LogLevel::from_flags(cli.quiet, cli.verbose);
    match cli.command {
        Command::Train { data, out, config } => train(&data, &out, config.as_deref(), level),
        Command::Inspect { dir } => inspect(&dir),
    }
}

fn train(
    data: &Path,
    out: &Path,
    config: Option<&Path>,
    level: LogLevel,
) -> crate::Result<()> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&text)
                .map_err(|e| crate::Error::Config(format!("invalid training config: {e}")))?
        }
        None => TrainConfig::default(),
    };

    let dataset = read_csv(data)?;
    say(
        level,
        LogLevel::Normal,
        &format!(
            "loaded {} rows, {} columns from {}",
            dataset.n_rows(),
            dataset.n_cols(),
            data.display()
        ),
    );

    let schema = SchemaDetector::new().detect(&dataset)?;
    say(
        level,
        LogLevel::Normal,
        &format!(
            "target '{}' | id '{}' | {} categorical + {} numerical features",
            schema.target_col,
            schema.id_col,
            schema.categorical_cols.len(),
            schema.numerical_cols.len()
        ),
    );
    for col in &schema.categorical_cols {
        let vocab = schema
            .categorical_vocabularies
            .get(col)
            .map_or(0, Vec::len);
        say(
            level,
            LogLevel::Verbose,
            &format!("  categorical '{col}' ({vocab} values)"),
        );
    }
    for col in &schema.numerical_cols {
        say(level, LogLevel::Verbose, &format!("  numerical '{col}'"));
    }

    let bundle = Trainer::new(config).fit(&dataset, &schema)?;
    let m = &bundle.metadata;
    say(
        level,
        LogLevel::Normal,
        &format!(
            "ROC-AUC {:.4} | accuracy {:.4} | precision {:.4} | recall {:.4}",
            m.roc_auc, m.accuracy, m.precision, m.recall
        ),
    );

    save_bundle(&bundle, out)?;
    say(
        level,
        LogLevel::Normal,
        &format!("artifact set written to {}", out.display()),
    );
    Ok(())
}

fn inspect(dir: &Path) -> crate::Result<()> {
    let bundle = load_bundle(dir)?;
    let m = &bundle.metadata;
    println!("model:         {}", m.model_name);
    println!("trained:       {}", m.training_date);
    println!("rows:          {} ({} positive)", m.n_rows, m.n_positive);
    println!("target:        {}", m.target_col);
    println!("id column:     {}", m.customer_id_col);
    println!("features:      {}", m.feature_cols.len());
    println!(
        "metrics:       auc={:.4} acc={:.4} prec={:.4} rec={:.4}",
        m.roc_auc, m.accuracy, m.precision, m.recall
    );
    println!("top features:");
    for fi in m.feature_importance.iter().take(10) {
        println!("  {:<24} {:.6}", fi.feature, fi.importance);
    }
    Ok(())
}
