//! Fraud Risk Engine - Main Entry Point
//!
//! `train` fits the ensemble from CSV datasets and saves the model bundle;
//! `score` loads a bundle and scores a transaction record from a JSON file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fraud_risk_engine::{
    config::AppConfig, engine::ScoringEngine, train, types::transaction::TransactionRecord,
    ModelBundle,
};

#[derive(Parser)]
#[command(name = "fraud-risk-engine", version, about = "Ensemble fraud scoring over transaction features")]
struct Cli {
    /// Path to a TOML config file (defaults are used when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the ensemble and save the model bundle
    Train {
        /// Transaction CSV (overrides the configured path)
        #[arg(long)]
        transactions: Option<PathBuf>,
        /// Identity CSV joined on TransactionID (overrides the configured path)
        #[arg(long)]
        identity: Option<PathBuf>,
        /// Where to write the bundle (overrides the configured path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score a transaction record from a JSON file
    Score {
        /// Model bundle to load (overrides the configured path)
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// JSON file holding one transaction record
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("fraud_risk_engine={}", config.logging.level).parse()?),
        )
        .init();

    match cli.command {
        Command::Train {
            transactions,
            identity,
            output,
        } => {
            if let Some(path) = transactions {
                config.data.transactions_path = path;
            }
            if let Some(path) = identity {
                config.data.identity_path = Some(path);
            }
            if let Some(path) = output {
                config.bundle.path = path;
            }

            info!("Starting training run");
            let (bundle, report) = train::run_training(&config)?;
            bundle.save(&config.bundle.path)?;
            info!(
                training_rows = report.training_rows,
                validation_rows = report.validation_rows,
                features = report.feature_count,
                auc = format!("{:.4}", report.metrics.auc),
                f1 = format!("{:.4}", report.metrics.f1),
                bundle = %config.bundle.path.display(),
                "Training complete"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Score { bundle, input } => {
            let bundle_path = bundle.unwrap_or_else(|| config.bundle.path.clone());
            let bundle = Arc::new(ModelBundle::load(&bundle_path)?);
            info!(
                bundle = %bundle_path.display(),
                features = bundle.feature_columns().len(),
                "Model bundle loaded"
            );

            let payload = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let record: TransactionRecord = serde_json::from_str(&payload)
                .with_context(|| format!("failed to parse {}", input.display()))?;

            let engine = ScoringEngine::new(bundle, config.ensemble.clone());
            let result = engine.score(&record)?;
            info!(
                is_fraud = result.is_fraud,
                confidence = format!("{:.4}", result.confidence),
                risk_level = ?result.risk_level(&config.risk_levels),
                "Transaction scored"
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
