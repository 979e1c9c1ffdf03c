//! `commitment-indexer` command line.
//!
//! Loads the configured store, initializes the trees and runs one command,
//! printing the result as JSON on stdout. Logs go to stderr.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commitment_indexer::{
    AddCommitmentResponse, CommitmentIndexer, IndexerConfig, OperationKind, ProofResponse,
    PublishOutcome, RootPublisher, RootResponse, SyncStatusReporter,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "commitment-indexer")]
#[command(about = "Poseidon commitment trees and inclusion proofs", long_about = None)]
struct Args {
    /// TOML config file; defaults apply when omitted
    #[arg(long, short, env = "COMMITMENT_INDEXER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a commitment (hex, 0x-hex or decimal)
    Add {
        /// deposit, transfer or withdrawal
        kind: OperationKind,
        /// Commitment value
        commitment: String,
    },
    /// Inclusion proof for a commitment
    Proof {
        /// deposit, transfer or withdrawal
        kind: OperationKind,
        /// Commitment value
        commitment: String,
    },
    /// Current root of a kind's tree
    Root {
        /// deposit, transfer or withdrawal
        kind: OperationKind,
    },
    /// Indexer and publication status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => IndexerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IndexerConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log.filter))
                .context("invalid log filter")?,
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(?config, "loaded config");

    let store = config.open_store().context("opening tree store")?;
    let indexer = Arc::new(CommitmentIndexer::new(store, config.indexer_options()));
    indexer
        .initialize()
        .await
        .context("initializing indexer")?;

    // no signer is wired into the CLI, so publishing stays disabled
    let publisher =
        Arc::new(RootPublisher::disabled().with_retention(config.publish.status_retention));

    match args.command {
        Command::Add { kind, commitment } => {
            let outcome = indexer.add_commitment(kind, &commitment)?;
            if publisher.publish_root(&outcome.root).await? == PublishOutcome::Disabled {
                debug!("root publication disabled");
            }
            print_json(&AddCommitmentResponse::from(&outcome))?;
        }
        Command::Proof { kind, commitment } => {
            let proof = indexer.get_proof(kind, &commitment)?;
            print_json(&ProofResponse::from(&proof))?;
        }
        Command::Root { kind } => {
            let root = indexer.get_root(kind)?;
            print_json(&RootResponse {
                kind,
                root_hex: root.to_hex(),
                leaf_count: indexer.leaf_count(kind),
            })?;
        }
        Command::Status => {
            let reporter = SyncStatusReporter::new(indexer, publisher);
            print_json(&reporter.snapshot())?;
        }
    }

    info!("done");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{json}");
    Ok(())
}
