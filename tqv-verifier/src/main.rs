//! Transcode quality verifier (tqv-verifier) - Main entry point
//!
//! Runs the verification node: polls the ledger for assigned tasks, verifies
//! them one at a time and delivers proofs to the ledger and the committee.
//! One-shot subcommands cover single-task verification, committee status
//! queries and supplemental verifier requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use tqv_common::config::{
    locate_config_file, load_toml_config, resolve_root_folder, write_toml_config, APP_DIR_NAME,
};
use tqv_verifier::committee::{
    CommitteeBroadcaster, LedgerMembership, MembershipSource, StaticMembership,
};
use tqv_verifier::config::{VerifierConfig, CONFIG_FILE_NAME, ROOT_FOLDER_ENV};
use tqv_verifier::credentials::Credentials;
use tqv_verifier::ledger::{Ledger, LedgerTaskSource, RestLedgerClient};
use tqv_verifier::services::{FfmpegTool, GatewayContentStore, Policies};
use tqv_verifier::{PipelineSettings, TaskDispatcher, VerificationPipeline};

/// Command-line arguments for tqv-verifier
#[derive(Parser, Debug)]
#[command(name = "tqv-verifier")]
#[command(about = "Transcode quality verification node")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "TQV_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for credentials, cache and task workspaces
    /// (falls back to TQV_ROOT_FOLDER, then the config file)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Network name selecting the credential file
    #[arg(short, long, env = "TQV_NETWORK")]
    network: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the ledger and verify assigned tasks until stopped (default)
    Run,

    /// Verify a single task by id and exit
    Verify {
        #[arg(long)]
        task_id: String,
    },

    /// Query the committee for a task's status
    Status {
        #[arg(long)]
        task_id: String,
    },

    /// Ask the ledger to assign a supplemental verifier to a task
    RequestSupplemental {
        #[arg(long)]
        task_id: String,
    },

    /// Write a default config file
    InitConfig {
        /// Destination (defaults to the user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Everything a running node is wired from
struct Node {
    ledger: Arc<dyn Ledger>,
    pipeline: Arc<VerificationPipeline>,
    verifier_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref(), CONFIG_FILE_NAME);
    let mut config: VerifierConfig =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(network) = &args.network {
        config.verifier.network = network.clone();
    }

    tqv_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    info!(
        "Starting tqv-verifier v{} (network: {})",
        env!("CARGO_PKG_VERSION"),
        config.verifier.network
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    match args.command.unwrap_or(Command::Run) {
        Command::InitConfig { path, force } => init_config(path, force),
        Command::Status { task_id } => {
            let ledger = build_ledger(&config)?;
            let broadcaster = build_broadcaster(&config, ledger)?;
            match broadcaster.query_status(&task_id).await {
                Some(status) => {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                    Ok(())
                }
                None => bail!("No committee member returned a status for task {}", task_id),
            }
        }
        Command::RequestSupplemental { task_id } => {
            let ledger = build_ledger(&config)?;
            ledger
                .request_supplemental_verifier(&task_id)
                .await
                .with_context(|| format!("Supplemental request for task {} failed", task_id))?;
            println!("Supplemental verifier requested for task {}", task_id);
            Ok(())
        }
        Command::Verify { task_id } => {
            let root_folder = resolve_root(&args.root_folder, &config);
            let node = build_node(&config, &root_folder)?;
            let task = node
                .ledger
                .task(&task_id)
                .await
                .context("Failed to read task from ledger")?
                .with_context(|| format!("Task {} not found on ledger", task_id))?;

            let outcome = node
                .pipeline
                .verify(&task)
                .await
                .with_context(|| format!("Verification of task {} failed", task_id))?;

            println!("{}", serde_json::to_string_pretty(&outcome.proof)?);
            info!(
                "Committee: {}/{} members acknowledged (accepted: {})",
                outcome.broadcast.success_count,
                outcome.broadcast.total,
                outcome.broadcast.accepted()
            );
            Ok(())
        }
        Command::Run => {
            let root_folder = resolve_root(&args.root_folder, &config);
            let node = build_node(&config, &root_folder)?;
            let source = Arc::new(LedgerTaskSource::new(
                Arc::clone(&node.ledger),
                node.verifier_id.clone(),
            ));
            let dispatcher = TaskDispatcher::new(source, node.pipeline);

            info!(
                "Verifier {} polling every {}s",
                node.verifier_id, config.verifier.poll_interval_secs
            );
            dispatcher
                .run(config.verifier.poll_interval(), shutdown_signal())
                .await;

            info!("Shutdown complete");
            Ok(())
        }
    }
}

fn resolve_root(cli: &Option<PathBuf>, config: &VerifierConfig) -> PathBuf {
    resolve_root_folder(cli.as_deref(), ROOT_FOLDER_ENV, config.root_folder.as_deref())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => dirs::config_dir()
            .context("No user config directory on this platform; pass --path")?
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    };

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    write_toml_config(&VerifierConfig::default(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn build_ledger(config: &VerifierConfig) -> Result<Arc<dyn Ledger>> {
    let client = RestLedgerClient::new(
        config.ledger.gateway_url.clone(),
        Duration::from_secs(config.ledger.timeout_secs),
        config.ledger.retry,
    )
    .context("Failed to create ledger client")?;
    Ok(Arc::new(client))
}

fn build_broadcaster(
    config: &VerifierConfig,
    ledger: Arc<dyn Ledger>,
) -> Result<Arc<CommitteeBroadcaster>> {
    let members = config.committee.members.clone();
    if members.is_empty() {
        tracing::warn!("No committee members configured; proofs will not be broadcast");
    }

    let membership: Arc<dyn MembershipSource> = if config.committee.use_ledger_leader {
        Arc::new(LedgerMembership::new(ledger, members))
    } else {
        Arc::new(StaticMembership::new(members))
    };

    let broadcaster =
        CommitteeBroadcaster::new(membership, config.committee.broadcast_settings())
            .context("Failed to create committee broadcaster")?;
    Ok(Arc::new(broadcaster))
}

fn build_node(config: &VerifierConfig, root_folder: &Path) -> Result<Node> {
    let credentials = Credentials::load(root_folder, &config.verifier.network)
        .context("Failed to load verifier credentials")?;

    let tool = Arc::new(
        FfmpegTool::new(&config.media.ffmpeg_path, &config.media.ffprobe_path)
            .context("Media tool unavailable")?,
    );

    let content_store = Arc::new(
        GatewayContentStore::new(
            config.content_store.gateway_url.clone(),
            root_folder.join("cache"),
            Duration::from_secs(config.content_store.timeout_secs),
            config.content_store.retry,
        )
        .context("Failed to create content store client")?,
    );

    let ledger = build_ledger(config)?;
    let broadcaster = build_broadcaster(config, Arc::clone(&ledger))?;

    let policies = Policies::constant(
        config.scoring.audio_score,
        config.scoring.sync_score,
        credentials.signature.clone(),
    );

    let pipeline = Arc::new(VerificationPipeline::new(
        tool,
        content_store,
        Arc::clone(&ledger),
        broadcaster,
        policies,
        PipelineSettings {
            verifier_id: credentials.verifier_id.clone(),
            work_root: root_folder.join("work"),
            score_offset: config.scoring.score_offset,
        },
    ));

    Ok(Node {
        ledger,
        pipeline,
        verifier_id: credentials.verifier_id,
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
