//! `recorder-cli`: load a config file, subscribe to its configured topic
//! patterns, and record matching messages to a file until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use tracing::{error, info};

use pubsub_recorder::node::UdpNode;
use pubsub_recorder::{Config, DiscoveryClient, FileLog, Log, Recorder, UdpDiscovery};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "recorder-cli", about = "Record pub/sub topics to a durable log")]
struct Cli {
    /// Path to a TOML config file (see `Config` for the expected shape).
    #[arg(short, long, default_value = "recorder.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start recording; runs until interrupted with Ctrl-C.
    Record {
        /// Output file name, written inside the config's `log_dir`.
        #[arg(short, long, default_value = "session.log")]
        out: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command {
        Command::Record { out } => run_record(config, out),
    }
}

fn run_record(config: Config, out: String) -> Result<()> {
    let node = Arc::new(UdpNode::new(config.partition.clone()));
    let discovery: Arc<dyn DiscoveryClient> =
        Arc::new(UdpDiscovery::new(Uuid::new_v4().to_string(), config.discovery_port));
    let log_factory = Arc::new(|| Box::new(FileLog::new()) as Box<dyn Log>);
    let recorder = Recorder::with_collaborators(discovery, node, log_factory);

    let out_path = PathBuf::from(&config.log_dir).join(&out);
    recorder.start(&out_path).with_context(|| format!("opening {}", out_path.display()))?;
    info!(path = %out_path.display(), "recording started");

    for pattern in &config.patterns {
        let regex = Regex::new(pattern).with_context(|| format!("invalid pattern {pattern:?}"))?;
        let subscribed = recorder.add_pattern(regex)?;
        info!(pattern, subscribed, "registered topic pattern");
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to wait for ctrl-c");
        }
    });

    recorder.stop();
    info!("recording stopped, exiting");
    Ok(())
}
