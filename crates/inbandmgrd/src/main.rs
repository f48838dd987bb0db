//! In-band management daemon entry point.
//!
//! Loads the configuration, activates the in-band manager against a static
//! topology and a logging flow programmer, optionally replays a packet
//! capture, and withdraws its rules once the capture is done or on
//! SIGINT/SIGTERM.

use anyhow::Context;
use clap::Parser;
use sonic_inbandmgrd::config::DEFAULT_CONFIG_PATH;
use sonic_inbandmgrd::{
    InbandConfig, InbandMgr, LoggingFlowProgrammer, PacketDispatcher, StaticTopology,
    init_logging, replay,
};
use sonic_types::SwitchId;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

/// SONiC in-band management bootstrap daemon
#[derive(Parser, Debug)]
#[command(name = "inbandmgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Bootstrap switch identifier (overrides the config file)
    #[arg(short = 'b', long)]
    bootstrap_switch: Option<SwitchId>,

    /// Controller TCP port (overrides the config file)
    #[arg(long)]
    control_port: Option<u16>,

    /// JSON-lines packet capture to replay after activation
    #[arg(short = 'p', long)]
    packets: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "inbandmgrd: exiting with error");
            eprintln!("inbandmgrd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = InbandConfig::load_or_default(&args.config)?;
    if let Some(switch) = args.bootstrap_switch {
        config.bootstrap.bootstrap_switch_id = Some(switch);
    }
    if let Some(port) = args.control_port {
        config.bootstrap.control_port = port;
    }
    config.validate()?;

    init_logging(&config.log, args.log_level.as_deref())?;
    info!(config = %args.config.display(), "inbandmgrd: Starting");

    let topology = Arc::new(StaticTopology::new(
        config.topology.links.clone(),
        config.topology.bidirectional,
    ));
    let programmer = Arc::new(LoggingFlowProgrammer::new());
    let dispatcher = Arc::new(PacketDispatcher::new());

    let mgr = InbandMgr::new(config, topology, programmer.clone(), dispatcher.clone())?;
    mgr.activate()?;

    match &args.packets {
        Some(path) => {
            tokio::select! {
                result = replay_capture(path, &dispatcher) => result?,
                _ = shutdown_signal() => {}
            }
        }
        None => {
            info!(
                bootstrap = %mgr.bootstrap_state().phase(),
                "inbandmgrd: Waiting for shutdown signal"
            );
            shutdown_signal().await;
        }
    }

    info!(
        bootstrap = %mgr.bootstrap_state().phase(),
        installed = programmer.installed().len(),
        "inbandmgrd: Deactivating"
    );
    let removed = mgr.deactivate().await?;
    info!(removed, "inbandmgrd: Shut down");
    Ok(())
}

async fn replay_capture(path: &Path, dispatcher: &PacketDispatcher) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening capture {}", path.display()))?;
    let summary = replay(BufReader::new(file), dispatcher).await?;
    info!(
        dispatched = summary.dispatched,
        malformed = summary.malformed,
        "inbandmgrd: Capture replayed"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("inbandmgrd: Received SIGINT"),
        _ = terminate => info!("inbandmgrd: Received SIGTERM"),
    }
}
