//! `multicast-proxy` — layer-2 mDNS/SSDP multicast reflector across
//! trunked VLANs. CLI wiring grounded on the merged idiom of the
//! teacher's `capture/src/main.rs` and `aggregator/src/main.rs`.

mod commands;
mod logging;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::info;

use multicast_proxy_core::config::{Config, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "multicast-proxy")]
#[command(author = "SecuAAS")]
#[command(version)]
#[command(about = "Layer-2 mDNS/SSDP multicast reflector across trunked VLANs", long_about = None)]
struct Cli {
    /// Path to configuration file; overrides the standard search path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run with verbose (debug) logging regardless of config.
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reflector engine using the loaded config.
    Serve,
    /// SSDP-only utilities that do not require a reflector config.
    Ssdp {
        #[command(subcommand)]
        command: SsdpCommand,
    },
    /// Enumerate network interfaces.
    Interfaces {
        #[command(subcommand)]
        command: InterfacesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SsdpCommand {
    /// Join the SSDP multicast group and log M-SEARCH traffic.
    Listen {
        #[arg(short = 'i', long = "interface")]
        interfaces: Vec<String>,
    },
    /// Active-probe proxy: client-side listener, server-side M-SEARCH relay.
    Proxy {
        #[arg(short = 'c', long = "client-interface", required = true)]
        client_interfaces: Vec<String>,
        #[arg(short = 's', long = "server-interface", required = true)]
        server_interfaces: Vec<String>,
    },
    /// One-shot M-SEARCH for the given search target.
    Discover {
        search_target: String,
    },
}

#[derive(Subcommand, Debug)]
enum InterfacesCommand {
    /// Print all interfaces visible to the OS.
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only `serve` touches `Config` — matching the original's
    // `cmd/serve.go`, the sole place that loads config; `interfaces
    // list`, `ssdp discover`, `ssdp listen` and `ssdp proxy` never call
    // `viper`/`Config` there either, so they must work standalone even
    // with no config file present.
    if !matches!(cli.command, Command::Serve) {
        logging::setup_logging(&LoggingConfig::default(), cli.debug);
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, _) = broadcast::channel(1);
    install_signal_handler(Arc::clone(&running), shutdown_tx.clone())?;

    match cli.command {
        Command::Serve => {
            let cfg = load_config(&cli)?;
            logging::setup_logging(&cfg.logging, cli.debug);
            commands::serve::serve(&cfg, running)?
        }
        Command::Interfaces { command: InterfacesCommand::List } => commands::interfaces::list(),
        Command::Ssdp { command } => runtime.block_on(run_ssdp_command(command, shutdown_tx.subscribe()))?,
    }

    Ok(())
}

async fn run_ssdp_command(command: SsdpCommand, shutdown: broadcast::Receiver<()>) -> Result<()> {
    match command {
        SsdpCommand::Listen { interfaces } => commands::ssdp_listen::listen(&interfaces, shutdown).await,
        SsdpCommand::Proxy { client_interfaces, server_interfaces } => {
            commands::ssdp_proxy::proxy(&client_interfaces, &server_interfaces, shutdown).await
        }
        SsdpCommand::Discover { search_target } => commands::ssdp_discover::discover(&search_target),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::discover().context("failed to discover a configuration file"),
    }
}

fn install_signal_handler(running: Arc<AtomicBool>, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running.store(false, Ordering::Relaxed);
        let _ = shutdown_tx.send(());
    })
    .context("failed to install Ctrl-C handler")
}
