//! Batch entry point for printer-monitor, meant to be run from cron.
//!
//! ```bash
//! # Poll every printer (what the generated cron entry runs)
//! printer-monitor --config /etc/printer-monitor/monitord.toml refresh
//!
//! # Poll one printer
//! printer-monitor refresh --name "IT Copier" --ip 10.0.0.5
//!
//! # Feed a demo printer with synthetic levels
//! printer-monitor simulate --name "Demo Laser" --ip 192.168.1.50 --modules 4
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use printer_monitord::config::Config;
use printer_monitord::refresh::Poller;
use printer_monitord::schedule::cron_entry;
use printer_monitord::simulate::{simulate, SimulateRequest};
use printer_monitord::snmp::session::UdpSnmpClient;
use printer_monitord::store::db::PrinterDb;
use printer_monitord::store_manager::StoreHandle;

const DEFAULT_CONFIG: &str = "/etc/printer-monitor/monitord.toml";

#[derive(Parser)]
#[command(name = "printer-monitor", about = "Poll printer consumable levels over SNMP", version)]
struct Cli {
    /// Path to the TOML configuration file shared with the daemon.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll printers and store their levels. Polls all of them without --name.
    Refresh {
        /// Name of a registered printer.
        #[arg(long, requires = "ip")]
        name: Option<String>,

        /// IPv4 address the printer is registered at.
        #[arg(long, requires = "name")]
        ip: Option<Ipv4Addr>,
    },

    /// Write synthetic levels for a demo printer, registering it if needed.
    Simulate {
        #[arg(long)]
        name: String,

        #[arg(long)]
        ip: Ipv4Addr,

        /// Number of modules to report.
        #[arg(long, default_value_t = 4)]
        modules: u32,

        /// Seed for repeatable levels.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Delete readings older than the trailing window.
    Prune,

    /// Delete every printer and all of their readings.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Print the crontab line for the configured poll interval.
    CronEntry {
        /// Binary path to put in the entry instead of schedule.binary.
        #[arg(long)]
        binary: Option<PathBuf>,
    },
}

impl Cli {
    /// The subcommand to run; bare `printer-monitor` refreshes every printer
    fn command(&mut self) -> Commands {
        self.command.take().unwrap_or(Commands::Refresh { name: None, ip: None })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("printer_monitor=info,printer_monitord=info"))
        )
        .init();

    let mut cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let command = match cli.command() {
        // Needs no database
        Commands::CronEntry { binary } => {
            if let Some(binary) = binary {
                config.schedule.binary = binary;
            }
            println!("{}", cron_entry(&config.schedule, &cli.config)?);
            return Ok(());
        }
        command => command,
    };

    let db = PrinterDb::open(&config.store.db_path)?;
    let store = StoreHandle::spawn(db);
    let result = run(command, &config, &store).await;

    if let Err(e) = store.shutdown().await {
        tracing::error!("Failed to shutdown store: {}", e);
    }
    result
}

async fn run(command: Commands, config: &Config, store: &StoreHandle) -> Result<()> {
    let poller = Poller::new(Arc::new(UdpSnmpClient::new(&config.snmp)), config);

    match command {
        Commands::Refresh { name: Some(name), ip: Some(ip) } => {
            let report = poller.refresh_named(store, &name, ip).await?;
            tracing::info!("{}: {} readings written, {} unchanged", name, report.inserted, report.skipped);
        }
        Commands::Refresh { .. } => {
            let report = poller.refresh_all(store).await?;
            if report.failed > 0 {
                tracing::warn!("{} of {} printers could not be polled", report.failed, report.printers);
            }
        }
        Commands::Simulate { name, ip, modules, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let request = SimulateRequest { name, address: ip, modules };
            let report = simulate(store, &request, poller.policy(), &mut rng).await?;
            tracing::info!("{}: {} synthetic readings written", request.name, report.inserted);
        }
        Commands::Prune => {
            let pruned = store.prune(config.readings.window()).await?;
            tracing::info!("Pruned {} readings", pruned);
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Reset deletes every printer and reading; pass --yes to confirm");
            }
            let deleted = store.reset().await?;
            tracing::warn!("Deleted {} printers and their readings", deleted);
        }
        Commands::CronEntry { .. } => bail!("cron-entry does not touch the store"),
    }

    Ok(())
}
