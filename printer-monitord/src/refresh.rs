use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use shared::types::{Printer, ReadingRow};
use crate::config::Config;
use crate::snmp::client::{SnmpClient, SnmpError, Target};
use crate::snmp::supplies::{poll_supplies, PollOutcome};
use crate::store::ingest::{IngestPolicy, IngestReport};
use crate::store_manager::StoreHandle;

/// Polls printers and feeds the results to the store.
#[derive(Clone)]
pub struct Poller {
    client: Arc<dyn SnmpClient>,
    retries: u32,
    probe_retries: u32,
    policy: IngestPolicy,
    purge_stale: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub printers: usize,
    /// Printers that answered with the off placeholder
    pub off: usize,
    /// Printers whose poll failed after the supplies walk
    pub failed: usize,
    pub ingest: IngestReport,
    pub pruned: u64,
}

impl Poller {
    pub fn new(client: Arc<dyn SnmpClient>, config: &Config) -> Self {
        Self {
            client,
            retries: config.snmp.retries,
            probe_retries: config.snmp.probe_retries,
            policy: IngestPolicy {
                window: config.readings.window(),
                skip_unchanged: config.readings.skip_unchanged,
            },
            purge_stale: config.readings.purge_stale,
        }
    }

    pub fn client(&self) -> &Arc<dyn SnmpClient> {
        &self.client
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn probe_retries(&self) -> u32 {
        self.probe_retries
    }

    pub fn policy(&self) -> IngestPolicy {
        self.policy
    }

    pub fn window(&self) -> Duration {
        self.policy.window
    }

    /// Poll one printer off the async runtime
    pub async fn poll(&self, printer: &Printer) -> Result<Result<PollOutcome, SnmpError>> {
        let client = Arc::clone(&self.client);
        let target = Target {
            address: printer.address,
            version: printer.snmp_version,
            retries: self.retries,
        };

        tokio::task::spawn_blocking(move || poll_supplies(client.as_ref(), &target))
            .await
            .context("Poll task panicked")
    }

    /// Poll every printer one after another, then write a single batch.
    pub async fn refresh_all(&self, store: &StoreHandle) -> Result<BatchReport> {
        let printers = store.list_printers().await?;
        let mut report = BatchReport {
            printers: printers.len(),
            ..BatchReport::default()
        };
        let mut rows: Vec<ReadingRow> = Vec::new();

        for printer in &printers {
            match self.poll(printer).await? {
                Ok(outcome) => {
                    if outcome == PollOutcome::Off {
                        report.off += 1;
                    }
                    log_outcome(printer, &outcome);
                    rows.extend(outcome.into_rows(&printer.name));
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("{} ({}): poll failed: {}", printer.name, printer.address, e);
                }
            }
        }

        report.ingest = store.ingest(rows, self.policy).await?;

        if self.purge_stale {
            report.pruned = store.prune(self.policy.window).await?;
        }

        tracing::info!(
            "Refreshed {} printers ({} off, {} failed): {} readings written, {} unchanged, {} pruned",
            report.printers,
            report.off,
            report.failed,
            report.ingest.inserted,
            report.ingest.skipped,
            report.pruned
        );

        Ok(report)
    }

    /// Poll and ingest a single printer
    pub async fn refresh_printer(&self, store: &StoreHandle, printer: &Printer) -> Result<IngestReport> {
        let outcome = self
            .poll(printer)
            .await?
            .with_context(|| format!("Failed to poll {} ({})", printer.name, printer.address))?;
        log_outcome(printer, &outcome);

        store.ingest(outcome.into_rows(&printer.name), self.policy).await
    }

    /// Refresh the registered printer `name`, which must live at `address`
    pub async fn refresh_named(&self, store: &StoreHandle, name: &str, address: Ipv4Addr) -> Result<IngestReport> {
        let Some(printer) = store.find_printer(name.to_string()).await? else {
            bail!("No printer named {}", name);
        };
        if printer.address != address {
            bail!("Printer {} is registered at {}, not {}", name, printer.address, address);
        }

        self.refresh_printer(store, &printer).await
    }
}

fn log_outcome(printer: &Printer, outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Levels(supplies) => {
            tracing::info!("{} ({}): {} supplies", printer.name, printer.address, supplies.len());
        }
        PollOutcome::Off => {
            tracing::warn!("{} ({}): printer seems to be off", printer.name, printer.address);
        }
    }
}
