use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use anyhow::Result;
use chrono::Utc;
use shared::types::{Level, NewPrinter, Printer, ReadingRow};
use crate::dashboard::{self, Dashboard};
use crate::store::db::PrinterDb;
use crate::store::ingest::{self, window_start, IngestPolicy, IngestReport};

/// Commands sent to the store thread
pub enum StoreCommand {
    InsertPrinter(NewPrinter, oneshot::Sender<Result<Printer>>),
    ListPrinters(oneshot::Sender<Result<Vec<Printer>>>),
    FindPrinter(String, oneshot::Sender<Result<Option<Printer>>>),
    FindPrinterByAddress(Ipv4Addr, oneshot::Sender<Result<Option<Printer>>>),
    Ingest {
        rows: Vec<ReadingRow>,
        policy: IngestPolicy,
        reply: oneshot::Sender<Result<IngestReport>>,
    },
    Dashboard {
        window: Duration,
        reply: oneshot::Sender<Result<Dashboard>>,
    },
    LatestLevels(i64, oneshot::Sender<Result<Vec<(String, Level)>>>),
    Prune {
        window: Duration,
        reply: oneshot::Sender<Result<u64>>,
    },
    Reset(oneshot::Sender<Result<u64>>),
    Shutdown,
}

/// Handle to the thread that owns the database
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Spawn a new store thread with the given database
    pub fn spawn(mut db: PrinterDb) -> Self {
        let (tx, mut rx) = mpsc::channel::<StoreCommand>(64);

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    StoreCommand::InsertPrinter(printer, reply) => {
                        let _ = reply.send(db.insert_printer(&printer));
                    }
                    StoreCommand::ListPrinters(reply) => {
                        let _ = reply.send(db.printers_ordered());
                    }
                    StoreCommand::FindPrinter(name, reply) => {
                        let _ = reply.send(db.find_printer(&name));
                    }
                    StoreCommand::FindPrinterByAddress(address, reply) => {
                        let _ = reply.send(db.find_printer_by_address(address));
                    }
                    StoreCommand::Ingest { rows, policy, reply } => {
                        let result = ingest::ingest(&mut db, &rows, policy, Utc::now());
                        let _ = reply.send(result);
                    }
                    StoreCommand::Dashboard { window, reply } => {
                        let _ = reply.send(dashboard::assemble(&db, window, Utc::now()));
                    }
                    StoreCommand::LatestLevels(printer_id, reply) => {
                        let _ = reply.send(db.latest_levels(printer_id));
                    }
                    StoreCommand::Prune { window, reply } => {
                        let result = db.prune_before(window_start(Utc::now(), window));
                        let _ = reply.send(result);
                    }
                    StoreCommand::Reset(reply) => {
                        let _ = reply.send(db.reset());
                    }
                    StoreCommand::Shutdown => {
                        tracing::info!("Store thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Register a printer
    pub async fn insert_printer(&self, printer: NewPrinter) -> Result<Printer> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::InsertPrinter(printer, reply)).await?;
        rx.await?
    }

    /// All printers ordered by department, then name
    pub async fn list_printers(&self) -> Result<Vec<Printer>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::ListPrinters(reply)).await?;
        rx.await?
    }

    pub async fn find_printer(&self, name: String) -> Result<Option<Printer>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::FindPrinter(name, reply)).await?;
        rx.await?
    }

    pub async fn find_printer_by_address(&self, address: Ipv4Addr) -> Result<Option<Printer>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::FindPrinterByAddress(address, reply)).await?;
        rx.await?
    }

    /// Write one batch of readings stamped with the current time
    pub async fn ingest(&self, rows: Vec<ReadingRow>, policy: IngestPolicy) -> Result<IngestReport> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::Ingest { rows, policy, reply }).await?;
        rx.await?
    }

    pub async fn dashboard(&self, window: Duration) -> Result<Dashboard> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::Dashboard { window, reply }).await?;
        rx.await?
    }

    /// Most recent level of every module of one printer
    pub async fn latest_levels(&self, printer_id: i64) -> Result<Vec<(String, Level)>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::LatestLevels(printer_id, reply)).await?;
        rx.await?
    }

    /// Delete readings older than the window
    pub async fn prune(&self, window: Duration) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::Prune { window, reply }).await?;
        rx.await?
    }

    /// Delete every printer and, by cascade, every reading
    pub async fn reset(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StoreCommand::Reset(reply)).await?;
        rx.await?
    }

    /// Shutdown the store thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(StoreCommand::Shutdown).await?;
        Ok(())
    }
}
