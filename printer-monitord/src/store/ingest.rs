use std::collections::HashMap;
use std::time::Duration;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use shared::types::ReadingRow;
use crate::store::db::{self, PrinterDb};

/// How a batch of readings is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestPolicy {
    /// Trailing window used by the unchanged-level check
    pub window: Duration,
    /// Skip a row when the same level is already stored inside the window
    pub skip_unchanged: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Persist one batch of poll results, all stamped with `now`.
///
/// Every row must name a registered printer; an unknown name aborts the whole
/// batch. The unchanged-level check and the inserts share one immediate
/// transaction, so two writers cannot interleave between check and insert.
/// The check is also bypassed whenever a row flips the printer between on and
/// off: levels after a stored placeholder, and a placeholder after stored
/// levels. Otherwise an older row in the window would hide the change.
pub fn ingest(
    store: &mut PrinterDb,
    rows: &[ReadingRow],
    policy: IngestPolicy,
    now: DateTime<Utc>,
) -> Result<IngestReport> {
    let since = window_start(now, policy.window);

    store.with_transaction(|conn| {
        let mut report = IngestReport::default();
        // name -> (id, newest stored row is the off placeholder)
        let mut printers: HashMap<&str, (i64, bool)> = HashMap::new();

        for row in rows {
            let (printer_id, was_off) = match printers.get(row.printer.as_str()) {
                Some(&known) => known,
                None => {
                    let id = db::printer_id_by_name(conn, &row.printer)?
                        .ok_or_else(|| anyhow!("Unknown printer in readings batch: {}", row.printer))?;
                    let known = (id, db::latest_is_off(conn, id)?);
                    printers.insert(row.printer.as_str(), known);
                    known
                }
            };

            if policy.skip_unchanged
                && row.is_off_placeholder() == was_off
                && db::has_level_since(conn, printer_id, &row.module, row.level, since)?
            {
                tracing::debug!("{}: {} unchanged at {}, skipped", row.printer, row.module, row.level);
                report.skipped += 1;
                continue;
            }

            db::insert_level(conn, printer_id, &row.module, row.level, now)?;
            report.inserted += 1;
        }

        Ok(report)
    })
}

/// Start of the trailing window ending at `now`
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
