use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{Printer, Reading};
use crate::store::compact::compact;
use crate::store::db::PrinterDb;
use crate::store::ingest::window_start;

/// Everything the home page shows, read in one go.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Ordered by department, then name
    pub printers: Vec<Printer>,
    /// Current readings with adjacent repeats collapsed
    pub readings: Vec<Reading>,
    /// Printers whose newest reading in the window is the off placeholder
    pub off: BTreeSet<i64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Which optional printer details the page shows. Lives only in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    pub show_location: bool,
    pub show_ip: bool,
    pub show_model: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            show_location: true,
            show_ip: true,
            show_model: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentView {
    pub name: String,
    pub printers: Vec<PrinterCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrinterCard {
    pub name: String,
    pub model: String,
    pub location: String,
    pub address: String,
    /// Last poll could not reach the printer
    pub off: bool,
    pub supplies: Vec<SupplyView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplyView {
    pub module: String,
    pub level: String,
    pub percent: Option<u8>,
}

pub fn assemble(db: &PrinterDb, window: Duration, now: DateTime<Utc>) -> Result<Dashboard> {
    let printers = db.printers_ordered()?;
    let current = db.readings_since(window_start(now, window))?;
    // Before compaction, which can merge a later placeholder into an earlier one
    let off = off_printers(&current);
    let readings = compact(current);
    let last_updated = db.latest_reading_time()?;

    Ok(Dashboard {
        printers,
        readings,
        off,
        last_updated,
    })
}

fn off_printers(readings: &[Reading]) -> BTreeSet<i64> {
    // printer id -> (newest placeholder, newest level)
    let mut newest: HashMap<i64, (Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = HashMap::new();
    for reading in readings {
        let (off_at, seen_at) = newest.entry(reading.printer_id).or_default();
        if reading.is_off_placeholder() {
            *off_at = (*off_at).max(Some(reading.taken_at));
        } else {
            *seen_at = (*seen_at).max(Some(reading.taken_at));
        }
    }

    newest
        .into_iter()
        .filter(|(_, (off_at, seen_at))| off_at.is_some() && off_at >= seen_at)
        .map(|(id, _)| id)
        .collect()
}

impl Dashboard {
    /// Printer cards grouped by department, in printer order
    pub fn departments(&self) -> Vec<DepartmentView> {
        let mut departments: Vec<DepartmentView> = Vec::new();

        for printer in &self.printers {
            let card = self.card(printer);
            match departments.last_mut() {
                Some(department) if department.name == printer.department => {
                    department.printers.push(card);
                }
                _ => departments.push(DepartmentView {
                    name: printer.department.clone(),
                    printers: vec![card],
                }),
            }
        }

        departments
    }

    fn card(&self, printer: &Printer) -> PrinterCard {
        let mut latest: BTreeMap<&str, &Reading> = BTreeMap::new();

        for reading in self.readings.iter().filter(|r| r.printer_id == printer.id) {
            if reading.is_off_placeholder() {
                continue;
            }
            match latest.get(reading.module.as_str()) {
                Some(kept) if kept.taken_at > reading.taken_at => {}
                _ => {
                    latest.insert(reading.module.as_str(), reading);
                }
            }
        }

        PrinterCard {
            name: printer.name.clone(),
            model: printer.model.clone(),
            location: printer.location.clone(),
            address: printer.address.to_string(),
            off: self.off.contains(&printer.id),
            supplies: latest
                .into_values()
                .map(|r| SupplyView {
                    module: r.module.clone(),
                    level: r.level.to_string(),
                    percent: r.level.percent(),
                })
                .collect(),
        }
    }
}
