use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use shared::protocol::{OFF_LEVEL, OFF_MODULE};
use shared::types::{Level, NewPrinter, Printer, Reading, SnmpVersion};

const PRINTER_COLUMNS: &str =
    "id, name, model, location, address, department, snmp_version";

pub struct PrinterDb {
    conn: Connection,
}

impl PrinterDb {
    /// Open or create the SQLite database with WAL mode and foreign keys enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;
        // Readings cascade with their printer
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to enable foreign keys")?;
        // The daemon and the cron batch share the file
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS printers (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                name         TEXT NOT NULL UNIQUE,
                model        TEXT NOT NULL,
                location     TEXT NOT NULL,
                address      TEXT NOT NULL UNIQUE,
                department   TEXT NOT NULL,
                snmp_version INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS toner_levels (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                printer_id INTEGER NOT NULL REFERENCES printers(id) ON DELETE CASCADE,
                taken_at   TEXT NOT NULL,
                module     TEXT NOT NULL,
                level      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_levels_printer_module
                ON toner_levels(printer_id, module, taken_at);
            CREATE INDEX IF NOT EXISTS idx_levels_taken_at ON toner_levels(taken_at);
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Register a printer. Fails on a duplicate name or address.
    pub fn insert_printer(&self, printer: &NewPrinter) -> Result<Printer> {
        self.conn
            .execute(
                "INSERT INTO printers (name, model, location, address, department, snmp_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &printer.name,
                    &printer.model,
                    &printer.location,
                    printer.address.to_string(),
                    &printer.department,
                    printer.snmp_version.number(),
                ],
            )
            .with_context(|| format!("Failed to insert printer {}", printer.name))?;

        Ok(Printer {
            id: self.conn.last_insert_rowid(),
            name: printer.name.clone(),
            model: printer.model.clone(),
            location: printer.location.clone(),
            address: printer.address,
            department: printer.department.clone(),
            snmp_version: printer.snmp_version,
        })
    }

    /// All printers ordered by department, then name
    pub fn printers_ordered(&self) -> Result<Vec<Printer>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PRINTER_COLUMNS} FROM printers ORDER BY department, name"
            ))
            .context("Failed to prepare query")?;

        let printers = stmt
            .query_map([], Self::row_to_printer)
            .context("Failed to query printers")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect printers")?;

        Ok(printers)
    }

    pub fn find_printer(&self, name: &str) -> Result<Option<Printer>> {
        self.conn
            .query_row(
                &format!("SELECT {PRINTER_COLUMNS} FROM printers WHERE name = ?1"),
                params![name],
                Self::row_to_printer,
            )
            .optional()
            .context("Failed to query printer by name")
    }

    pub fn find_printer_by_address(&self, address: Ipv4Addr) -> Result<Option<Printer>> {
        self.conn
            .query_row(
                &format!("SELECT {PRINTER_COLUMNS} FROM printers WHERE address = ?1"),
                params![address.to_string()],
                Self::row_to_printer,
            )
            .optional()
            .context("Failed to query printer by address")
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction; commits only on `Ok`.
    pub fn with_transaction<T>(&mut self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    /// Readings taken at or after `since`, ordered by printer, module, then time
    pub fn readings_since(&self, since: DateTime<Utc>) -> Result<Vec<Reading>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT l.id, l.printer_id, p.name, l.taken_at, l.module, l.level
                 FROM toner_levels l JOIN printers p ON p.id = l.printer_id
                 WHERE l.taken_at >= ?1
                 ORDER BY p.name, l.module, l.taken_at, l.id",
            )
            .context("Failed to prepare query")?;

        let readings = stmt
            .query_map(params![encode_ts(since)], Self::row_to_reading)
            .context("Failed to query readings")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect readings")?;

        Ok(readings)
    }

    /// Newest reading timestamp across all printers
    pub fn latest_reading_time(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<String> = self
            .conn
            .query_row("SELECT MAX(taken_at) FROM toner_levels", [], |row| row.get(0))
            .context("Failed to query latest reading time")?;

        latest
            .map(|text| decode_ts(&text).context("Corrupt reading timestamp"))
            .transpose()
    }

    /// Most recent level of every module of one printer
    pub fn latest_levels(&self, printer_id: i64) -> Result<Vec<(String, Level)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT module, level FROM toner_levels
                 WHERE id IN (
                     SELECT MAX(id) FROM toner_levels WHERE printer_id = ?1 GROUP BY module
                 )
                 ORDER BY module",
            )
            .context("Failed to prepare query")?;

        let levels = stmt
            .query_map(params![printer_id], |row| {
                let module: String = row.get(0)?;
                let level = parse_level(row, 1)?;
                Ok((module, level))
            })
            .context("Failed to query latest levels")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect latest levels")?;

        Ok(levels)
    }

    #[cfg(test)]
    pub fn count_readings(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM toner_levels", [], |row| row.get(0))
            .context("Failed to count readings")?;
        Ok(count as u64)
    }

    /// Delete readings taken before `cutoff`
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let count = self
            .conn
            .execute(
                "DELETE FROM toner_levels WHERE taken_at < ?1",
                params![encode_ts(cutoff)],
            )
            .context("Failed to prune old readings")?;

        Ok(count as u64)
    }

    /// Delete every printer; their readings go with them
    pub fn reset(&self) -> Result<u64> {
        let count = self
            .conn
            .execute("DELETE FROM printers", [])
            .context("Failed to delete printers")?;

        Ok(count as u64)
    }

    fn row_to_printer(row: &rusqlite::Row) -> Result<Printer, rusqlite::Error> {
        let address_str: String = row.get(4)?;
        let version_num: u8 = row.get(6)?;

        let address = address_str
            .parse::<Ipv4Addr>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?;

        let snmp_version = SnmpVersion::try_from(version_num)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Integer,
                Box::new(e),
            ))?;

        Ok(Printer {
            id: row.get(0)?,
            name: row.get(1)?,
            model: row.get(2)?,
            location: row.get(3)?,
            address,
            department: row.get(5)?,
            snmp_version,
        })
    }

    fn row_to_reading(row: &rusqlite::Row) -> Result<Reading, rusqlite::Error> {
        let taken_at_str: String = row.get(3)?;

        let taken_at = decode_ts(&taken_at_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?;

        Ok(Reading {
            id: row.get(0)?,
            printer_id: row.get(1)?,
            printer_name: row.get(2)?,
            taken_at,
            module: row.get(4)?,
            level: parse_level(row, 5)?,
        })
    }
}

/// Id of the printer with this name
pub fn printer_id_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM printers WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up printer id")
}

/// Whether this exact level was stored for the module at or after `since`
pub fn has_level_since(
    conn: &Connection,
    printer_id: i64,
    module: &str,
    level: Level,
    since: DateTime<Utc>,
) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM toner_levels
             WHERE printer_id = ?1 AND module = ?2 AND level = ?3 AND taken_at >= ?4
             LIMIT 1",
            params![printer_id, module, level.to_string(), encode_ts(since)],
            |_| Ok(()),
        )
        .optional()
        .context("Failed to check for an unchanged reading")?;

    Ok(found.is_some())
}

/// Whether the newest stored row of the printer is the off placeholder
pub fn latest_is_off(conn: &Connection, printer_id: i64) -> Result<bool> {
    let latest: Option<(String, String)> = conn
        .query_row(
            "SELECT module, level FROM toner_levels WHERE printer_id = ?1
             ORDER BY taken_at DESC, id DESC LIMIT 1",
            params![printer_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("Failed to read newest reading")?;

    Ok(matches!(latest, Some((module, level)) if module == OFF_MODULE && level == OFF_LEVEL))
}

pub fn insert_level(
    conn: &Connection,
    printer_id: i64,
    module: &str,
    level: Level,
    taken_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO toner_levels (printer_id, taken_at, module, level) VALUES (?1, ?2, ?3, ?4)",
        params![printer_id, encode_ts(taken_at), module, level.to_string()],
    )
    .context("Failed to insert reading")?;
    Ok(())
}

/// True when the error chain holds a SQLite UNIQUE/constraint failure
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    })
}

/// Fixed-width UTC text so lexical order matches time order
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

fn parse_level(row: &rusqlite::Row, idx: usize) -> Result<Level, rusqlite::Error> {
    let text: String = row.get(idx)?;
    text.parse::<Level>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        ))
}
