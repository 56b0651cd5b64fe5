use std::collections::HashMap;
use shared::types::{Level, ReadingRow};
use crate::snmp::client::{child, SnmpClient, SnmpError, Target, Value};
use crate::snmp::text::{decode_text, normalize_name};

/// Printer-MIB prtMarkerSuppliesTable columns, marker index 1
pub const SUPPLY_COLORANT: &[u64] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 3, 1];
pub const SUPPLY_DESCRIPTION: &[u64] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 6, 1];
pub const SUPPLY_MAX_CAPACITY: &[u64] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 8, 1];
pub const SUPPLY_LEVEL: &[u64] = &[1, 3, 6, 1, 2, 1, 43, 11, 1, 1, 9, 1];

/// prtMarkerColorantValue, the colour name a supply's colorant index points at
pub const COLORANT_VALUE: &[u64] = &[1, 3, 6, 1, 2, 1, 43, 12, 1, 1, 4, 1];

/// Supply present, level not tracked
const LEVEL_SOME_REMAINING: i64 = -3;
/// Level unknown
const LEVEL_UNKNOWN: i64 = -2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supply {
    pub module: String,
    pub level: Level,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Levels(Vec<Supply>),
    /// The supplies walk failed: the printer is off or unreachable
    Off,
}

impl PollOutcome {
    /// Rows for ingestion; `Off` becomes the single placeholder row.
    pub fn into_rows(self, printer: &str) -> Vec<ReadingRow> {
        match self {
            PollOutcome::Levels(supplies) => supplies
                .into_iter()
                .map(|s| ReadingRow::new(printer, s.module, s.level))
                .collect(),
            PollOutcome::Off => vec![ReadingRow::off(printer)],
        }
    }
}

/// Read and normalize every consumable of one printer.
///
/// A failed or empty walk yields [`PollOutcome::Off`]. Entries the agent
/// answers with noSuchName are left out. Any other error after the walk is
/// returned as is.
pub fn poll_supplies(client: &dyn SnmpClient, target: &Target) -> Result<PollOutcome, SnmpError> {
    let descriptions = match client.walk(target, SUPPLY_DESCRIPTION) {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) => {
            tracing::warn!("{}: supplies table is empty", target.address);
            return Ok(PollOutcome::Off);
        }
        Err(e) => {
            tracing::warn!("{}: supplies walk failed: {}", target.address, e);
            return Ok(PollOutcome::Off);
        }
    };

    let mut supplies = Vec::with_capacity(descriptions.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (oid, description) in descriptions {
        let Some(&index) = oid.last() else { continue };

        match read_supply(client, target, index, &description)? {
            Some(mut supply) => {
                supply.module = unique_module(supply.module, &mut seen);
                supplies.push(supply);
            }
            None => tracing::debug!("{}: supply {} has no such name, skipped", target.address, index),
        }
    }

    Ok(PollOutcome::Levels(supplies))
}

fn read_supply(
    client: &dyn SnmpClient,
    target: &Target,
    index: u64,
    description: &Value,
) -> Result<Option<Supply>, SnmpError> {
    let fetch = |table: &[u64]| -> Result<Option<Value>, SnmpError> {
        match client.get(target, &child(table, index)) {
            Ok(value) => Ok(Some(value)),
            Err(SnmpError::NoSuchName) => Ok(None),
            Err(e) => Err(e),
        }
    };

    let Some(colorant) = fetch(SUPPLY_COLORANT)? else { return Ok(None) };
    let Some(capacity) = fetch(SUPPLY_MAX_CAPACITY)? else { return Ok(None) };
    let Some(level) = fetch(SUPPLY_LEVEL)? else { return Ok(None) };

    let description = match description {
        Value::Text(raw) => decode_text(raw),
        _ => String::new(),
    };

    let Some(name) = resolve_name(client, target, &colorant, &description)? else {
        return Ok(None);
    };
    let module = match normalize_name(&name) {
        empty if empty.is_empty() => format!("Supply {}", index),
        module => module,
    };

    Ok(Some(Supply {
        module,
        level: normalize_level(level.as_int(), capacity.as_int()),
    }))
}

/// Colour name behind the colorant index, else the description.
/// `None` when the colorant lookup answers noSuchName.
fn resolve_name(
    client: &dyn SnmpClient,
    target: &Target,
    colorant: &Value,
    description: &str,
) -> Result<Option<String>, SnmpError> {
    let colorant_index = match colorant.as_int() {
        Some(i) if i > 0 => i as u64,
        _ => return Ok(Some(description.to_string())),
    };

    match client.get(target, &child(COLORANT_VALUE, colorant_index)) {
        Ok(Value::Text(raw)) => {
            let name = decode_text(&raw);
            Ok(Some(if name.is_empty() { description.to_string() } else { name }))
        }
        Ok(_) => Ok(Some(description.to_string())),
        Err(SnmpError::NoSuchName) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Map a raw level and capacity to a [`Level`].
///
/// -3 is OK, -2 and every other value that cannot give a percentage is NA.
/// Percentages round to the nearest integer, halves to even, and never exceed 100.
pub fn normalize_level(level: Option<i64>, capacity: Option<i64>) -> Level {
    match (level, capacity) {
        (Some(LEVEL_SOME_REMAINING), _) => Level::Ok,
        (Some(LEVEL_UNKNOWN), _) => Level::NotApplicable,
        (Some(level), Some(capacity)) if level >= 0 && capacity > 0 => {
            let percent = (level as f64 / capacity as f64 * 100.0).round_ties_even();
            Level::Percent(percent.min(100.0) as u8)
        }
        _ => Level::NotApplicable,
    }
}

fn unique_module(module: String, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(module.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        module
    } else {
        format!("{} ({})", module, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use shared::protocol::{OFF_LEVEL, OFF_MODULE};
    use shared::types::SnmpVersion;
    use crate::snmp::fake::FakeDevice;

    fn target() -> Target {
        Target {
            address: Ipv4Addr::new(10, 0, 0, 5),
            version: SnmpVersion::V2c,
            retries: 0,
        }
    }

    fn levels(outcome: PollOutcome) -> Vec<(String, String)> {
        match outcome {
            PollOutcome::Levels(supplies) => supplies
                .into_iter()
                .map(|s| (s.module, s.level.to_string()))
                .collect(),
            PollOutcome::Off => panic!("printer reported off"),
        }
    }

    #[test]
    fn test_percentage_from_capacity() {
        let device = FakeDevice::new()
            .with_supply(1, "Cyan Cartridge", 1, 100, 13)
            .with_colorant(1, "cyan");

        assert_eq!(levels(poll_supplies(&device, &target()).unwrap()), [("Cyan".to_string(), "13".to_string())]);
    }

    #[test]
    fn test_special_levels() {
        let device = FakeDevice::new()
            .with_supply(1, "Black Toner", 0, 100, -3)
            .with_supply(2, "Waste Toner Box", 0, -2, -2)
            .with_supply(3, "Drum", 0, 0, 50);

        assert_eq!(
            levels(poll_supplies(&device, &target()).unwrap()),
            [
                ("Black Toner".to_string(), "OK".to_string()),
                ("Waste Toner Box".to_string(), "NA".to_string()),
                ("Drum".to_string(), "NA".to_string()),
            ]
        );
    }

    #[test]
    fn test_colorant_missing_falls_back_to_description() {
        let device = FakeDevice::new()
            .with_supply(1, "TonerCollectionUnit", 7, 100, 80);

        assert_eq!(
            levels(poll_supplies(&device, &target()).unwrap()),
            [("Toner Collection Unit".to_string(), "80".to_string())]
        );
    }

    #[test]
    fn test_hex_description_is_decoded() {
        let device = FakeDevice::new()
            .with_supply(1, "44 72 75 6D 20 55 6E 69 74 00", 0, 200, 50);

        assert_eq!(
            levels(poll_supplies(&device, &target()).unwrap()),
            [("Drum Unit".to_string(), "25".to_string())]
        );
    }

    #[test]
    fn test_no_such_name_skips_entry() {
        let device = FakeDevice::new()
            .with_supply(1, "Black Toner", 1, 100, 40)
            .with_colorant(1, "black")
            .with_supply(2, "Waste Toner", 2, 100, 10)
            .with_no_such_name(&child(COLORANT_VALUE, 2))
            .with_supply(3, "Drum Unit", 0, 100, 90)
            .with_no_such_name(&child(SUPPLY_COLORANT, 3));

        assert_eq!(
            levels(poll_supplies(&device, &target()).unwrap()),
            [("Black".to_string(), "40".to_string())]
        );
    }

    #[test]
    fn test_walk_failure_yields_placeholder() {
        let outcome = poll_supplies(&FakeDevice::off(), &target()).unwrap();
        assert_eq!(outcome, PollOutcome::Off);

        let rows = outcome.into_rows("IT Copier");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].module, OFF_MODULE);
        assert_eq!(rows[0].level.to_string(), OFF_LEVEL);
    }

    #[test]
    fn test_empty_table_yields_placeholder() {
        let device = FakeDevice::new();
        assert_eq!(poll_supplies(&device, &target()).unwrap(), PollOutcome::Off);
    }

    #[test]
    fn test_duplicate_names_are_numbered() {
        let device = FakeDevice::new()
            .with_supply(1, "Black Toner", 0, 100, 40)
            .with_supply(2, "black toner", 0, 100, 60);

        assert_eq!(
            levels(poll_supplies(&device, &target()).unwrap()),
            [
                ("Black Toner".to_string(), "40".to_string()),
                ("Black Toner (2)".to_string(), "60".to_string()),
            ]
        );
    }

    #[test]
    fn test_levels_always_in_range() {
        let samples = [-3, -2, -1, 0, 1, 49, 50, 99, 100, 101, 5000, i64::MAX];
        let capacities = [-2, -1, 0, 1, 3, 100, 200, i64::MAX];

        for &level in &samples {
            for &capacity in &capacities {
                match normalize_level(Some(level), Some(capacity)) {
                    Level::Percent(p) => assert!(p <= 100),
                    Level::Ok | Level::NotApplicable => {}
                    Level::Off => panic!("poll produced the off level"),
                }
            }
        }
        assert_eq!(normalize_level(None, Some(100)), Level::NotApplicable);
    }

    #[test]
    fn test_rounding_halves_to_even() {
        assert_eq!(normalize_level(Some(1), Some(8)), Level::Percent(12));
        assert_eq!(normalize_level(Some(3), Some(8)), Level::Percent(38));
        assert_eq!(normalize_level(Some(5), Some(8)), Level::Percent(62));
        assert_eq!(normalize_level(Some(1), Some(3)), Level::Percent(33));
        assert_eq!(normalize_level(Some(2), Some(3)), Level::Percent(67));
        assert_eq!(normalize_level(Some(150), Some(100)), Level::Percent(100));
    }
}
