use shared::types::{Level, Reading};

/// Collapses runs of adjacent readings with equal printer, module and level.
///
/// Only neighbours are merged: the first row of every run is kept and the
/// input order is preserved, so a level that changes and later changes back
/// shows up three times.
pub fn compact(readings: Vec<Reading>) -> Vec<Reading> {
    let mut kept: Vec<Reading> = Vec::with_capacity(readings.len());
    let mut previous: Option<(i64, String, Level)> = None;

    for reading in readings {
        let same = matches!(
            &previous,
            Some((printer_id, module, level))
                if *printer_id == reading.printer_id
                    && *module == reading.module
                    && *level == reading.level
        );
        if same {
            continue;
        }

        previous = Some((reading.printer_id, reading.module.clone(), reading.level));
        kept.push(reading);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn reading(id: i64, printer_id: i64, module: &str, level: Level) -> Reading {
        Reading {
            id,
            printer_id,
            printer_name: format!("printer-{}", printer_id),
            taken_at: Utc::now() + Duration::seconds(id),
            module: module.to_string(),
            level,
        }
    }

    fn ids(readings: &[Reading]) -> Vec<i64> {
        readings.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_keeps_first_of_each_run() {
        let input = vec![
            reading(1, 1, "Black", Level::Percent(40)),
            reading(2, 1, "Black", Level::Percent(40)),
            reading(3, 1, "Black", Level::Percent(40)),
            reading(4, 1, "Black", Level::Percent(39)),
            reading(5, 1, "Cyan", Level::Ok),
            reading(6, 1, "Cyan", Level::Ok),
        ];

        assert_eq!(ids(&compact(input)), [1, 4, 5]);
    }

    #[test]
    fn test_only_adjacent_duplicates_merge() {
        let input = vec![
            reading(1, 1, "Black", Level::Percent(40)),
            reading(2, 1, "Black", Level::Percent(39)),
            reading(3, 1, "Black", Level::Percent(40)),
        ];

        assert_eq!(ids(&compact(input)), [1, 2, 3]);
    }

    #[test]
    fn test_printer_and_module_break_runs() {
        let input = vec![
            reading(1, 1, "Black", Level::NotApplicable),
            reading(2, 2, "Black", Level::NotApplicable),
            reading(3, 2, "Cyan", Level::NotApplicable),
            reading(4, 2, "Cyan", Level::NotApplicable),
        ];

        assert_eq!(ids(&compact(input)), [1, 2, 3]);
    }

    #[test]
    fn test_empty_and_idempotent() {
        assert!(compact(Vec::new()).is_empty());

        let input = vec![
            reading(1, 1, "Black", Level::Percent(10)),
            reading(2, 1, "Black", Level::Percent(10)),
            reading(3, 1, "Black", Level::Percent(9)),
        ];
        let once = compact(input);
        let twice = compact(once.clone());
        assert_eq!(once, twice);
    }
}
