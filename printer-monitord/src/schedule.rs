use std::path::Path;
use anyhow::{bail, Result};
use crate::config::ScheduleConfig;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// The five cron time fields firing every `minutes`
pub fn cron_schedule(minutes: u32) -> Result<String> {
    match minutes {
        0 => bail!("Poll interval must be greater than zero"),
        1..=59 => Ok(format!("*/{} * * * *", minutes)),
        m if m % 60 == 0 && m < MINUTES_PER_DAY => Ok(format!("0 */{} * * *", m / 60)),
        MINUTES_PER_DAY => Ok("0 0 * * *".to_string()),
        m if m % MINUTES_PER_DAY == 0 && m / MINUTES_PER_DAY <= 31 => {
            Ok(format!("0 0 */{} * *", m / MINUTES_PER_DAY))
        }
        m => bail!("A {} minute poll interval cannot be expressed as a cron entry", m),
    }
}

/// Crontab line running a routine refresh with the given config file.
pub fn cron_entry(schedule: &ScheduleConfig, config_path: &Path) -> Result<String> {
    Ok(format!(
        "{} {} --config {} refresh",
        cron_schedule(schedule.poll_interval_mins)?,
        schedule.binary.display(),
        config_path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_minutes_and_hours() {
        assert_eq!(cron_schedule(15).unwrap(), "*/15 * * * *");
        assert_eq!(cron_schedule(1).unwrap(), "*/1 * * * *");
        assert_eq!(cron_schedule(60).unwrap(), "0 */1 * * *");
        assert_eq!(cron_schedule(360).unwrap(), "0 */6 * * *");
        assert_eq!(cron_schedule(1440).unwrap(), "0 0 * * *");
        assert_eq!(cron_schedule(2880).unwrap(), "0 0 */2 * *");
    }

    #[test]
    fn test_unrepresentable_intervals() {
        assert!(cron_schedule(0).is_err());
        assert!(cron_schedule(90).is_err());
        assert!(cron_schedule(1500).is_err());
    }

    #[test]
    fn test_entry_line() {
        let schedule = ScheduleConfig {
            poll_interval_mins: 30,
            binary: PathBuf::from("/usr/local/bin/printer-monitor"),
        };
        let entry = cron_entry(&schedule, Path::new("/etc/printer-monitor/monitord.toml")).unwrap();
        assert_eq!(
            entry,
            "*/30 * * * * /usr/local/bin/printer-monitor --config /etc/printer-monitor/monitord.toml refresh"
        );
    }
}
