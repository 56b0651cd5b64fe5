use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::protocol::{LEVEL_NA, LEVEL_OK, OFF_LEVEL, OFF_MODULE};

/// SNMP protocol version a printer answered to at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    /// Probe order used by version discovery: newest first.
    pub const PROBE_ORDER: [SnmpVersion; 3] = [SnmpVersion::V3, SnmpVersion::V2c, SnmpVersion::V1];

    pub fn number(self) -> u8 {
        match self {
            SnmpVersion::V1 => 1,
            SnmpVersion::V2c => 2,
            SnmpVersion::V3 => 3,
        }
    }
}

impl From<SnmpVersion> for u8 {
    fn from(version: SnmpVersion) -> Self {
        version.number()
    }
}

impl TryFrom<u8> for SnmpVersion {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SnmpVersion::V1),
            2 => Ok(SnmpVersion::V2c),
            3 => Ok(SnmpVersion::V3),
            other => Err(ParseError::SnmpVersion(other.to_string())),
        }
    }
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("not a toner level: {0:?}")]
    Level(String),
    #[error("not an SNMP version: {0}")]
    SnmpVersion(String),
}

/// A registered printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printer {
    pub id: i64,

    /// Name of the printer on the print server, unique
    pub name: String,

    /// Model string reported by the device
    pub model: String,

    /// Free-form physical location, e.g. "Building 8 Room 45"
    pub location: String,

    /// IPv4 address, unique
    pub address: Ipv4Addr,

    pub department: String,

    pub snmp_version: SnmpVersion,
}

/// Fields needed to register a printer; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrinter {
    pub name: String,
    pub model: String,
    pub location: String,
    pub address: Ipv4Addr,
    pub department: String,
    pub snmp_version: SnmpVersion,
}

/// Level of one consumable.
///
/// Stored and rendered as text: a bare integer percentage, `OK`, `NA`, or
/// `Not on` for the placeholder row of a printer that did not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Level {
    Percent(u8),
    Ok,
    NotApplicable,
    Off,
}

impl Level {
    pub fn percent(&self) -> Option<u8> {
        match self {
            Level::Percent(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Percent(p) => write!(f, "{}", p),
            Level::Ok => f.write_str(LEVEL_OK),
            Level::NotApplicable => f.write_str(LEVEL_NA),
            Level::Off => f.write_str(OFF_LEVEL),
        }
    }
}

impl FromStr for Level {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            LEVEL_OK => Ok(Level::Ok),
            LEVEL_NA => Ok(Level::NotApplicable),
            OFF_LEVEL => Ok(Level::Off),
            digits => match digits.parse::<u8>() {
                Ok(p) if p <= 100 && !digits.starts_with('+') => Ok(Level::Percent(p)),
                _ => Err(ParseError::Level(s.to_string())),
            },
        }
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.to_string()
    }
}

impl TryFrom<String> for Level {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One polled value on its way into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingRow {
    pub printer: String,
    pub module: String,
    pub level: Level,
}

impl ReadingRow {
    pub fn new(printer: impl Into<String>, module: impl Into<String>, level: Level) -> Self {
        Self {
            printer: printer.into(),
            module: module.into(),
            level,
        }
    }

    /// The placeholder row for a printer that did not answer.
    pub fn off(printer: impl Into<String>) -> Self {
        Self::new(printer, OFF_MODULE, Level::Off)
    }

    pub fn is_off_placeholder(&self) -> bool {
        self.module == OFF_MODULE && self.level == Level::Off
    }
}

/// A stored toner reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,

    pub printer_id: i64,

    /// Denormalized from the printer row for display and ordering
    pub printer_name: String,

    /// Write time, shared by every row of one ingestion batch
    pub taken_at: DateTime<Utc>,

    /// Toner colour or unit name, e.g. "Magenta" or "Toner Collection Unit"
    pub module: String,

    pub level: Level,
}

impl Reading {
    pub fn is_off_placeholder(&self) -> bool {
        self.module == OFF_MODULE && self.level == Level::Off
    }
}
