use std::fmt;
use std::net::Ipv4Addr;
use shared::types::SnmpVersion;

/// Upper bound on rows returned by one walk
const MAX_WALK_ROWS: usize = 4096;

/// An owned SNMP value, reduced to what printer polling needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Unsigned(u64),
    Text(Vec<u8>),
    ObjectId(Vec<u64>),
    /// noSuchObject, noSuchInstance, endOfMibView or NULL
    Missing,
    Other(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Unsigned(n) => i64::try_from(*n).ok(),
            Value::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnmpError {
    /// Timed out or could not reach the agent
    #[error("agent unreachable: {0}")]
    Unreachable(String),

    /// SNMPv1 noSuchName error status
    #[error("no such name")]
    NoSuchName,

    #[error("SNMP protocol error: {0}")]
    Protocol(String),
}

/// Where and how to send a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub address: Ipv4Addr,
    pub version: SnmpVersion,
    /// Extra attempts after a timeout
    pub retries: u32,
}

/// Blocking SNMP operations used by discovery and polling.
pub trait SnmpClient: Send + Sync {
    fn get(&self, target: &Target, oid: &[u64]) -> Result<Value, SnmpError>;

    /// GETNEXT: the first OID after `oid` and its value
    fn get_next(&self, target: &Target, oid: &[u64]) -> Result<(Vec<u64>, Value), SnmpError>;

    /// Every row below `subtree`, in OID order
    fn walk(&self, target: &Target, subtree: &[u64]) -> Result<Vec<(Vec<u64>, Value)>, SnmpError> {
        let mut rows = Vec::new();
        let mut cursor = subtree.to_vec();

        loop {
            let (oid, value) = match self.get_next(target, &cursor) {
                Ok(next) => next,
                // v1 agents answer the end of the MIB with noSuchName
                Err(SnmpError::NoSuchName) => break,
                Err(e) => return Err(e),
            };

            if value == Value::Missing || !oid.starts_with(subtree) {
                break;
            }
            if oid <= cursor {
                return Err(SnmpError::Protocol(format!(
                    "walk of {} did not advance past {}",
                    Dotted(subtree),
                    Dotted(&oid)
                )));
            }
            if rows.len() == MAX_WALK_ROWS {
                return Err(SnmpError::Protocol(format!(
                    "walk of {} exceeded {} rows",
                    Dotted(subtree),
                    MAX_WALK_ROWS
                )));
            }

            cursor = oid.clone();
            rows.push((oid, value));
        }

        Ok(rows)
    }
}

/// `table` with `index` appended
pub fn child(table: &[u64], index: u64) -> Vec<u64> {
    let mut oid = Vec::with_capacity(table.len() + 1);
    oid.extend_from_slice(table);
    oid.push(index);
    oid
}

/// Dotted-decimal formatting for log lines
pub struct Dotted<'a>(pub &'a [u64]);

impl fmt::Display for Dotted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in self.0 {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}
