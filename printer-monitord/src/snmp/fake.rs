//! Scripted in-memory agent for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use shared::types::SnmpVersion;
use crate::snmp::client::{child, SnmpClient, SnmpError, Target, Value};
use crate::snmp::discovery::{DEVICE_DESCR, SYS_DESCR};
use crate::snmp::supplies::{
    COLORANT_VALUE, SUPPLY_COLORANT, SUPPLY_DESCRIPTION, SUPPLY_LEVEL, SUPPLY_MAX_CAPACITY,
};

pub struct FakeDevice {
    values: BTreeMap<Vec<u64>, Value>,
    no_such_name: BTreeSet<Vec<u64>>,
    versions: Vec<SnmpVersion>,
    /// Protocol error returned for every request
    broken: Option<String>,
    requests: AtomicUsize,
}

impl FakeDevice {
    /// Answers every version, holds nothing
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            no_such_name: BTreeSet::new(),
            versions: SnmpVersion::PROBE_ORDER.to_vec(),
            broken: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Times out on every version
    pub fn off() -> Self {
        Self::new().answering(&[])
    }

    /// Rejects every request with a protocol error
    pub fn broken(reason: &str) -> Self {
        let mut device = Self::new();
        device.broken = Some(reason.to_string());
        device
    }

    /// A printer with identity and model set, answering only `versions`
    pub fn printer(model: &str, versions: &[SnmpVersion]) -> Self {
        Self::new()
            .answering(versions)
            .with(SYS_DESCR, Value::Text(b"Printer agent".to_vec()))
            .with(DEVICE_DESCR, Value::Text(model.as_bytes().to_vec()))
    }

    pub fn answering(mut self, versions: &[SnmpVersion]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    pub fn with(mut self, oid: &[u64], value: Value) -> Self {
        self.values.insert(oid.to_vec(), value);
        self
    }

    pub fn with_no_such_name(mut self, oid: &[u64]) -> Self {
        self.no_such_name.insert(oid.to_vec());
        self
    }

    pub fn with_supply(self, index: u64, description: &str, colorant: i64, capacity: i64, level: i64) -> Self {
        self.with(&child(SUPPLY_DESCRIPTION, index), Value::Text(description.as_bytes().to_vec()))
            .with(&child(SUPPLY_COLORANT, index), Value::Integer(colorant))
            .with(&child(SUPPLY_MAX_CAPACITY, index), Value::Integer(capacity))
            .with(&child(SUPPLY_LEVEL, index), Value::Integer(level))
    }

    pub fn with_colorant(self, index: u64, name: &str) -> Self {
        self.with(&child(COLORANT_VALUE, index), Value::Text(name.as_bytes().to_vec()))
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn check(&self, target: &Target, oid: &[u64]) -> Result<(), SnmpError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.versions.contains(&target.version) {
            return Err(SnmpError::Unreachable("timeout".to_string()));
        }
        if let Some(reason) = &self.broken {
            return Err(SnmpError::Protocol(reason.clone()));
        }
        if self.no_such_name.contains(oid) {
            return Err(SnmpError::NoSuchName);
        }
        Ok(())
    }
}

impl SnmpClient for FakeDevice {
    fn get(&self, target: &Target, oid: &[u64]) -> Result<Value, SnmpError> {
        self.check(target, oid)?;
        Ok(self.values.get(oid).cloned().unwrap_or(Value::Missing))
    }

    fn get_next(&self, target: &Target, oid: &[u64]) -> Result<(Vec<u64>, Value), SnmpError> {
        self.check(target, oid)?;
        let next = self
            .values
            .range::<[u64], _>((Bound::Excluded(oid), Bound::Unbounded))
            .next();
        Ok(match next {
            Some((next_oid, value)) => (next_oid.clone(), value.clone()),
            None => (oid.to_vec(), Value::Missing),
        })
    }
}
