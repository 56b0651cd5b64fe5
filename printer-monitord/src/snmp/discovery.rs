use std::net::Ipv4Addr;
use shared::types::SnmpVersion;
use crate::snmp::client::{SnmpClient, SnmpError, Target, Value};
use crate::snmp::text::decode_text;

/// SNMPv2-MIB sysDescr.0, answered by every agent
pub const SYS_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];

/// HOST-RESOURCES-MIB hrDeviceDescr.1, the printer model on print devices
pub const DEVICE_DESCR: &[u64] = &[1, 3, 6, 1, 2, 1, 25, 3, 2, 1, 3, 1];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionProbe {
    Found(SnmpVersion),
    /// No version got an answer: wrong address or printer off
    Unreachable,
    /// Something answered, but not with anything usable
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelProbe {
    Found(String),
    /// The firmware does not expose a model string
    Unsupported,
    Unexpected(String),
}

/// Find the newest SNMP version the agent at `address` answers.
pub fn determine_version(client: &dyn SnmpClient, address: Ipv4Addr, retries: u32) -> VersionProbe {
    let mut unexpected: Option<String> = None;

    for version in SnmpVersion::PROBE_ORDER {
        let target = Target { address, version, retries };
        match client.get(&target, SYS_DESCR) {
            Ok(_) | Err(SnmpError::NoSuchName) => {
                tracing::debug!("{} answers SNMP v{}", address, version);
                return VersionProbe::Found(version);
            }
            Err(SnmpError::Unreachable(reason)) => {
                tracing::debug!("{} no answer on v{}: {}", address, version, reason);
            }
            Err(e) => {
                tracing::debug!("{} v{} failed: {}", address, version, e);
                unexpected.get_or_insert_with(|| format!("v{}: {}", version, e));
            }
        }
    }

    match unexpected {
        Some(detail) => VersionProbe::Unexpected(detail),
        None => VersionProbe::Unreachable,
    }
}

/// Read the model string with a version known to work.
pub fn determine_model(client: &dyn SnmpClient, target: &Target) -> ModelProbe {
    match client.get(target, DEVICE_DESCR) {
        Ok(Value::Text(raw)) => {
            let model = decode_text(&raw);
            if model.is_empty() {
                ModelProbe::Unsupported
            } else {
                ModelProbe::Found(model)
            }
        }
        Ok(Value::Missing) | Err(SnmpError::NoSuchName) => ModelProbe::Unsupported,
        Ok(other) => ModelProbe::Unexpected(format!("model is not a string: {:?}", other)),
        Err(e) => ModelProbe::Unexpected(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::fake::FakeDevice;

    const ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    fn target(version: SnmpVersion) -> Target {
        Target { address: ADDRESS, version, retries: 0 }
    }

    #[test]
    fn test_prefers_newest_version() {
        let device = FakeDevice::printer("HP LaserJet", &[SnmpVersion::V1, SnmpVersion::V2c, SnmpVersion::V3]);
        assert_eq!(determine_version(&device, ADDRESS, 0), VersionProbe::Found(SnmpVersion::V3));
    }

    #[test]
    fn test_falls_back_to_older_versions() {
        let v2 = FakeDevice::printer("HP LaserJet", &[SnmpVersion::V2c, SnmpVersion::V1]);
        assert_eq!(determine_version(&v2, ADDRESS, 0), VersionProbe::Found(SnmpVersion::V2c));

        let v1 = FakeDevice::printer("Old Laser", &[SnmpVersion::V1]);
        assert_eq!(determine_version(&v1, ADDRESS, 0), VersionProbe::Found(SnmpVersion::V1));
    }

    #[test]
    fn test_version_is_stable_across_calls() {
        let device = FakeDevice::printer("HP LaserJet", &[SnmpVersion::V2c]);
        let first = determine_version(&device, ADDRESS, 0);
        let second = determine_version(&device, ADDRESS, 0);
        assert_eq!(first, second);
        match first {
            VersionProbe::Found(version) => assert!((1..=3).contains(&version.number())),
            other => panic!("expected a version, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_when_every_version_times_out() {
        let device = FakeDevice::off();
        assert_eq!(determine_version(&device, ADDRESS, 0), VersionProbe::Unreachable);
        assert_eq!(device.requests(), 3);
    }

    #[test]
    fn test_unexpected_on_protocol_errors() {
        let device = FakeDevice::broken("community mismatch");
        assert!(matches!(determine_version(&device, ADDRESS, 0), VersionProbe::Unexpected(_)));
    }

    #[test]
    fn test_model_found() {
        let device = FakeDevice::printer("HP LaserJet M402dn\0", &[SnmpVersion::V2c]);
        assert_eq!(
            determine_model(&device, &target(SnmpVersion::V2c)),
            ModelProbe::Found("HP LaserJet M402dn".to_string())
        );
    }

    #[test]
    fn test_model_unsupported_on_not_found_marker() {
        let device = FakeDevice::new().with(SYS_DESCR, Value::Text(b"agent".to_vec()));
        assert_eq!(determine_model(&device, &target(SnmpVersion::V2c)), ModelProbe::Unsupported);

        let v1 = FakeDevice::new().with_no_such_name(DEVICE_DESCR);
        assert_eq!(determine_model(&v1, &target(SnmpVersion::V1)), ModelProbe::Unsupported);
    }

    #[test]
    fn test_model_unexpected_when_device_drops_off() {
        let device = FakeDevice::off();
        assert!(matches!(
            determine_model(&device, &target(SnmpVersion::V2c)),
            ModelProbe::Unexpected(_)
        ));
    }
}
