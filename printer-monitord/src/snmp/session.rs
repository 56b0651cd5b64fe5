use std::net::SocketAddr;
use std::time::Duration;
use snmp2::{v3, Oid, SyncSession};
use shared::types::SnmpVersion;
use crate::config::SnmpConfig;
use crate::snmp::client::{Dotted, SnmpClient, SnmpError, Target, Value};

/// Error status an SNMPv1 agent returns for an unknown OID
const NO_SUCH_NAME: u32 = 2;

/// [`SnmpClient`] over UDP, one session per request.
pub struct UdpSnmpClient {
    community: String,
    v3_user: String,
    port: u16,
    timeout: Duration,
}

impl UdpSnmpClient {
    pub fn new(config: &SnmpConfig) -> Self {
        Self {
            community: config.community.clone(),
            v3_user: config.v3_user.clone(),
            port: config.port,
            timeout: config.timeout(),
        }
    }

    fn open(&self, target: &Target) -> Result<SyncSession, SnmpError> {
        let addr = SocketAddr::from((target.address, self.port));
        let timeout = Some(self.timeout);
        let community = self.community.as_bytes();

        match target.version {
            SnmpVersion::V1 => SyncSession::new_v1(addr, community, timeout, 0)
                .map_err(|e| SnmpError::Unreachable(e.to_string())),
            SnmpVersion::V2c => SyncSession::new_v2c(addr, community, timeout, 0)
                .map_err(|e| SnmpError::Unreachable(e.to_string())),
            SnmpVersion::V3 => {
                let security = v3::Security::new(self.v3_user.as_bytes(), b"")
                    .with_auth(v3::Auth::NoAuthNoPriv);
                let mut session = SyncSession::new_v3(addr, timeout, 0, security)
                    .map_err(|e| SnmpError::Unreachable(e.to_string()))?;
                session.init().map_err(convert_error)?;
                Ok(session)
            }
        }
    }

    /// Run `op` on a fresh session, retrying timeouts up to `target.retries` times
    fn with_retries<T>(
        &self,
        target: &Target,
        mut op: impl FnMut(&mut SyncSession) -> Result<T, SnmpError>,
    ) -> Result<T, SnmpError> {
        let mut attempt = 0;
        loop {
            let result = self.open(target).and_then(|mut session| op(&mut session));
            match result {
                Err(SnmpError::Unreachable(reason)) if attempt < target.retries => {
                    attempt += 1;
                    tracing::debug!(
                        "{} v{}: {}, retry {}/{}",
                        target.address,
                        target.version,
                        reason,
                        attempt,
                        target.retries
                    );
                }
                other => return other,
            }
        }
    }
}

impl SnmpClient for UdpSnmpClient {
    fn get(&self, target: &Target, oid: &[u64]) -> Result<Value, SnmpError> {
        let request = to_oid(oid)?;
        self.with_retries(target, |session| {
            // v3 sessions re-send once after the engine boots/time are learned
            for _ in 0..2 {
                match session.get(&request) {
                    Ok(pdu) => {
                        check_status(pdu.error_status)?;
                        let mut varbinds = pdu.varbinds;
                        return match varbinds.next() {
                            Some((_, value)) => Ok(to_value(value)),
                            None => Err(SnmpError::Protocol("empty response".to_string())),
                        };
                    }
                    Err(snmp2::Error::AuthUpdated) => continue,
                    Err(e) => return Err(convert_error(e)),
                }
            }
            Err(SnmpError::Protocol(format!("GET {} not answered after auth update", Dotted(oid))))
        })
    }

    fn get_next(&self, target: &Target, oid: &[u64]) -> Result<(Vec<u64>, Value), SnmpError> {
        let request = to_oid(oid)?;
        self.with_retries(target, |session| {
            for _ in 0..2 {
                match session.getnext(&request) {
                    Ok(pdu) => {
                        check_status(pdu.error_status)?;
                        let mut varbinds = pdu.varbinds;
                        return match varbinds.next() {
                            Some((next, value)) => Ok((from_oid(&next)?, to_value(value))),
                            None => Err(SnmpError::Protocol("empty response".to_string())),
                        };
                    }
                    Err(snmp2::Error::AuthUpdated) => continue,
                    Err(e) => return Err(convert_error(e)),
                }
            }
            Err(SnmpError::Protocol(format!("GETNEXT {} not answered after auth update", Dotted(oid))))
        })
    }
}

fn check_status(error_status: u32) -> Result<(), SnmpError> {
    match error_status {
        0 => Ok(()),
        NO_SUCH_NAME => Err(SnmpError::NoSuchName),
        other => Err(SnmpError::Protocol(format!("error status {}", other))),
    }
}

fn convert_error(err: snmp2::Error) -> SnmpError {
    match err {
        snmp2::Error::Send | snmp2::Error::Receive => SnmpError::Unreachable(err.to_string()),
        other => SnmpError::Protocol(other.to_string()),
    }
}

fn to_oid(arcs: &[u64]) -> Result<Oid<'static>, SnmpError> {
    Oid::from(arcs).map_err(|e| SnmpError::Protocol(format!("invalid OID {}: {:?}", Dotted(arcs), e)))
}

fn from_oid(oid: &Oid<'_>) -> Result<Vec<u64>, SnmpError> {
    oid.iter()
        .map(|arcs| arcs.collect())
        .ok_or_else(|| SnmpError::Protocol(format!("OID {} has arcs wider than 64 bits", oid)))
}

fn to_value(raw: snmp2::Value<'_>) -> Value {
    match raw {
        snmp2::Value::Integer(n) => Value::Integer(n),
        snmp2::Value::OctetString(bytes) => Value::Text(bytes.to_vec()),
        snmp2::Value::ObjectIdentifier(oid) => match from_oid(&oid) {
            Ok(arcs) => Value::ObjectId(arcs),
            Err(e) => Value::Other(e.to_string()),
        },
        snmp2::Value::Counter32(n) | snmp2::Value::Unsigned32(n) | snmp2::Value::Timeticks(n) => {
            Value::Unsigned(u64::from(n))
        }
        snmp2::Value::Counter64(n) => Value::Unsigned(n),
        snmp2::Value::Null
        | snmp2::Value::NoSuchObject
        | snmp2::Value::NoSuchInstance
        | snmp2::Value::EndOfMibView => Value::Missing,
        other => Value::Other(format!("{:?}", other)),
    }
}
