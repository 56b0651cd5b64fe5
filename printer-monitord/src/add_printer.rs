use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use anyhow::{Context, Result};
use serde::Deserialize;
use shared::types::{NewPrinter, Printer, SnmpVersion};
use crate::refresh::Poller;
use crate::snmp::client::{SnmpClient, Target};
use crate::snmp::discovery::{determine_model, determine_version, ModelProbe, VersionProbe};
use crate::store::db::is_constraint_violation;
use crate::store_manager::StoreHandle;

pub const NAME_MAX: usize = 75;
pub const LOCATION_MAX: usize = 50;
pub const DEPARTMENT_MAX: usize = 50;

/// The add-printer form as posted by the home page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddPrinterForm {
    #[serde(default)]
    pub printer_name: String,
    #[serde(default)]
    pub printer_location: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub department_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Location,
    Address,
    Department,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Name => write!(f, "Printer name must be 1 to {} characters.", NAME_MAX),
            Field::Location => write!(f, "Location must be at most {} characters.", LOCATION_MAX),
            Field::Address => write!(f, "Enter a valid IPv4 address."),
            Field::Department => write!(f, "Department name must be 1 to {} characters.", DEPARTMENT_MAX),
        }
    }
}

/// Why a printer was not added. The display text is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("ERROR: {0} Printer not added.")]
    Invalid(Field),
    #[error("ERROR: A printer with this name already exists. Printer not added.")]
    NameTaken,
    #[error("ERROR: A printer with this IP address already exists. Printer not added.")]
    AddressTaken,
    #[error("Printer not added. Make sure you have the correct IP address for the printer and the printer is on.")]
    Unreachable,
    #[error("UNEXPECTED ERROR: Could not add printer.")]
    Unexpected,
    #[error("ERROR: Could not add printer. The printer doesn't have usable SNMP data. Printer may be too old or firmware may need to be updated.")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Committed(Printer),
    Rejected(Rejection),
}

/// Form fields that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub location: String,
    pub address: Ipv4Addr,
    pub department: String,
}

impl AddPrinterForm {
    pub fn validate(&self) -> Result<Candidate, Rejection> {
        let name = self.printer_name.trim();
        let location = self.printer_location.trim();
        let department = self.department_name.trim();

        if name.is_empty() || name.chars().count() > NAME_MAX {
            return Err(Rejection::Invalid(Field::Name));
        }
        if location.chars().count() > LOCATION_MAX {
            return Err(Rejection::Invalid(Field::Location));
        }
        let address: Ipv4Addr = self
            .ip_address
            .trim()
            .parse()
            .map_err(|_| Rejection::Invalid(Field::Address))?;
        if department.is_empty() || department.chars().count() > DEPARTMENT_MAX {
            return Err(Rejection::Invalid(Field::Department));
        }

        Ok(Candidate {
            name: name.to_string(),
            location: location.to_string(),
            address,
            department: department.to_string(),
        })
    }
}

/// Discover version and model of the device at `address`.
pub fn probe(
    client: &dyn SnmpClient,
    address: Ipv4Addr,
    probe_retries: u32,
    retries: u32,
) -> Result<(SnmpVersion, String), Rejection> {
    let version = match determine_version(client, address, probe_retries) {
        VersionProbe::Found(version) => version,
        VersionProbe::Unreachable => return Err(Rejection::Unreachable),
        VersionProbe::Unexpected(detail) => {
            tracing::warn!("{}: version probe failed: {}", address, detail);
            return Err(Rejection::Unexpected);
        }
    };

    let target = Target { address, version, retries };
    match determine_model(client, &target) {
        ModelProbe::Found(model) => Ok((version, model)),
        ModelProbe::Unsupported => Err(Rejection::Unsupported),
        ModelProbe::Unexpected(detail) => {
            tracing::warn!("{}: model probe failed: {}", address, detail);
            Err(Rejection::Unexpected)
        }
    }
}

/// Validate, probe, register and take the first reading of a new printer.
///
/// Rejections come back as [`AddOutcome::Rejected`] and leave the store
/// untouched. `Err` is reserved for store failures.
pub async fn add_printer(store: &StoreHandle, poller: &Poller, form: &AddPrinterForm) -> Result<AddOutcome> {
    let candidate = match form.validate() {
        Ok(candidate) => candidate,
        Err(rejection) => return Ok(AddOutcome::Rejected(rejection)),
    };

    if let Some(rejection) = duplicate(store, &candidate).await? {
        return Ok(AddOutcome::Rejected(rejection));
    }

    let client = Arc::clone(poller.client());
    let (address, probe_retries, retries) = (candidate.address, poller.probe_retries(), poller.retries());
    let probed = tokio::task::spawn_blocking(move || probe(client.as_ref(), address, probe_retries, retries))
        .await
        .context("Probe task panicked")?;

    let (snmp_version, model) = match probed {
        Ok(found) => found,
        Err(rejection) => {
            tracing::info!("{} ({}) not added: {:?}", candidate.name, candidate.address, rejection);
            return Ok(AddOutcome::Rejected(rejection));
        }
    };

    let new_printer = NewPrinter {
        name: candidate.name.clone(),
        model,
        location: candidate.location.clone(),
        address: candidate.address,
        department: candidate.department.clone(),
        snmp_version,
    };

    let printer = match store.insert_printer(new_printer).await {
        Ok(printer) => printer,
        // Lost a race with another registration of the same printer
        Err(e) if is_constraint_violation(&e) => {
            let rejection = duplicate(store, &candidate).await?.unwrap_or(Rejection::NameTaken);
            return Ok(AddOutcome::Rejected(rejection));
        }
        Err(e) => return Err(e),
    };

    tracing::info!(
        "Added {} ({}), {} over SNMP v{}",
        printer.name,
        printer.address,
        printer.model,
        printer.snmp_version
    );

    if let Err(e) = poller.refresh_printer(store, &printer).await {
        tracing::warn!("First poll of {} failed: {:#}", printer.name, e);
    }

    Ok(AddOutcome::Committed(printer))
}

async fn duplicate(store: &StoreHandle, candidate: &Candidate) -> Result<Option<Rejection>> {
    if store.find_printer(candidate.name.clone()).await?.is_some() {
        return Ok(Some(Rejection::NameTaken));
    }
    if store.find_printer_by_address(candidate.address).await?.is_some() {
        return Ok(Some(Rejection::AddressTaken));
    }
    Ok(None)
}
