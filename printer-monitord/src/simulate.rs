use std::net::Ipv4Addr;
use anyhow::{bail, Result};
use rand::Rng;
use shared::types::{Level, NewPrinter, ReadingRow, SnmpVersion};
use crate::store::ingest::{IngestPolicy, IngestReport};
use crate::store_manager::StoreHandle;

pub const DEMO_DEPARTMENT: &str = "Demo";
pub const DEMO_MODEL: &str = "Simulated Printer";

#[derive(Debug, Clone)]
pub struct SimulateRequest {
    pub name: String,
    pub address: Ipv4Addr,
    pub modules: u32,
}

/// Next synthetic level of a module that drains a little every cycle.
pub fn next_level<R: Rng>(previous: Option<u8>, rng: &mut R) -> u8 {
    match previous {
        None => rng.random_range(90..=100),
        // Cartridge swapped
        Some(0) => rng.random_range(80..=100),
        Some(level) => level.saturating_sub(rng.random_range(1..=5)),
    }
}

/// Write one synthetic reading per module, registering the printer first if needed.
pub async fn simulate<R: Rng>(
    store: &StoreHandle,
    request: &SimulateRequest,
    policy: IngestPolicy,
    rng: &mut R,
) -> Result<IngestReport> {
    if request.modules == 0 {
        bail!("At least one module is needed");
    }

    let printer = match store.find_printer(request.name.clone()).await? {
        Some(printer) if printer.address == request.address => printer,
        Some(printer) => bail!("Printer {} is registered at {}, not {}", printer.name, printer.address, request.address),
        None => {
            let printer = store
                .insert_printer(NewPrinter {
                    name: request.name.clone(),
                    model: DEMO_MODEL.to_string(),
                    location: String::new(),
                    address: request.address,
                    department: DEMO_DEPARTMENT.to_string(),
                    snmp_version: SnmpVersion::V2c,
                })
                .await?;
            tracing::info!("Registered simulated printer {} ({})", printer.name, printer.address);
            printer
        }
    };

    let previous = store.latest_levels(printer.id).await?;
    let rows: Vec<ReadingRow> = (1..=request.modules)
        .map(|i| {
            let module = format!("Module {}", i);
            let last = previous
                .iter()
                .find(|(name, _)| *name == module)
                .and_then(|(_, level)| level.percent());
            ReadingRow::new(&printer.name, module, Level::Percent(next_level(last, rng)))
        })
        .collect();

    store.ingest(rows, policy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::store::db::PrinterDb;

    fn request(modules: u32) -> SimulateRequest {
        SimulateRequest {
            name: "Demo Laser".to_string(),
            address: Ipv4Addr::new(192, 168, 1, 50),
            modules,
        }
    }

    fn policy() -> IngestPolicy {
        IngestPolicy { window: Duration::from_secs(3600), skip_unchanged: false }
    }

    #[test]
    fn test_decay_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut level = None;

        for _ in 0..500 {
            let next = next_level(level, &mut rng);
            match level {
                None => assert!((90..=100).contains(&next)),
                Some(0) => assert!((80..=100).contains(&next)),
                Some(prev) => {
                    assert!(next < prev);
                    assert!(prev - next <= 5);
                }
            }
            level = Some(next);
        }
    }

    #[tokio::test]
    async fn test_simulate_registers_and_decays() {
        let store = StoreHandle::spawn(PrinterDb::open(":memory:").unwrap());
        let mut rng = StdRng::seed_from_u64(42);

        let report = simulate(&store, &request(3), policy(), &mut rng).await.unwrap();
        assert_eq!(report.inserted, 3);

        let printer = store.find_printer("Demo Laser".to_string()).await.unwrap().unwrap();
        assert_eq!(printer.department, DEMO_DEPARTMENT);
        assert_eq!(printer.model, DEMO_MODEL);
        assert_eq!(printer.snmp_version, SnmpVersion::V2c);

        let first = store.latest_levels(printer.id).await.unwrap();
        let modules: Vec<_> = first.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(modules, ["Module 1", "Module 2", "Module 3"]);

        simulate(&store, &request(3), policy(), &mut rng).await.unwrap();
        let second = store.latest_levels(printer.id).await.unwrap();
        for ((_, before), (_, after)) in first.iter().zip(&second) {
            let (before, after) = (before.percent().unwrap(), after.percent().unwrap());
            assert!(after < before && before - after <= 5);
        }
        assert_eq!(store.list_printers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_simulate_rejects_address_mismatch() {
        let store = StoreHandle::spawn(PrinterDb::open(":memory:").unwrap());
        let mut rng = StdRng::seed_from_u64(1);
        simulate(&store, &request(1), policy(), &mut rng).await.unwrap();

        let mut moved = request(1);
        moved.address = Ipv4Addr::new(192, 168, 1, 51);
        assert!(simulate(&store, &moved, policy(), &mut rng).await.is_err());
        assert!(simulate(&store, &request(0), policy(), &mut rng).await.is_err());
    }
}
