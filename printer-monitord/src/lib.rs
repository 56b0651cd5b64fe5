pub mod add_printer;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod refresh;
pub mod schedule;
pub mod simulate;
pub mod snmp;
pub mod store;
pub mod store_manager;
