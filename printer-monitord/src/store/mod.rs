pub mod compact;
pub mod db;
pub mod ingest;
