pub mod client;
pub mod discovery;
pub mod session;
pub mod supplies;
pub mod text;

#[cfg(test)]
pub(crate) mod fake;
