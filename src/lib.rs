pub mod comms;
pub mod config;
pub mod error;
pub mod policy;
pub mod security;
pub mod store;
pub mod utils;

pub use error::VaultError;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
