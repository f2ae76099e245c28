pub mod credentials;
pub mod items;

pub use credentials::{CredentialStore, Identity, Role};
pub use items::{ItemStore, VaultItem};
