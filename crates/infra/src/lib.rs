//! Infrastructure adapters for the collaborator ports in `warden-auth` and
//! `warden-policy`.

pub mod credentials;
pub mod policy_file;

pub use credentials::{InMemoryCredentialStore, SeedError};
pub use policy_file::FilePolicySource;
