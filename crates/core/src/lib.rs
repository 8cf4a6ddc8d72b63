//! `warden-core`: identifiers and error types shared by every crate.
//!
//! No IO, no async, no HTTP.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::SubjectId;
