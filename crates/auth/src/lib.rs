//! `warden-auth`: authentication boundary.
//!
//! Identity claims, the bearer token codec, password hashing and the
//! credential verifier used by the login path. This crate is decoupled from
//! HTTP and from any concrete storage.

pub mod claims;
pub mod credentials;
pub mod password;
pub mod roles;
pub mod token;

pub use claims::{ClaimsError, IdentityClaims, validate_claims};
pub use credentials::{
    CredentialError, CredentialRecord, CredentialStore, CredentialVerifier, Identity, StoreError,
};
pub use password::{Argon2PasswordHasher, HashCost, PasswordHashError, PasswordHasher};
pub use roles::Role;
pub use token::{
    BEARER_PREFIX, InvalidToken, IssuedToken, SharedTokenCodec, TokenCodec, TokenError,
    TokenVerifier,
};
