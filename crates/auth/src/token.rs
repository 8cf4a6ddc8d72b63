//! Bearer token codec (HS256 JWT).
//!
//! Issuing signs [`IdentityClaims`] with a shared secret; verifying checks
//! the header algorithm against an allow-list of exactly one MAC algorithm,
//! recomputes the signature (constant-time compare inside `jsonwebtoken`)
//! and then validates the time window with [`validate_claims`].
//!
//! Every verification failure collapses into [`InvalidToken`]. The concrete
//! reason is only logged at debug level.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use warden_core::SubjectId;

use crate::{IdentityClaims, Role, validate_claims};

/// Scheme prefix of the `Authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

const ALGORITHM: Algorithm = Algorithm::HS256;
const MIN_RECOMMENDED_SECRET_LEN: usize = 32;

/// Generic verification failure. Deliberately carries no detail.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

/// Construction / signing failures. These are configuration problems and are
/// surfaced at startup (or on a config reload), never per request.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing secret must not be empty")]
    EmptySecret,

    #[error("token ttl must be positive and at most {max_days} days")]
    InvalidTtl { max_days: i64 },

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A freshly issued token together with the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: IdentityClaims,
}

/// Verification seam used by the HTTP layer.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, InvalidToken>;
}

/// Signs and verifies identity tokens with a symmetric secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub const MAX_TTL_DAYS: i64 = 366;

    pub fn default_ttl() -> Duration {
        Duration::hours(24)
    }

    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if ttl <= Duration::zero() || ttl > Duration::days(Self::MAX_TTL_DAYS) {
            return Err(TokenError::InvalidTtl {
                max_days: Self::MAX_TTL_DAYS,
            });
        }
        if secret.len() < MIN_RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                secret_len = secret.len(),
                "token signing secret is shorter than the recommended 32 bytes"
            );
        }

        // Time checks are done by `validate_claims` against an explicit `now`,
        // so only structure, algorithm and signature are left to jsonwebtoken.
        let mut validation = Validation::new(ALGORITHM);
        validation.algorithms = vec![ALGORITHM];
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid from now for the configured TTL.
    pub fn issue(
        &self,
        subject_id: SubjectId,
        subject_name: &str,
        role: &Role,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject_id, subject_name, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject_id: SubjectId,
        subject_name: &str,
        role: &Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let now = now.trunc_subsecs(0);
        let claims = IdentityClaims {
            sub: subject_id,
            name: subject_name.to_string(),
            role: role.clone(),
            issued_at: now,
            not_before: now,
            expires_at: now + self.ttl,
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)?;
        Ok(IssuedToken { token, claims })
    }

    /// Verify against the wall clock.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, InvalidToken> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, InvalidToken> {
        let data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!(reason = %e, "token rejected");
            InvalidToken
        })?;

        validate_claims(&data.claims, now).map_err(|e| {
            tracing::debug!(reason = %e, sub = %data.claims.sub, "token rejected");
            InvalidToken
        })?;

        Ok(data.claims)
    }
}

impl TokenVerifier for TokenCodec {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, InvalidToken> {
        self.verify_at(token, now)
    }
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

/// The process-wide active codec.
///
/// Configuration reloads swap in a new codec atomically; in-flight requests
/// keep using the codec they loaded.
#[derive(Debug)]
pub struct SharedTokenCodec {
    current: ArcSwap<TokenCodec>,
}

impl SharedTokenCodec {
    pub fn new(codec: TokenCodec) -> Self {
        Self {
            current: ArcSwap::from_pointee(codec),
        }
    }

    pub fn current(&self) -> Arc<TokenCodec> {
        self.current.load_full()
    }

    pub fn replace(&self, codec: TokenCodec) {
        self.current.store(Arc::new(codec));
    }

    pub fn issue(
        &self,
        subject_id: SubjectId,
        subject_name: &str,
        role: &Role,
    ) -> Result<IssuedToken, TokenError> {
        self.current.load().issue(subject_id, subject_name, role)
    }
}

impl TokenVerifier for SharedTokenCodec {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, InvalidToken> {
        self.current.load().verify_at(token, now)
    }
}
