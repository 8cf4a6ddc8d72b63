use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::SubjectId;

use crate::Role;

/// Identity claims carried inside a bearer token.
///
/// Timestamps travel as JWT NumericDates (whole seconds), so a claims value
/// built by the codec always survives an encode/decode cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject identifier.
    pub sub: SubjectId,

    /// Subject (user) name.
    pub name: String,

    /// Role granted to the subject.
    pub role: Role,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "nbf", with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (not_before is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of identity claims.
///
/// A token is valid on `[not_before, expires_at)`. Signature verification is
/// done by [`crate::TokenCodec`] before this is called.
pub fn validate_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.expires_at <= claims.issued_at {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now < claims.not_before {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims_at(issued: DateTime<Utc>, ttl: Duration) -> IdentityClaims {
        IdentityClaims {
            sub: SubjectId::new(),
            name: "alice".to_string(),
            role: Role::new("user"),
            issued_at: issued,
            not_before: issued,
            expires_at: issued + ttl,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_inside_window() {
        let claims = claims_at(t0(), Duration::hours(1));
        assert_eq!(validate_claims(&claims, t0()), Ok(()));
        assert_eq!(validate_claims(&claims, t0() + Duration::minutes(59)), Ok(()));
    }

    #[test]
    fn expiry_instant_is_exclusive() {
        let claims = claims_at(t0(), Duration::hours(1));
        assert_eq!(
            validate_claims(&claims, t0() + Duration::hours(1)),
            Err(ClaimsError::Expired)
        );
    }

    #[test]
    fn before_not_before_is_rejected() {
        let claims = claims_at(t0(), Duration::hours(1));
        assert_eq!(
            validate_claims(&claims, t0() - Duration::seconds(1)),
            Err(ClaimsError::NotYetValid)
        );
    }

    #[test]
    fn empty_window_is_rejected() {
        let claims = claims_at(t0(), Duration::zero());
        assert_eq!(validate_claims(&claims, t0()), Err(ClaimsError::InvalidTimeWindow));
    }

    #[test]
    fn wire_names_are_registered_jwt_claims() {
        let claims = claims_at(t0(), Duration::hours(1));
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["iat"], t0().timestamp());
        assert_eq!(json["nbf"], t0().timestamp());
        assert_eq!(json["exp"], (t0() + Duration::hours(1)).timestamp());
        assert_eq!(json["role"], "user");
        assert_eq!(json["name"], "alice");
    }
}
