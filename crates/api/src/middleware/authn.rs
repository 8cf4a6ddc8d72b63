use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use warden_auth::BEARER_PREFIX;

use crate::app::AppState;
use crate::app::errors::ApiError;
use crate::context::SecurityContext;

/// Verifies `Authorization: Bearer <token>` and stores the caller's
/// [`SecurityContext`] in the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.verifier.verify(token, Utc::now()).map_err(|_| {
        tracing::warn!(path = %req.uri().path(), "invalid token");
        ApiError::Unauthorized("invalid token")
    })?;

    tracing::debug!(sub = %claims.sub, role = %claims.role, "authenticated");
    req.extensions_mut().insert(SecurityContext::from(claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            tracing::warn!("missing authorization header");
            ApiError::Unauthorized("unauthorized")
        })?;

    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .ok_or_else(|| {
            tracing::warn!("invalid token format");
            ApiError::Unauthorized("invalid token format")
        })?;

    let token = token.trim();
    if token.is_empty() {
        tracing::warn!("empty bearer token");
        return Err(ApiError::Unauthorized("invalid token"));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(&HeaderMap::new()), Err(ApiError::Unauthorized("unauthorized")));
        assert_eq!(extract_bearer(&headers("")), Err(ApiError::Unauthorized("unauthorized")));
        assert_eq!(
            extract_bearer(&headers("Basic dXNlcjpwdw==")),
            Err(ApiError::Unauthorized("invalid token format"))
        );
        assert_eq!(
            extract_bearer(&headers("bearer abc")),
            Err(ApiError::Unauthorized("invalid token format"))
        );
        assert_eq!(extract_bearer(&headers("Bearer   ")), Err(ApiError::Unauthorized("invalid token")));
    }
}
