use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use warden_policy::normalize_path;

use crate::app::AppState;
use crate::app::errors::ApiError;
use crate::context::SecurityContext;

/// Asks the policy engine whether the caller's role may perform the request
/// method on the normalized request path. Fails closed on engine errors.
pub async fn authorize(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(role) = req
        .extensions()
        .get::<SecurityContext>()
        .map(|ctx| ctx.role())
        .filter(|role| !role.is_empty())
        .cloned()
    else {
        tracing::warn!(path = %req.uri().path(), "no role in security context");
        return Err(ApiError::Unauthorized("unauthorized"));
    };

    let resource = normalize_path(req.uri().path());
    let action = req.method().as_str().to_owned();

    match state.enforcer.enforce(role.as_str(), &resource, &action) {
        Ok(true) => {
            tracing::debug!(role = %role, resource = %resource, action = %action, "access granted");
            Ok(next.run(req).await)
        }
        Ok(false) => {
            tracing::warn!(role = %role, resource = %resource, action = %action, "access denied");
            Err(ApiError::Forbidden)
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                role = %role,
                resource = %resource,
                action = %action,
                "policy enforcement failed"
            );
            Err(ApiError::Enforcement)
        }
    }
}
