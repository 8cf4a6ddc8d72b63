use axum::Extension;
use axum::extract::State;

use warden_auth::CredentialError;

use crate::app::AppState;
use crate::app::dto::{LoginRequest, LoginResponse, MeResponse};
use crate::app::errors::ApiError;
use crate::app::extract::JsonBody;
use crate::app::response::{ApiResult, ok};
use crate::context::SecurityContext;

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        tracing::warn!("login with empty username or password");
        return Err(ApiError::BadRequest("invalid request parameters"));
    }

    let identity = state
        .credentials
        .authenticate(username, &req.password)
        .await
        .map_err(|err| match err {
            CredentialError::NotFound | CredentialError::InvalidCredential => {
                tracing::warn!(username, "login failed");
                ApiError::Unauthorized("invalid username or password")
            }
            other => {
                tracing::error!(error = %other, username, "credential verification failed");
                ApiError::Internal
            }
        })?;

    let issued = state
        .tokens
        .issue(identity.subject_id, &identity.subject_name, &identity.role)
        .map_err(|err| {
            tracing::error!(error = %err, "token issuance failed");
            ApiError::Internal
        })?;

    tracing::info!(
        subject_id = %identity.subject_id,
        username = %identity.subject_name,
        role = %identity.role,
        "login succeeded"
    );

    ok(LoginResponse {
        token: issued.token,
        username: identity.subject_name,
        role: identity.role,
        expires_at: issued.claims.expires_at,
    })
}

pub async fn me(Extension(ctx): Extension<SecurityContext>) -> ApiResult<MeResponse> {
    ok(MeResponse::from(&ctx))
}
