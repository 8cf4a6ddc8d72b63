use axum::extract::State;

use crate::app::AppState;
use crate::app::dto::ReloadResponse;
use crate::app::errors::ApiError;
use crate::app::response::{ApiResult, ok};

/// Re-read the rule source. The previous rules stay active on failure.
pub async fn reload(State(state): State<AppState>) -> ApiResult<ReloadResponse> {
    let rules = state.enforcer.reload().await.map_err(|err| {
        tracing::error!(error = %err, "policy reload failed");
        ApiError::Internal
    })?;

    ok(ReloadResponse { rules })
}
