use crate::app::dto::HealthResponse;
use crate::app::response::{ApiResult, ok};

pub async fn health() -> ApiResult<HealthResponse> {
    ok(HealthResponse { status: "ok" })
}
