use std::panic::AssertUnwindSafe;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use futures::FutureExt;

use warden_observability::panic_message;

use crate::app::errors::json_error;

/// Turns a panic anywhere downstream into a 500 envelope.
///
/// The panic hook installed at startup has already logged the location and
/// backtrace by the time the unwind reaches this point.
pub async fn recover(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            tracing::error!(
                method = %method,
                path = %path,
                panic = %panic_message(payload.as_ref()),
                "panic recovered"
            );
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}
