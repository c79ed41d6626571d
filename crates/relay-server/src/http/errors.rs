use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{ErrorBody, ErrorResponse};

pub(super) const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to process chat request";

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

/// Generic failure for anything that went wrong upstream. Never carries
/// upstream bytes.
pub(super) fn upstream_failure_response() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "upstream_failure",
        UPSTREAM_FAILURE_MESSAGE,
    )
}
