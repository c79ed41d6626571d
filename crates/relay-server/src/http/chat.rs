use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use shared::llm::UpstreamReply;
use shared::models::ChatCompletionRequest;
use tracing::{debug, warn};

use super::AppState;
use super::errors::{bad_request_response, upstream_failure_response};

pub(super) async fn relay_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("rejected chat request body: {rejection}");
            return bad_request_response(
                "invalid_request",
                "Request body must be JSON with a messages array",
            );
        }
    };

    match state.upstream.forward(&request).await {
        Ok(UpstreamReply::Json(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(UpstreamReply::Stream(upstream)) => {
            debug!("piping upstream event stream");
            event_stream_response(upstream)
        }
        Err(err) => {
            warn!("chat relay failed: {err}");
            upstream_failure_response()
        }
    }
}

/// Passes the upstream body through chunk by chunk without inspecting it.
fn event_stream_response(upstream: reqwest::Response) -> Response {
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
