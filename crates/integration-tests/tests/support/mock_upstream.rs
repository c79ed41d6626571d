#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::stream;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

pub const UPSTREAM_PATH: &str = "/api/v1/chat/completions";

#[derive(Debug, Clone)]
pub enum MockReply {
    Json { status: StatusCode, body: Value },
    Stream { chunks: Vec<&'static str> },
}

impl MockReply {
    pub fn ok_json(body: Value) -> Self {
        Self::Json {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::Json {
            status,
            body: json!({ "error": { "message": message } }),
        }
    }

    pub fn event_stream(chunks: Vec<&'static str>) -> Self {
        Self::Stream { chunks }
    }
}

#[derive(Debug, Clone)]
struct MockState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_bodies: Arc<Mutex<Vec<Value>>>,
    seen_headers: Arc<Mutex<Vec<HeaderMap>>>,
}

/// A provider stand-in on a loopback port that replays scripted replies.
pub struct MockUpstream {
    pub url: String,
    state: MockState,
    shutdown_tx: oneshot::Sender<()>,
    server_task: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_bodies: Arc::new(Mutex::new(Vec::new())),
            seen_headers: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route(UPSTREAM_PATH, post(mock_chat_completions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let local_addr = listener
            .local_addr()
            .expect("listener address should resolve");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("mock upstream should run");
        });

        Self {
            url: format!("http://{local_addr}{UPSTREAM_PATH}"),
            state,
            shutdown_tx,
            server_task,
        }
    }

    pub async fn seen_bodies(&self) -> Vec<Value> {
        self.state.seen_bodies.lock().await.clone()
    }

    pub async fn seen_headers(&self) -> Vec<HeaderMap> {
        self.state.seen_headers.lock().await.clone()
    }

    pub async fn shutdown(self) {
        self.shutdown_tx
            .send(())
            .expect("shutdown signal should send");
        self.server_task.await.expect("server task should join");
    }
}

/// Concatenation of the chunks a streaming reply sends.
pub fn joined(chunks: &[&str]) -> String {
    chunks.concat()
}

async fn mock_chat_completions(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    state.seen_bodies.lock().await.push(payload);
    state.seen_headers.lock().await.push(headers);

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "exhausted_test_replies",
    ));

    match reply {
        MockReply::Json { status, body } => (status, Json(body)).into_response(),
        MockReply::Stream { chunks } => {
            let body = Body::from_stream(stream::iter(
                chunks.into_iter().map(Ok::<_, Infallible>),
            ));
            let mut response = Response::new(body);
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            );
            response
        }
    }
}
