#![allow(dead_code)]

use relay_server::http::{AppState, build_router};
use shared::config::{SamplingParams, UpstreamConfig};
use shared::llm::UpstreamClient;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TEST_API_KEY: &str = "sk-or-integration-key";
pub const TEST_DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528-qwen3-8b:free";

pub fn upstream_config(upstream_url: &str) -> UpstreamConfig {
    UpstreamConfig {
        chat_completions_url: upstream_url.to_string(),
        api_key: TEST_API_KEY.to_string(),
        default_model: TEST_DEFAULT_MODEL.to_string(),
        http_referer: "http://localhost:3000".to_string(),
        app_title: "Advanced Chatbot App".to_string(),
        sampling: SamplingParams::default(),
    }
}

pub fn build_test_router(upstream_url: &str) -> axum::Router {
    let upstream =
        UpstreamClient::new(upstream_config(upstream_url)).expect("upstream client should build");
    build_router(AppState::new(upstream))
}

/// Serves the relay on a loopback port; returns its `/api/chat` url.
pub async fn spawn_relay(
    upstream_url: &str,
) -> (String, oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_test_router(upstream_url);
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
            .expect("relay should run");
    });

    (
        format!("http://{local_addr}/api/chat"),
        shutdown_tx,
        server_task,
    )
}
