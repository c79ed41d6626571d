use std::net::SocketAddr;

use relay_server::http::{AppState, build_router};
use shared::config::{RelayConfig, load_dotenv};
use shared::llm::UpstreamClient;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "relay_server=debug,shared=info,tower_http=info,axum=info".to_string()
        }))
        .init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(
                "RELAY_BIND_ADDR '{}' is not a socket address: {err}",
                config.bind_addr
            );
            std::process::exit(1);
        }
    };

    info!(
        upstream = %config.upstream.chat_completions_url,
        default_model = %config.upstream.default_model,
        "relay configured"
    );

    let upstream = match UpstreamClient::new(config.upstream) {
        Ok(upstream) => upstream,
        Err(err) => {
            error!("failed to build upstream client: {err}");
            std::process::exit(1);
        }
    };

    let app = build_router(AppState::new(upstream));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "relay server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("relay server stopped: {err}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutdown signal received");
}
