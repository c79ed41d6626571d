mod cli;
mod commands;
mod repl;

use cli::{CliError, CliOptions};
use shared::chat::{ChatSession, ChatStore, RelayTransport};
use shared::config::load_dotenv;
use tracing::debug;

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    let config = match options.resolve() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to read config: {err}");
            std::process::exit(2);
        }
    };

    let transport = match RelayTransport::new(config.relay_url.clone()) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("invalid relay url: {err}");
            std::process::exit(2);
        }
    };
    debug!(relay_url = %config.relay_url, framing = %config.framing, "chat client starting");

    let session = ChatSession::new(ChatStore::new(config.model), transport, config.framing);
    if let Err(err) = repl::run(session, &config.export_dir).await {
        eprintln!("terminal i/o failed: {err}");
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!(
        "Usage: cargo run -p chat-cli -- [--relay-url URL] [--model ID] \
         [--framing buffered|per-chunk] [--export-dir DIR]\n\
         \n\
         Options:\n\
         - --relay-url   Relay chat endpoint (default: CHAT_RELAY_URL or http://127.0.0.1:8080/api/chat)\n\
         - --model       Model id to start with (default: CHAT_MODEL or the first catalog model)\n\
         - --framing     How streamed chunks are split into lines (default: buffered)\n\
         - --export-dir  Where /export writes files (default: CHAT_EXPORT_DIR or .)\n\
         - --help        Show this help text"
    );
}
