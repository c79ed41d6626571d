use futures_util::StreamExt;
use tracing::warn;

use super::session::{ByteStream, ChatTransport, TransportError, TransportFuture};
use crate::config::{ConfigError, validate_http_url};
use crate::models::ChatCompletionRequest;

/// Posts chat requests to a relay's `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct RelayTransport {
    client: reqwest::Client,
    relay_url: String,
}

impl RelayTransport {
    pub fn new(relay_url: impl Into<String>) -> Result<Self, ConfigError> {
        let relay_url = relay_url.into();
        validate_http_url("CHAT_RELAY_URL", &relay_url)?;

        let client = reqwest::Client::builder().build().map_err(|err| {
            ConfigError::InvalidConfiguration(format!("failed to build relay http client: {err}"))
        })?;

        Ok(Self { client, relay_url })
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }
}

impl ChatTransport for RelayTransport {
    fn open_stream<'a>(&'a self, request: ChatCompletionRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.relay_url)
                .json(&request)
                .send()
                .await
                .map_err(|err| TransportError::Request(err.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                warn!(status = status.as_u16(), "relay rejected chat request");
                return Err(TransportError::Status(status.as_u16()));
            }

            let chunks = response.bytes_stream().map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|err| TransportError::Stream(err.without_url().to_string()))
            });
            Ok(Box::pin(chunks) as ByteStream)
        })
    }
}
