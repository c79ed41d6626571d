use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, UpstreamConfig};
use crate::models::{ChatCompletionRequest, WireMessage};

const HTTP_REFERER_HEADER: &str = "http-referer";
const X_TITLE_HEADER: &str = "x-title";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request could not be sent: {0}")]
    Transport(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("upstream returned an invalid body: {0}")]
    InvalidBody(String),
}

/// Result of one forwarded request.
#[derive(Debug)]
pub enum UpstreamReply {
    /// Parsed JSON body of a non-streaming call, untouched.
    Json(Value),
    /// Successful streaming response whose body has not been read yet.
    Stream(reqwest::Response),
}

#[derive(Debug, Serialize)]
struct UpstreamRequestBody<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

/// Forwards chat requests to the provider with the configured credential.
/// One attempt per call; no retry and no timeout.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(HTTP_REFERER_HEADER),
            header_value("RELAY_HTTP_REFERER", &config.http_referer)?,
        );
        headers.insert(
            HeaderName::from_static(X_TITLE_HEADER),
            header_value("RELAY_APP_TITLE", &config.app_title)?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| {
                ConfigError::InvalidConfiguration(format!(
                    "failed to build upstream http client: {err}"
                ))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(self.config.default_model.as_str())
    }

    pub async fn forward(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<UpstreamReply, UpstreamError> {
        let stream = request.wants_stream();
        let body = UpstreamRequestBody {
            model: self.resolve_model(request.model.as_deref()),
            messages: &request.messages,
            stream,
            temperature: self.config.sampling.temperature,
            max_tokens: self.config.sampling.max_tokens,
            top_p: self.config.sampling.top_p,
        };

        debug!(
            model = body.model,
            stream,
            message_count = request.messages.len(),
            "forwarding chat request upstream"
        );

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!("upstream request failed before a response: {err}");
                UpstreamError::Transport(err.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "upstream rejected chat request");
            return Err(UpstreamError::Status(status.as_u16()));
        }

        if stream {
            return Ok(UpstreamReply::Stream(response));
        }

        let value = response.json::<Value>().await.map_err(|err| {
            warn!("upstream body was not valid json: {err}");
            UpstreamError::InvalidBody(err.without_url().to_string())
        })?;

        Ok(UpstreamReply::Json(value))
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|_| {
        ConfigError::InvalidConfiguration(format!("{key} is not a valid header value"))
    })
}
