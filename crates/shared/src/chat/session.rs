use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use thiserror::Error;
use tracing::{debug, info};

use super::assembler::{LineFraming, assemble};
use super::store::{ChatError, ChatStore, ExchangeOutcome, Notification, PendingExchange};
use crate::models::ChatCompletionRequest;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ByteStream, TransportError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("relay request could not be sent: {0}")]
    Request(String),
    #[error("relay returned status {0}")]
    Status(u16),
    #[error("relay stream broke off: {0}")]
    Stream(String),
}

/// Opens a streaming chat completion and hands back its raw body.
pub trait ChatTransport: Send + Sync {
    fn open_stream<'a>(&'a self, request: ChatCompletionRequest) -> TransportFuture<'a>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReport {
    pub conversation_id: String,
    pub notification: Option<Notification>,
}

/// Wires a chat store to a transport: each send or regenerate admits an
/// exchange in the store, streams the reply and records the outcome.
pub struct ChatSession<T> {
    store: ChatStore,
    transport: T,
    framing: LineFraming,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(store: ChatStore, transport: T, framing: LineFraming) -> Self {
        Self {
            store,
            transport,
            framing,
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChatStore {
        &mut self.store
    }

    pub fn framing(&self) -> LineFraming {
        self.framing
    }

    pub async fn send<F>(&mut self, input: &str, on_update: F) -> Result<ExchangeReport, ChatError>
    where
        F: FnMut(&str),
    {
        let pending = self.store.begin_send(input)?;
        Ok(self.run_exchange(pending, on_update).await)
    }

    pub async fn regenerate<F>(&mut self, on_update: F) -> Result<ExchangeReport, ChatError>
    where
        F: FnMut(&str),
    {
        let pending = self.store.begin_regenerate()?;
        Ok(self.run_exchange(pending, on_update).await)
    }

    async fn run_exchange<F>(&mut self, pending: PendingExchange, mut on_update: F) -> ExchangeReport
    where
        F: FnMut(&str),
    {
        let Self {
            store,
            transport,
            framing,
        } = self;

        let request =
            ChatCompletionRequest::streaming(pending.messages.clone(), pending.model.clone());
        debug!(
            kind = ?pending.kind,
            model = %pending.model,
            message_count = pending.messages.len(),
            "opening chat stream"
        );

        let outcome = match transport.open_stream(request).await {
            Ok(stream) => {
                let assembled = assemble(stream, *framing, |transcript: &str| {
                    store.update_preview(transcript);
                    on_update(transcript);
                })
                .await;
                match assembled {
                    Ok(assembled) => {
                        info!(
                            fragments = assembled.fragments,
                            fallback_used = assembled.fallback_used,
                            "chat stream finished"
                        );
                        ExchangeOutcome::Completed {
                            content: assembled.content,
                        }
                    }
                    Err(err) => ExchangeOutcome::Failed {
                        reason: err.to_string(),
                    },
                }
            }
            Err(err) => ExchangeOutcome::Failed {
                reason: err.to_string(),
            },
        };

        let notification = store.complete(&pending, outcome);
        ExchangeReport {
            conversation_id: pending.conversation_id,
            notification,
        }
    }
}
