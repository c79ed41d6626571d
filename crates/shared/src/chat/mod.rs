pub mod assembler;
pub mod conversation;
pub mod export;
pub mod session;
pub mod store;
pub mod transport;

pub use assembler::{AssembledResponse, EMPTY_RESPONSE_FALLBACK, LineFraming, StreamAssembler};
pub use conversation::{Conversation, Turn};
pub use session::{ChatSession, ChatTransport, ExchangeReport, TransportError};
pub use store::{ChatError, ChatStore, Notification, Rating};
pub use transport::RelayTransport;
