use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use super::conversation::{Conversation, Turn, derive_title};
use crate::models::{Role, WireMessage};

pub const SEND_ERROR_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";
pub const REGENERATE_ERROR_REPLY: &str =
    "Sorry, I encountered an error while regenerating the response. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a request is already in flight")]
    RequestInFlight,
    #[error("no active conversation")]
    NoActiveConversation,
    #[error("unknown conversation {0}")]
    UnknownConversation(String),
    #[error("unknown turn {0}")]
    UnknownTurn(String),
    #[error("only assistant turns can be rated")]
    NotRateable,
    #[error("there is no assistant reply to regenerate")]
    NothingToRegenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Send,
    Regenerate,
}

impl ExchangeKind {
    fn error_reply(self) -> &'static str {
        match self {
            Self::Send => SEND_ERROR_REPLY,
            Self::Regenerate => REGENERATE_ERROR_REPLY,
        }
    }

    fn failure_notice(self) -> &'static str {
        match self {
            Self::Send => "Failed to get response",
            Self::Regenerate => "Failed to regenerate response",
        }
    }
}

/// A request that has been admitted by the store and is waiting for its reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExchange {
    pub conversation_id: String,
    pub kind: ExchangeKind,
    pub model: String,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed { content: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Up,
    Down,
}

/// Client-side chat state: every mutation goes through a method here.
#[derive(Debug)]
pub struct ChatStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    selected_model: String,
    in_flight: bool,
    streaming_preview: String,
    ratings: HashMap<String, Rating>,
}

impl ChatStore {
    /// Starts with one empty conversation, as a fresh client session does.
    pub fn new(selected_model: impl Into<String>) -> Self {
        let mut store = Self {
            conversations: Vec::new(),
            active_id: None,
            selected_model: selected_model.into(),
            in_flight: false,
            streaming_preview: String::new(),
            ratings: HashMap::new(),
        };
        store.new_conversation();
        store
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|conversation| conversation.id == id)
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.conversation(id))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn streaming_preview(&self) -> &str {
        &self.streaming_preview
    }

    pub fn rating(&self, turn_id: &str) -> Option<Rating> {
        self.ratings.get(turn_id).copied()
    }

    pub fn new_conversation(&mut self) -> String {
        let conversation = Conversation::new(Utc::now());
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        id
    }

    pub fn select(&mut self, id: &str) -> Result<(), ChatError> {
        if self.conversation(id).is_none() {
            return Err(ChatError::UnknownConversation(id.to_string()));
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<(), ChatError> {
        let index = self
            .conversations
            .iter()
            .position(|conversation| conversation.id == id)
            .ok_or_else(|| ChatError::UnknownConversation(id.to_string()))?;

        let removed = self.conversations.remove(index);
        for turn in &removed.turns {
            self.ratings.remove(&turn.id);
        }

        if self.active_id.as_deref() == Some(id) {
            self.active_id = self
                .conversations
                .first()
                .map(|conversation| conversation.id.clone());
            if self.active_id.is_none() {
                self.new_conversation();
            }
        }
        Ok(())
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> Result<(), ChatError> {
        if self.in_flight {
            return Err(ChatError::RequestInFlight);
        }
        self.selected_model = model.into();
        Ok(())
    }

    pub fn begin_send(&mut self, input: &str) -> Result<PendingExchange, ChatError> {
        self.begin_send_at(input, Utc::now())
    }

    fn begin_send_at(
        &mut self,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<PendingExchange, ChatError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.in_flight {
            return Err(ChatError::RequestInFlight);
        }

        let model = self.selected_model.clone();
        let conversation = self.active_mut()?;
        if conversation.is_empty() {
            conversation.title = derive_title(text);
        }
        conversation.turns.push(Turn::user(text, now));

        let pending = PendingExchange {
            conversation_id: conversation.id.clone(),
            kind: ExchangeKind::Send,
            model,
            messages: conversation.wire_history(),
        };
        self.start_exchange();
        Ok(pending)
    }

    pub fn begin_regenerate(&mut self) -> Result<PendingExchange, ChatError> {
        if self.in_flight {
            return Err(ChatError::RequestInFlight);
        }

        let model = self.selected_model.clone();
        let conversation = self.active_mut()?;
        let ends_with_reply = conversation
            .last_turn()
            .is_some_and(|turn| turn.role == Role::Assistant);
        let has_user_turn = conversation.turns.iter().any(|turn| turn.role == Role::User);
        if conversation.turns.len() < 2 || !ends_with_reply || !has_user_turn {
            return Err(ChatError::NothingToRegenerate);
        }

        let removed = conversation.turns.pop();
        let pending = PendingExchange {
            conversation_id: conversation.id.clone(),
            kind: ExchangeKind::Regenerate,
            model,
            messages: conversation.wire_history(),
        };
        if let Some(removed) = removed {
            self.ratings.remove(&removed.id);
        }
        self.start_exchange();
        Ok(pending)
    }

    pub fn update_preview(&mut self, transcript: &str) {
        self.streaming_preview.clear();
        self.streaming_preview.push_str(transcript);
    }

    /// Closes an exchange by appending exactly one assistant turn to the
    /// conversation that started it. Returns a notification on failure.
    pub fn complete(
        &mut self,
        pending: &PendingExchange,
        outcome: ExchangeOutcome,
    ) -> Option<Notification> {
        self.in_flight = false;
        self.streaming_preview.clear();
        let now = Utc::now();

        let (turn, notification) = match outcome {
            ExchangeOutcome::Completed { content } => (
                Turn::assistant(content, Some(pending.model.clone()), now),
                None,
            ),
            ExchangeOutcome::Failed { reason } => {
                warn!(kind = ?pending.kind, "chat exchange failed: {reason}");
                (
                    Turn::assistant(pending.kind.error_reply(), None, now),
                    Some(Notification {
                        title: "Error".to_string(),
                        description: pending.kind.failure_notice().to_string(),
                    }),
                )
            }
        };

        match self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == pending.conversation_id)
        {
            Some(conversation) => conversation.turns.push(turn),
            None => warn!(
                conversation_id = %pending.conversation_id,
                "conversation was deleted before its reply arrived"
            ),
        }

        notification
    }

    /// Toggles a rating on an assistant turn of the active conversation.
    pub fn rate(&mut self, turn_id: &str, rating: Rating) -> Result<Option<Rating>, ChatError> {
        let turn = self
            .active()
            .ok_or(ChatError::NoActiveConversation)?
            .find_turn(turn_id)
            .ok_or_else(|| ChatError::UnknownTurn(turn_id.to_string()))?;
        if turn.role != Role::Assistant {
            return Err(ChatError::NotRateable);
        }

        if self.ratings.get(turn_id) == Some(&rating) {
            self.ratings.remove(turn_id);
            return Ok(None);
        }
        self.ratings.insert(turn_id.to_string(), rating);
        Ok(Some(rating))
    }

    fn active_mut(&mut self) -> Result<&mut Conversation, ChatError> {
        let id = self
            .active_id
            .as_deref()
            .ok_or(ChatError::NoActiveConversation)?;
        self.conversations
            .iter_mut()
            .find(|conversation| conversation.id == id)
            .ok_or(ChatError::NoActiveConversation)
    }

    fn start_exchange(&mut self) {
        self.in_flight = true;
        self.streaming_preview.clear();
        debug!("chat exchange started");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        ChatError, ChatStore, ExchangeKind, ExchangeOutcome, REGENERATE_ERROR_REPLY, Rating,
        SEND_ERROR_REPLY,
    };
    use crate::chat::conversation::NEW_CONVERSATION_TITLE;
    use crate::models::Role;

    const MODEL: &str = "google/gemma-2-9b-it:free";

    fn completed(content: &str) -> ExchangeOutcome {
        ExchangeOutcome::Completed {
            content: content.to_string(),
        }
    }

    fn store_with_exchange() -> ChatStore {
        let mut store = ChatStore::new(MODEL);
        let pending = store.begin_send("What is Rust?").expect("send should start");
        store.complete(&pending, completed("A systems language."));
        store
    }

    #[test]
    fn starts_with_one_empty_active_conversation() {
        let store = ChatStore::new(MODEL);
        assert_eq!(store.conversations().len(), 1);
        let active = store.active().expect("active conversation");
        assert!(active.is_empty());
        assert_eq!(active.title, NEW_CONVERSATION_TITLE);
    }

    #[test]
    fn begin_send_appends_user_turn_and_sets_title() {
        let mut store = ChatStore::new(MODEL);
        let pending = store.begin_send("  hello there  ").expect("send should start");

        assert!(store.is_in_flight());
        assert_eq!(pending.kind, ExchangeKind::Send);
        assert_eq!(pending.model, MODEL);
        assert_eq!(pending.messages.len(), 1);
        assert_eq!(pending.messages[0].content, "hello there");

        let active = store.active().expect("active conversation");
        assert_eq!(active.title, "hello there");
        assert_eq!(active.turns[0].role, Role::User);
    }

    #[test]
    fn title_is_only_derived_from_first_message() {
        let mut store = store_with_exchange();
        let pending = store.begin_send("second question").expect("send should start");
        store.complete(&pending, completed("ok"));
        assert_eq!(store.active().map(|c| c.title.as_str()), Some("What is Rust?"));
    }

    #[test]
    fn rejects_blank_input_and_concurrent_requests() {
        let mut store = ChatStore::new(MODEL);
        assert_eq!(store.begin_send("   "), Err(ChatError::EmptyMessage));

        let _pending = store.begin_send("first").expect("send should start");
        assert_eq!(store.begin_send("second"), Err(ChatError::RequestInFlight));
        assert_eq!(store.begin_regenerate(), Err(ChatError::RequestInFlight));
        assert_eq!(store.set_model("other"), Err(ChatError::RequestInFlight));
        assert_eq!(store.active().map(|c| c.turns.len()), Some(1));
    }

    #[test]
    fn complete_appends_reply_with_model_and_clears_state() {
        let mut store = ChatStore::new(MODEL);
        let pending = store.begin_send("hi").expect("send should start");
        store.update_preview("partial");
        assert_eq!(store.streaming_preview(), "partial");

        let notification = store.complete(&pending, completed("full reply"));

        assert!(notification.is_none());
        assert!(!store.is_in_flight());
        assert!(store.streaming_preview().is_empty());
        let reply = store
            .active()
            .and_then(|c| c.last_turn())
            .expect("reply turn");
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "full reply");
        assert_eq!(reply.model.as_deref(), Some(MODEL));
    }

    #[test]
    fn failed_send_appends_error_turn_and_notifies() {
        let mut store = ChatStore::new(MODEL);
        let pending = store.begin_send("hi").expect("send should start");

        let notification = store
            .complete(
                &pending,
                ExchangeOutcome::Failed {
                    reason: "relay returned 500".to_string(),
                },
            )
            .expect("failure should notify");

        assert_eq!(notification.description, "Failed to get response");
        let active = store.active().expect("active conversation");
        assert_eq!(active.turns.len(), 2);
        assert_eq!(active.turns[0].content, "hi");
        assert_eq!(active.turns[1].content, SEND_ERROR_REPLY);
        assert!(active.turns[1].model.is_none());
    }

    #[test]
    fn regenerate_removes_exactly_one_trailing_reply() {
        let mut store = store_with_exchange();
        let pending = store.begin_regenerate().expect("regenerate should start");

        assert_eq!(pending.kind, ExchangeKind::Regenerate);
        assert_eq!(pending.messages.len(), 1);
        assert_eq!(pending.messages[0].role, Role::User);
        assert_eq!(store.active().map(|c| c.turns.len()), Some(1));

        store.complete(&pending, completed("A memory-safe systems language."));
        let active = store.active().expect("active conversation");
        assert_eq!(active.turns.len(), 2);
        assert_eq!(active.turns[1].content, "A memory-safe systems language.");
    }

    #[test]
    fn failed_regenerate_uses_regenerate_error_text() {
        let mut store = store_with_exchange();
        let pending = store.begin_regenerate().expect("regenerate should start");
        let notification = store.complete(
            &pending,
            ExchangeOutcome::Failed {
                reason: "boom".to_string(),
            },
        );

        assert_eq!(
            notification.map(|n| n.description),
            Some("Failed to regenerate response".to_string())
        );
        let active = store.active().expect("active conversation");
        assert_eq!(active.turns.len(), 2);
        assert_eq!(active.turns[1].content, REGENERATE_ERROR_REPLY);
    }

    #[test]
    fn regenerate_requires_trailing_assistant_turn() {
        let mut store = ChatStore::new(MODEL);
        assert_eq!(store.begin_regenerate(), Err(ChatError::NothingToRegenerate));

        let mut store = store_with_exchange();
        let pending = store.begin_send("follow-up").expect("send should start");
        assert_eq!(store.begin_regenerate(), Err(ChatError::RequestInFlight));
        store.complete(&pending, completed("answer"));
        assert!(store.begin_regenerate().is_ok());
    }

    #[test]
    fn reply_lands_in_originating_conversation_after_switch() {
        let mut store = ChatStore::new(MODEL);
        let original = store.active_id().map(str::to_string).expect("active id");
        let pending = store.begin_send("hello").expect("send should start");

        let other = store.new_conversation();
        store.complete(&pending, completed("reply"));

        assert_eq!(store.active_id(), Some(other.as_str()));
        assert_eq!(store.conversation(&original).map(|c| c.turns.len()), Some(2));
        assert_eq!(store.conversation(&other).map(|c| c.turns.len()), Some(0));
    }

    #[test]
    fn reply_for_deleted_conversation_is_dropped() {
        let mut store = ChatStore::new(MODEL);
        let original = store.active_id().map(str::to_string).expect("active id");
        let pending = store.begin_send("hello").expect("send should start");
        store.delete(&original).expect("delete should succeed");

        assert!(store.complete(&pending, completed("reply")).is_none());
        assert_eq!(store.conversations().len(), 1);
        assert!(store.active().is_some_and(|c| c.is_empty()));
        assert!(!store.is_in_flight());
    }

    #[test]
    fn new_conversations_are_prepended_and_activated() {
        let mut store = ChatStore::new(MODEL);
        let first = store.active_id().map(str::to_string).expect("active id");
        let second = store.new_conversation();

        assert_eq!(store.conversations()[0].id, second);
        assert_eq!(store.conversations()[1].id, first);
        store.select(&first).expect("select should succeed");
        assert_eq!(store.active_id(), Some(first.as_str()));
        assert_eq!(
            store.select("missing"),
            Err(ChatError::UnknownConversation("missing".to_string()))
        );
    }

    #[test]
    fn deleting_active_conversation_activates_first_remaining() {
        let mut store = ChatStore::new(MODEL);
        let first = store.active_id().map(str::to_string).expect("active id");
        let second = store.new_conversation();

        store.delete(&second).expect("delete should succeed");
        assert_eq!(store.active_id(), Some(first.as_str()));

        store.delete(&first).expect("delete should succeed");
        assert_eq!(store.conversations().len(), 1);
        assert_ne!(store.active_id(), Some(first.as_str()));
    }

    #[test]
    fn ratings_toggle_on_assistant_turns_only() {
        let mut store = store_with_exchange();
        let (user_id, reply_id) = {
            let active = store.active().expect("active conversation");
            (active.turns[0].id.clone(), active.turns[1].id.clone())
        };

        assert_eq!(store.rate(&reply_id, Rating::Up), Ok(Some(Rating::Up)));
        assert_eq!(store.rate(&reply_id, Rating::Down), Ok(Some(Rating::Down)));
        assert_eq!(store.rate(&reply_id, Rating::Down), Ok(None));
        assert_eq!(store.rating(&reply_id), None);
        assert_eq!(store.rate(&user_id, Rating::Up), Err(ChatError::NotRateable));
        assert_eq!(
            store.rate("nope", Rating::Up),
            Err(ChatError::UnknownTurn("nope".to_string()))
        );
    }

    #[test]
    fn model_selection_applies_to_next_exchange() {
        let mut store = ChatStore::new(MODEL);
        store
            .set_model("meta-llama/llama-3.2-3b-instruct:free")
            .expect("model change should succeed");
        let pending = store.begin_send("hi").expect("send should start");
        assert_eq!(pending.model, "meta-llama/llama-3.2-3b-instruct:free");
    }

    #[test]
    fn turn_timestamps_are_not_in_the_future() {
        let store = store_with_exchange();
        let now = Utc::now();
        assert!(
            store
                .active()
                .is_some_and(|c| c.turns.iter().all(|turn| turn.timestamp <= now))
        );
    }
}
