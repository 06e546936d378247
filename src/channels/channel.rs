//! Channel trait and the message types exchanged with the core.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::onboarding::model::Selection;

/// What the user did: typed something, or pressed a choice button.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Text(String),
    Selection(Selection),
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Name of the channel the message arrived on.
    pub channel: String,
    /// Stable identifier of the sender.
    pub user_id: String,
    /// Display name, if the transport provides one.
    pub user_name: Option<String>,
    pub event: InboundEvent,
    /// Transport-specific reply routing (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    /// A plain text message.
    pub fn new(channel: &str, user_id: &str, text: &str) -> Self {
        Self::with_event(channel, user_id, InboundEvent::Text(text.to_string()))
    }

    /// A choice-button press.
    pub fn selection(channel: &str, user_id: &str, selection: Selection) -> Self {
        Self::with_event(channel, user_id, InboundEvent::Selection(selection))
    }

    fn with_event(channel: &str, user_id: &str, event: InboundEvent) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            event,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }
}

/// One button of a "present choices" reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub label: String,
    pub selection: Selection,
}

impl Choice {
    pub fn new(label: &str, selection: Selection) -> Self {
        Self {
            label: label.to_string(),
            selection,
        }
    }
}

/// A reply produced by the core. With no choices it is plain text; otherwise
/// the channel renders the choices however it can.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingResponse {
    pub content: String,
    pub choices: Vec<Choice>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            choices: Vec::new(),
        }
    }

    pub fn choices(content: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            content: content.into(),
            choices,
        }
    }

    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }
}

/// Stream of incoming messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message transport (Telegram, CLI, ...).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Short identifier, matched against `IncomingMessage::channel`.
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a reply to the sender of `msg`.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Check the transport is reachable.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
