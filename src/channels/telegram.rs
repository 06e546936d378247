//! Telegram channel: long-polls the Bot API for messages and button presses.
//!
//! Choices are rendered as an inline keyboard whose `callback_data` is the
//! encoded selection payload.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::payload::{decode_selection, encode_selection};
use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel connected to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different Bot API server (local Bot API, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        method_url(&self.api_base, &self.bot_token, method)
    }

    /// Check if a username or id is in the allowed list.
    pub fn is_user_allowed(&self, identity: &str) -> bool {
        check_user_allowed(&self.allowed_users, [identity])
    }

    /// Send text, attaching the keyboard (if any) to the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        response: &OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(&response.content, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last && response.has_choices() {
                body["reply_markup"] = inline_keyboard(response);
            }

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage returned {status}: {err}"),
                });
            }
        }
        Ok(())
    }

    /// Stop the button's loading spinner. Best effort.
    async fn answer_callback(&self, callback_query_id: &str) {
        let result = self
            .client
            .post(self.api_url("answerCallbackQuery"))
            .json(&json!({ "callback_query_id": callback_query_id }))
            .send()
            .await;
        if let Err(e) = result {
            tracing::debug!("Telegram answerCallbackQuery failed: {e}");
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        if let Some(id) = msg.metadata.get("callback_query_id").and_then(Value::as_str) {
            self.answer_callback(id).await;
        }

        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        self.send_message(chat_id, &response).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn method_url(api_base: &str, token: &SecretString, method: &str) -> String {
    format!(
        "{}/bot{}/{method}",
        api_base.trim_end_matches('/'),
        token.expose_secret()
    )
}

/// One button per row.
fn inline_keyboard(response: &OutgoingResponse) -> Value {
    let rows: Vec<Value> = response
        .choices
        .iter()
        .map(|c| {
            json!([{
                "text": c.label,
                "callback_data": encode_selection(c.selection),
            }])
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Turn one `getUpdates` entry into an `IncomingMessage`.
///
/// Returns `None` for updates we don't handle, senders outside the
/// allowlist, and button payloads that don't decode.
fn parse_update(update: &Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let sender = Sender::from_parts(message.get("from"), message.get("chat"))?;
        if !sender.is_allowed(allowed_users) {
            return None;
        }
        return Some(sender.attach(IncomingMessage::new("telegram", &sender.user_id, text), None));
    }

    let callback = update.get("callback_query")?;
    let callback_id = callback.get("id").and_then(Value::as_str)?;
    let chat = callback.get("message").and_then(|m| m.get("chat"));
    let sender = Sender::from_parts(callback.get("from"), chat)?;
    if !sender.is_allowed(allowed_users) {
        return None;
    }

    let data = callback.get("data").and_then(Value::as_str).unwrap_or_default();
    let Some(selection) = decode_selection(data) else {
        tracing::warn!(user_id = %sender.user_id, data, "Telegram: ignoring unknown button payload");
        return None;
    };

    Some(sender.attach(
        IncomingMessage::selection("telegram", &sender.user_id, selection),
        Some(callback_id),
    ))
}

/// Who sent an update and where to reply.
struct Sender {
    user_id: String,
    username: Option<String>,
    first_name: Option<String>,
    chat_id: String,
}

impl Sender {
    fn from_parts(from: Option<&Value>, chat: Option<&Value>) -> Option<Self> {
        let from = from?;
        let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
        let chat_id = chat
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .map(|id| id.to_string())
            .unwrap_or_else(|| user_id.clone());
        Some(Self {
            user_id,
            username: from.get("username").and_then(Value::as_str).map(String::from),
            first_name: from.get("first_name").and_then(Value::as_str).map(String::from),
            chat_id,
        })
    }

    /// Allowlist matches username or numeric id.
    fn is_allowed(&self, allowed_users: &[String]) -> bool {
        let mut identities = vec![self.user_id.as_str()];
        if let Some(name) = self.username.as_deref() {
            identities.push(name);
        }
        let allowed = check_user_allowed(allowed_users, identities);
        if !allowed {
            tracing::warn!(
                "Telegram: ignoring update from unauthorized user: username={}, user_id={}",
                self.username.as_deref().unwrap_or("unknown"),
                self.user_id
            );
        }
        allowed
    }

    fn attach(&self, msg: IncomingMessage, callback_id: Option<&str>) -> IncomingMessage {
        let mut metadata = json!({
            "chat_id": self.chat_id,
            "username": self.username,
        });
        if let Some(id) = callback_id {
            metadata["callback_query_id"] = json!(id);
        }
        let msg = msg.with_metadata(metadata);
        match self.first_name.as_deref().or(self.username.as_deref()) {
            Some(name) => msg.with_user_name(name),
            None => msg,
        }
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Largest char boundary at or below `index`.
fn floor_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Split a message into chunks of at most `max_len` bytes.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let hard = floor_boundary(remaining, max_len);
        let window = &remaining[..hard];
        let split_at = match window.rfind('\n').or_else(|| window.rfind(' ')) {
            Some(0) | None => hard,
            Some(i) => i,
        };
        // A single char wider than max_len: take it whole.
        let split_at = if split_at == 0 {
            remaining.chars().next().map_or(remaining.len(), char::len_utf8)
        } else {
            split_at
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
