//! Inbound events — Telegram `Update` decoding and classification.
//!
//! Classification is pure: it turns one update into the acting user, the
//! chat to reply in, and one of four event kinds. Updates without an
//! identifiable actor are rejected; the caller logs and drops them.

use serde::Deserialize;

use crate::channels::transport::MessageRef;
use crate::error::ChannelError;

// ── Wire types (subset of the Bot API) ──────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Decode a raw webhook body.
pub fn parse_update(body: &[u8]) -> Result<Update, ChannelError> {
    serde_json::from_slice(body)
        .map_err(|e| ChannelError::InvalidMessage(format!("Malformed update: {e}")))
}

// ── Classification ──────────────────────────────────────────────────

/// What the actor did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An image was sent; `file_id` fetches it later.
    Attachment { file_id: String },
    /// Free text that is not a command.
    Text(String),
    /// An inline button was pressed.
    Button { tag: String, callback_id: String },
    /// `/name args`.
    Command { name: String, args: String },
}

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub update_id: i64,
    /// Opaque actor identifier (the Telegram user id as a string).
    pub actor: String,
    pub chat_id: i64,
    /// The inbound message, or the bot message carrying the pressed button.
    pub message: Option<MessageRef>,
    pub kind: EventKind,
}

/// Classify one update.
pub fn classify(update: &Update) -> Result<InboundEvent, ChannelError> {
    if let Some(query) = &update.callback_query {
        return classify_callback(update.update_id, query);
    }
    if let Some(message) = &update.message {
        return classify_message(update.update_id, message);
    }
    Err(ChannelError::InvalidMessage(format!(
        "Update {} carries neither a message nor a button press",
        update.update_id
    )))
}

fn classify_callback(update_id: i64, query: &CallbackQuery) -> Result<InboundEvent, ChannelError> {
    let from = query
        .from
        .as_ref()
        .ok_or_else(|| ChannelError::InvalidMessage("Button press without sender".into()))?;
    let tag = query
        .data
        .clone()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ChannelError::InvalidMessage("Button press without data".into()))?;

    let message = query
        .message
        .as_ref()
        .map(|m| MessageRef::new(m.chat.id, m.message_id));
    // Private chats share the user's id.
    let chat_id = message.map(|m| m.chat_id).unwrap_or(from.id);

    Ok(InboundEvent {
        update_id,
        actor: from.id.to_string(),
        chat_id,
        message,
        kind: EventKind::Button {
            tag,
            callback_id: query.id.clone(),
        },
    })
}

fn classify_message(update_id: i64, message: &Message) -> Result<InboundEvent, ChannelError> {
    let from = message
        .from
        .as_ref()
        .ok_or_else(|| ChannelError::InvalidMessage("Message without sender".into()))?;

    let kind = if let Some(file_id) = attachment_file_id(message) {
        EventKind::Attachment { file_id }
    } else if let Some(text) = message.text.as_deref() {
        match parse_command(text) {
            Some((name, args)) => EventKind::Command { name, args },
            None => EventKind::Text(text.to_string()),
        }
    } else {
        return Err(ChannelError::InvalidMessage(
            "Message has no text or image".into(),
        ));
    };

    Ok(InboundEvent {
        update_id,
        actor: from.id.to_string(),
        chat_id: message.chat.id,
        message: Some(MessageRef::new(message.chat.id, message.message_id)),
        kind,
    })
}

/// The largest photo size, or an image sent as a file.
fn attachment_file_id(message: &Message) -> Option<String> {
    if let Some(sizes) = message.photo.as_ref().filter(|s| !s.is_empty()) {
        return sizes
            .iter()
            .max_by_key(|p| p.width * p.height)
            .map(|p| p.file_id.clone());
    }
    message
        .document
        .as_ref()
        .filter(|d| {
            d.mime_type
                .as_deref()
                .is_some_and(|m| m.starts_with("image/"))
        })
        .map(|d| d.file_id.clone())
}

/// Split `/name@bot args` into (`name`, `args`).
fn parse_command(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), args.to_string()))
}
