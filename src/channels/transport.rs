//! Chat transport surface — the outbound half of the chat channel.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ChannelError;

/// Reference to a message the transport delivered or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// One inline button. `tag` comes back verbatim on press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "text")]
    pub label: String,
    #[serde(rename = "callback_data")]
    pub tag: String,
}

impl Button {
    pub fn new(label: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tag: tag.into(),
        }
    }
}

/// Inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// Every tag on the keyboard, row by row.
    pub fn tags(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.tag.as_str())
            .collect()
    }
}

/// Outbound chat operations. All of them are best effort from the bot's view;
/// callers decide which failures matter.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a new message, returning a reference to it.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError>;

    /// Replace the text (and keyboard) of an existing message.
    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    async fn delete_message(&self, message: MessageRef) -> Result<(), ChannelError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;

    /// Fetch the bytes of an attachment by its transport file id.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_serializes_as_inline_markup() {
        let kb = Keyboard::new()
            .row(vec![Button::new("Short", "short"), Button::new("Long", "long")])
            .row(vec![Button::new("Draft", "start_email")]);
        let json = serde_json::to_value(&kb).unwrap();
        assert_eq!(json["inline_keyboard"][0][1]["callback_data"], "long");
        assert_eq!(json["inline_keyboard"][1][0]["text"], "Draft");
        assert_eq!(kb.tags(), vec!["short", "long", "start_email"]);
    }
}
