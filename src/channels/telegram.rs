//! Telegram channel — Bot API implementation of `ChatTransport`.
//!
//! Native Rust Telegram Bot API client over reqwest. Inbound updates arrive
//! through the webhook (or `get_updates` in polling mode) and are classified
//! in `channels::event`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::event::Update;
use crate::channels::transport::{ChatTransport, Keyboard, MessageRef};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel — talks to the Bot API.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "https://api.telegram.org/file/bot{}/{file_path}",
            self.bot_token.expose_secret()
        )
    }

    /// POST a Bot API method and return its `result` field.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: {e}")))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: unreadable response: {e}")))?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(ChannelError::Http(format!(
                "{method} returned {status}: {description}"
            )));
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Call with Markdown first, retrying as plain text if Telegram rejects
    /// the markup (model output often contains stray `_` or `*`).
    async fn call_with_markdown_fallback(
        &self,
        method: &str,
        mut body: Value,
    ) -> Result<Value, ChannelError> {
        body["parse_mode"] = Value::String("Markdown".into());
        match self.call(method, &body).await {
            Ok(result) => Ok(result),
            Err(markdown_err) => {
                tracing::warn!(
                    method,
                    error = %markdown_err,
                    "Telegram call with Markdown failed; retrying without parse_mode"
                );
                if let Some(obj) = body.as_object_mut() {
                    obj.remove("parse_mode");
                }
                self.call(method, &body).await
            }
        }
    }

    /// Send a single message chunk (≤4096 chars).
    async fn send_message_chunk(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = serde_json::to_value(kb)
                .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;
        }

        let result = self
            .call_with_markdown_fallback("sendMessage", body)
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        let message_id = result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "sendMessage result has no message_id".into(),
            })?;
        Ok(MessageRef::new(chat_id, message_id))
    }

    /// Long-poll for updates (polling mode only).
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ChannelError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"]
        });
        let result = self.call("getUpdates", &body).await?;
        let Some(items) = result.as_array() else {
            return Ok(Vec::new());
        };

        // Skip individual updates we can't decode instead of stalling the offset.
        let mut updates = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Update>(item.clone()) {
                Ok(update) => updates.push(update),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable update"),
            }
        }
        Ok(updates)
    }

    /// Remove any registered webhook so `getUpdates` is allowed.
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call("deleteWebhook", &serde_json::json!({})).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), ChannelError> {
        self.call("getMe", &serde_json::json!({})).await?;
        Ok(())
    }
}

// ── ChatTransport implementation ────────────────────────────────────

#[async_trait]
impl ChatTransport for TelegramChannel {
    /// Splits long messages; the keyboard rides on the last chunk, whose
    /// reference is returned.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        let mut sent = None;
        for (i, chunk) in chunks.iter().enumerate() {
            let kb = if i == last { keyboard } else { None };
            sent = Some(self.send_message_chunk(chat_id, chunk, kb).await?);
        }

        sent.ok_or_else(|| ChannelError::SendFailed {
            name: "telegram".into(),
            reason: "empty message".into(),
        })
    }

    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        // An edit cannot be split across messages; callers resend instead.
        if text.len() > TELEGRAM_MAX_MESSAGE_LENGTH {
            return Err(ChannelError::MessageTooLong {
                length: text.len(),
                limit: TELEGRAM_MAX_MESSAGE_LENGTH,
            });
        }

        let mut body = serde_json::json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = serde_json::to_value(kb)
                .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;
        }

        self.call_with_markdown_fallback("editMessageText", body)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::EditFailed {
                name: "telegram".into(),
                message_id: message.message_id,
                reason: e.to_string(),
            })
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
        });
        self.call("deleteMessage", &body)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::DeleteFailed {
                name: "telegram".into(),
                message_id: message.message_id,
                reason: e.to_string(),
            })
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        let download_err = |reason: String| ChannelError::DownloadFailed {
            file_id: file_id.to_string(),
            reason,
        };

        let result = self
            .call("getFile", &serde_json::json!({ "file_id": file_id }))
            .await
            .map_err(|e| download_err(e.to_string()))?;
        let file_path = result
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| download_err("getFile returned no file_path".into()))?;

        let resp = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(download_err(format!("file download returned {}", resp.status())));
        }

        let bytes = resp.bytes().await.map_err(|e| download_err(e.to_string()))?;
        tracing::debug!(file_id, size = bytes.len(), "Downloaded attachment");
        Ok(bytes.to_vec())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
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

        let boundary = floor_char_boundary(remaining, max_len);
        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Largest char boundary ≤ `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

// ── Tests ───────────────────────────────────────────────────────────
