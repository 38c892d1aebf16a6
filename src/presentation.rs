//! Cleanup and status presentation on top of the chat transport.
//!
//! Deletes are best effort: a failure is logged at debug with a `cleanup`
//! marker and never reaches the caller. Status replacement edits in place and
//! falls back to a fresh message when the edit is refused.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::channels::{ChatTransport, Keyboard, MessageRef};
use crate::error::ChannelError;

/// Presentation helper shared by the wizards and the dispatcher.
#[derive(Clone)]
pub struct Presenter {
    transport: Arc<dyn ChatTransport>,
}

impl Presenter {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    /// Delete transient messages, ignoring failures.
    pub async fn cleanup(&self, messages: &[MessageRef]) {
        for message in messages {
            if let Err(e) = self.transport.delete_message(*message).await {
                debug!(cleanup = true, message_id = message.message_id, error = %e, "Delete skipped");
            }
        }
    }

    /// Acknowledge a button press, ignoring failures.
    pub async fn acknowledge(&self, callback_id: &str) {
        if let Err(e) = self.transport.answer_callback(callback_id).await {
            debug!(cleanup = true, error = %e, "Callback acknowledgement skipped");
        }
    }

    pub async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        self.transport.send_message(chat_id, text, keyboard).await
    }

    /// Show `text` in place of `status`. Returns the message now carrying it,
    /// which is a new one if the edit failed.
    pub async fn replace(
        &self,
        status: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        match self.transport.edit_message(status, text, keyboard).await {
            Ok(()) => Ok(status),
            Err(ChannelError::MessageTooLong { length, .. }) => {
                debug!(message_id = status.message_id, length, "Status too long to edit, resending");
                let shown = self
                    .transport
                    .send_message(status.chat_id, text, keyboard)
                    .await?;
                self.cleanup(&[status]).await;
                Ok(shown)
            }
            Err(e) => {
                warn!(message_id = status.message_id, error = %e, "Status edit failed, sending anew");
                self.transport
                    .send_message(status.chat_id, text, keyboard)
                    .await
            }
        }
    }

    /// Replace `status` when there is one, otherwise send a new message.
    pub async fn show(
        &self,
        chat_id: i64,
        status: Option<MessageRef>,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        match status {
            Some(status) => self.replace(status, text, keyboard).await,
            None => self.send(chat_id, text, keyboard).await,
        }
    }

    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        self.transport.download_file(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    const EDIT_LIMIT: usize = 16;

    #[derive(Default)]
    struct FlakyTransport {
        calls: Mutex<Vec<String>>,
        next_id: Mutex<i64>,
    }

    #[async_trait]
    impl ChatTransport for FlakyTransport {
        async fn send_message(
            &self,
            chat_id: i64,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<MessageRef, ChannelError> {
            self.calls.lock().unwrap().push(format!("send:{text}"));
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            Ok(MessageRef::new(chat_id, 100 + *id))
        }

        async fn edit_message(
            &self,
            message: MessageRef,
            text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push(format!("edit:{}", message.message_id));
            if text.len() > EDIT_LIMIT {
                return Err(ChannelError::MessageTooLong {
                    length: text.len(),
                    limit: EDIT_LIMIT,
                });
            }
            Err(ChannelError::EditFailed {
                name: "test".into(),
                message_id: message.message_id,
                reason: "message is not modified".into(),
            })
        }

        async fn delete_message(&self, message: MessageRef) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push(format!("delete:{}", message.message_id));
            Err(ChannelError::DeleteFailed {
                name: "test".into(),
                message_id: message.message_id,
                reason: "message can't be deleted".into(),
            })
        }

        async fn answer_callback(&self, _callback_id: &str) -> Result<(), ChannelError> {
            Err(ChannelError::Http("query is too old".into()))
        }

        async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
            Err(ChannelError::DownloadFailed {
                file_id: file_id.into(),
                reason: "gone".into(),
            })
        }
    }

    #[tokio::test]
    async fn cleanup_swallows_failures_and_tries_every_message() {
        let transport = Arc::new(FlakyTransport::default());
        let presenter = Presenter::new(transport.clone());
        presenter
            .cleanup(&[MessageRef::new(1, 10), MessageRef::new(1, 11)])
            .await;
        presenter.acknowledge("cb").await;
        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec!["delete:10".to_string(), "delete:11".to_string()]
        );
    }

    #[tokio::test]
    async fn replace_falls_back_to_send() {
        let transport = Arc::new(FlakyTransport::default());
        let presenter = Presenter::new(transport.clone());
        let shown = presenter
            .replace(MessageRef::new(1, 10), "done", None)
            .await
            .unwrap();
        assert_eq!(shown, MessageRef::new(1, 101));
        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec!["edit:10".to_string(), "send:done".to_string()]
        );
    }

    #[tokio::test]
    async fn long_replacement_is_resent_and_old_status_removed() {
        let transport = Arc::new(FlakyTransport::default());
        let presenter = Presenter::new(transport.clone());
        let text = "a report far longer than an edit allows";
        let shown = presenter
            .replace(MessageRef::new(1, 10), text, None)
            .await
            .unwrap();
        assert_eq!(shown, MessageRef::new(1, 101));
        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec!["edit:10".to_string(), format!("send:{text}"), "delete:10".to_string()]
        );
    }

    #[tokio::test]
    async fn show_without_status_sends() {
        let transport = Arc::new(FlakyTransport::default());
        let presenter = Presenter::new(transport.clone());
        presenter.show(5, None, "hello", None).await.unwrap();
        assert_eq!(*transport.calls.lock().unwrap(), vec!["send:hello".to_string()]);
    }
}
