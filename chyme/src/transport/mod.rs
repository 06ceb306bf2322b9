use std::sync::Arc;

use chyme_backend::Backend;
use chyme_types::{ContactId, Message, NewMessage};

use crate::error::SyncError;

/// Mediates all message reads and writes against the remote store. Performs
/// no local caching; optimistic insertion and rollback belong to the
/// conversation manager.
pub struct MessageTransport {
    backend: Arc<dyn Backend>,
}

impl MessageTransport {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Full conversation between `user_id` and `contact_id`, chronologically
    /// sorted even if the backend returns rows unordered.
    pub async fn fetch_conversation(
        &self,
        user_id: ContactId,
        contact_id: ContactId,
    ) -> Result<Vec<Message>, SyncError> {
        let mut messages = self
            .backend
            .fetch_conversation(user_id, contact_id)
            .await
            .map_err(|err| {
                tracing::warn!(?err, %contact_id, "Failed to fetch conversation");
                SyncError::BackendUnavailable(err)
            })?;
        sort_chronological(&mut messages);
        Ok(messages)
    }

    /// One durable insert; returns the confirmed row.
    pub async fn send_message(&self, message: NewMessage) -> Result<Message, SyncError> {
        self.backend.send_message(message).await.map_err(|err| {
            tracing::warn!(?err, "Failed to send message");
            SyncError::SendFailed(err)
        })
    }
}

/// Non-decreasing by created timestamp; the sort is stable, so ties keep
/// arrival order.
pub fn sort_chronological(messages: &mut [Message]) {
    messages.sort_by_key(|message| message.created_at);
}
