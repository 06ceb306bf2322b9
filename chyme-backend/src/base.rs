use async_trait::async_trait;
use chyme_types::{Contact, ContactId, Message, NewMessage};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("insert rejected: {0}")]
    Rejected(String),
    #[error("push channel closed")]
    ChannelClosed,
}

/// The remote store the engine synchronizes against. The backend owns
/// durability and the wire format; this trait is only the call surface and
/// its ordering/failure guarantees.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All known contacts except `exclude`. No ordering guarantee.
    async fn list_contacts(&self, exclude: ContactId) -> Result<Vec<Contact>, BackendError>;

    /// All messages between `user_id` and `contact_id`, in either direction.
    /// No ordering guarantee.
    async fn fetch_conversation(
        &self,
        user_id: ContactId,
        contact_id: ContactId,
    ) -> Result<Vec<Message>, BackendError>;

    /// Durably inserts one message and returns the confirmed row.
    async fn send_message(&self, message: NewMessage) -> Result<Message, BackendError>;

    /// One entry per unread inbound row addressed to `recipient_id`.
    async fn list_unread_senders(
        &self,
        recipient_id: ContactId,
    ) -> Result<Vec<ContactId>, BackendError>;

    /// Marks every message from `contact_id` to `user_id` as read.
    async fn mark_conversation_read(
        &self,
        user_id: ContactId,
        contact_id: ContactId,
    ) -> Result<(), BackendError>;

    /// Push channel delivering newly inserted messages whose recipient is
    /// `recipient_id`. Delivery is at-least-once; order is preserved per
    /// sender but not across senders.
    async fn subscribe_inserts(
        &self,
        recipient_id: ContactId,
    ) -> Result<InsertStream, BackendError>;
}

/// Receiving half of an insert subscription. Dropping it unsubscribes.
pub struct InsertStream {
    rx: mpsc::Receiver<Message>,
}

impl InsertStream {
    pub fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Next pushed insert, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}
