use async_trait::async_trait;
use chyme_types::{Contact, ContactId, DateTime, Message, MessageId, NewMessage};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Backend, BackendError, InsertStream};

const SUBSCRIBER_BUFFER: usize = 64;

/// In-process backend with the same contract as a remote store. Used by
/// integration tests and demos; real deployments implement [`Backend`]
/// against their own service layer.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    contacts: Vec<Contact>,
    messages: Vec<Message>,
    subscribers: Vec<Subscriber>,
}

struct Subscriber {
    recipient_id: ContactId,
    tx: mpsc::Sender<Message>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, contact: Contact) {
        let mut state = self.state.lock();
        state.contacts.push(contact);
    }

    /// Inserts a historical row without notifying subscribers. Tests use
    /// this to preload conversations, possibly out of chronological order.
    pub fn seed_message(&self, message: NewMessage, created_at: DateTime) -> Message {
        let message = Message {
            id: MessageId::confirmed(),
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            body: message.body,
            attachment: message.attachment,
            kind: message.kind,
            read: false,
            created_at,
        };
        let mut state = self.state.lock();
        state.messages.push(message.clone());
        message
    }

    /// Redelivers an already stored row to current subscribers, simulating
    /// the at-least-once behavior of a real push channel.
    pub fn redeliver(&self, message: &Message) {
        let mut state = self.state.lock();
        Self::notify(&mut state, message);
    }

    fn notify(state: &mut State, message: &Message) {
        state.subscribers.retain(|subscriber| {
            if subscriber.recipient_id != message.recipient_id {
                return true;
            }
            match subscriber.tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        recipient_id = %message.recipient_id,
                        "Insert notification dropped: subscriber buffer full",
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_contacts(&self, exclude: ContactId) -> Result<Vec<Contact>, BackendError> {
        let state = self.state.lock();
        Ok(state
            .contacts
            .iter()
            .filter(|contact| contact.id != exclude)
            .cloned()
            .collect())
    }

    async fn fetch_conversation(
        &self,
        user_id: ContactId,
        contact_id: ContactId,
    ) -> Result<Vec<Message>, BackendError> {
        let state = self.state.lock();
        Ok(state
            .messages
            .iter()
            .filter(|message| message.involves(user_id, contact_id))
            .cloned()
            .collect())
    }

    async fn send_message(&self, message: NewMessage) -> Result<Message, BackendError> {
        let message = Message {
            id: MessageId::confirmed(),
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            body: message.body,
            attachment: message.attachment,
            kind: message.kind,
            read: false,
            created_at: DateTime::now(),
        };
        let mut state = self.state.lock();
        state.messages.push(message.clone());
        Self::notify(&mut state, &message);
        Ok(message)
    }

    async fn list_unread_senders(
        &self,
        recipient_id: ContactId,
    ) -> Result<Vec<ContactId>, BackendError> {
        let state = self.state.lock();
        Ok(state
            .messages
            .iter()
            .filter(|message| message.recipient_id == recipient_id && !message.read)
            .map(|message| message.sender_id)
            .collect())
    }

    async fn mark_conversation_read(
        &self,
        user_id: ContactId,
        contact_id: ContactId,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        for message in state.messages.iter_mut() {
            if message.sender_id == contact_id && message.recipient_id == user_id {
                message.read = true;
            }
        }
        Ok(())
    }

    async fn subscribe_inserts(
        &self,
        recipient_id: ContactId,
    ) -> Result<InsertStream, BackendError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut state = self.state.lock();
        state.subscribers.push(Subscriber { recipient_id, tx });
        Ok(InsertStream::new(rx))
    }
}
