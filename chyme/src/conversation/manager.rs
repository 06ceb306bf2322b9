use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chyme_backend::Backend;
use chyme_types::{
    AttachmentRef, Contact, ContactId, DateTime, Message, MessageId, MessageKind, NewMessage,
};
use parking_lot::Mutex;
use tokio::sync::Mutex as TokioMutex;

use crate::directory::{ContactDirectory, sort_by_name};
use crate::error::SyncError;
use crate::realtime::{InsertListener, RealtimeSubscription};
use crate::transport::{MessageTransport, sort_chronological};
use crate::unread::UnreadCounter;
use crate::voice::VoiceClip;

use super::{ConversationListener, StubListener};

// A pushed insert this close to a pending entry with the same sender and
// body is the confirmation of our own optimistic send coming back over the
// channel, not a new message.
const ECHO_WINDOW_MICROS: i64 = 2_000_000;

// Redeliveries arrive close to the original; ids older than the window can
// be forgotten once the cap is reached.
const SEEN_INSERTS_CAP: usize = 1024;

/// Render props handed to the presentation layer.
#[derive(Clone, Debug)]
pub struct ConversationSnapshot {
    pub contacts: Vec<Contact>,
    pub unread: HashMap<ContactId, u64>,
    pub selected: Option<Contact>,
    pub messages: Vec<Message>,
    pub contacts_loading: bool,
    pub messages_loading: bool,
}

/// The orchestrator: owns contacts, the selected conversation, the unread
/// map, and the search filters, and composes the directory, transport, and
/// realtime components into the behavior the presentation layer renders.
pub struct ConversationManager {
    backend: Arc<dyn Backend>,
    directory: ContactDirectory,
    transport: MessageTransport,
    shared: Arc<Shared>,
    // Held across awaits while (re)connecting; at most one subscription
    // exists per session.
    subscription: TokioMutex<Option<RealtimeSubscription>>,
}

struct Shared {
    state: Mutex<State>,
    listener: Arc<dyn ConversationListener>,
}

struct State {
    user_id: ContactId,
    contacts: Vec<Contact>,
    selected: Option<ContactId>,
    messages: Vec<Message>,
    unread: UnreadCounter,
    // Confirmed ids already delivered over the push channel; the channel is
    // at-least-once, so redeliveries must not count twice.
    seen_inserts: SeenInserts,
    contact_filter: String,
    message_filter: String,
    contacts_loading: bool,
    messages_loading: bool,
}

impl State {
    fn new(user_id: ContactId) -> Self {
        Self {
            user_id,
            contacts: Vec::new(),
            selected: None,
            messages: Vec::new(),
            unread: UnreadCounter::new(),
            seen_inserts: SeenInserts::new(SEEN_INSERTS_CAP),
            contact_filter: String::new(),
            message_filter: String::new(),
            contacts_loading: false,
            messages_loading: false,
        }
    }
}

impl ConversationManager {
    pub fn new(backend: Arc<dyn Backend>, user_id: ContactId) -> Self {
        Self::with_listener(backend, user_id, Arc::new(StubListener))
    }

    pub fn with_listener<L>(backend: Arc<dyn Backend>, user_id: ContactId, listener: Arc<L>) -> Self
    where
        L: ConversationListener + 'static,
    {
        Self {
            directory: ContactDirectory::new(backend.clone()),
            transport: MessageTransport::new(backend.clone()),
            shared: Arc::new(Shared {
                state: Mutex::new(State::new(user_id)),
                listener,
            }),
            subscription: TokioMutex::new(None),
            backend,
        }
    }

    pub fn user_id(&self) -> ContactId {
        self.shared.state.lock().user_id
    }

    /// Loads the directory and seeds unread counts from the backend's
    /// unread rows. On failure the contact list degrades to empty and the
    /// call is retryable.
    pub async fn load_contacts(&self) -> Result<(), SyncError> {
        let user_id = {
            let mut state = self.shared.state.lock();
            state.contacts_loading = true;
            state.user_id
        };
        self.shared.listener.on_state_changed().await;
        let contacts = self.directory.list_contacts(user_id).await;
        let unread = self.backend.list_unread_senders(user_id).await;
        let result = {
            let mut state = self.shared.state.lock();
            state.contacts_loading = false;
            match contacts {
                Ok(contacts) => {
                    state.contacts = contacts;
                    match unread {
                        Ok(senders) => state.unread.seed(senders),
                        Err(err) => {
                            // Counts stay stale; they self-correct later.
                            tracing::warn!(?err, "Failed to fetch unread rows");
                        }
                    }
                    Ok(())
                }
                Err(err) => {
                    state.contacts.clear();
                    Err(err)
                }
            }
        };
        self.shared.listener.on_state_changed().await;
        result
    }

    /// Makes `contact` the open conversation: zeroes its unread count,
    /// establishes the realtime subscription if needed, and fetches its
    /// history. A result arriving after the selection moved on is dropped.
    pub async fn select_contact(&self, contact: Contact) -> Result<(), SyncError> {
        let contact_id = contact.id;
        let user_id = {
            let mut state = self.shared.state.lock();
            if !state.contacts.iter().any(|known| known.id == contact_id) {
                // Conversation started from outside the directory list.
                state.contacts.push(contact);
                sort_by_name(&mut state.contacts);
            }
            state.selected = Some(contact_id);
            state.messages.clear();
            state.messages_loading = true;
            state.unread.on_conversation_opened(contact_id);
            state.user_id
        };
        self.shared.listener.on_state_changed().await;
        self.ensure_subscribed().await;
        let fetched = self.transport.fetch_conversation(user_id, contact_id).await;
        let result = {
            let mut state = self.shared.state.lock();
            if state.selected != Some(contact_id) {
                tracing::debug!(%contact_id, "Dropping stale conversation fetch");
                return Ok(());
            }
            state.messages_loading = false;
            match fetched {
                Ok(messages) => {
                    state.messages = messages;
                    Ok(())
                }
                Err(err) => {
                    state.messages.clear();
                    Err(err)
                }
            }
        };
        if result.is_ok() {
            if let Err(err) = self.backend.mark_conversation_read(user_id, contact_id).await {
                tracing::warn!(?err, %contact_id, "Failed to mark conversation read");
            }
        }
        self.shared.listener.on_state_changed().await;
        result
    }

    /// Back navigation: no conversation is open anymore.
    pub async fn close_conversation(&self) {
        {
            let mut state = self.shared.state.lock();
            state.selected = None;
            state.messages.clear();
            state.message_filter.clear();
            state.messages_loading = false;
            state.unread.on_conversation_closed();
        }
        self.shared.listener.on_state_changed().await;
    }

    /// Optimistic send: the message appears immediately with a pending id,
    /// which is replaced by the confirmed row on success or rolled back on
    /// failure. The body travels back through `on_send_failed`, so it is
    /// never lost from the input field.
    pub async fn send(
        &self,
        body: impl Into<String>,
        attachment: Option<AttachmentRef>,
        kind: MessageKind,
    ) -> Result<Message, SyncError> {
        let body = body.into();
        let (user_id, recipient_id, pending_id) = {
            let mut state = self.shared.state.lock();
            let recipient_id = state.selected.ok_or(SyncError::NoContactSelected)?;
            let sender_id = state.user_id;
            let pending_id = MessageId::pending();
            state.messages.push(Message {
                id: pending_id,
                sender_id,
                recipient_id,
                body: body.clone(),
                attachment: attachment.clone(),
                kind,
                read: false,
                created_at: DateTime::now(),
            });
            (sender_id, recipient_id, pending_id)
        };
        self.shared.listener.on_state_changed().await;
        let sent = self
            .transport
            .send_message(NewMessage {
                sender_id: user_id,
                recipient_id,
                body: body.clone(),
                attachment,
                kind,
            })
            .await;
        match sent {
            Ok(confirmed) => {
                {
                    let mut state = self.shared.state.lock();
                    if let Some(entry) = state
                        .messages
                        .iter_mut()
                        .find(|message| message.id == pending_id)
                    {
                        *entry = confirmed.clone();
                    }
                    // Confirmations may land out of invocation order; the
                    // stable sort keeps the final order deterministic.
                    sort_chronological(&mut state.messages);
                }
                self.shared.listener.on_state_changed().await;
                Ok(confirmed)
            }
            Err(err) => {
                {
                    let mut state = self.shared.state.lock();
                    state.messages.retain(|message| message.id != pending_id);
                }
                self.shared.listener.on_send_failed(recipient_id, body).await;
                self.shared.listener.on_state_changed().await;
                Err(err)
            }
        }
    }

    /// Sends a finalized voice clip to the open conversation.
    pub async fn send_voice_clip(&self, clip: &VoiceClip) -> Result<Message, SyncError> {
        self.send(
            "Voice message",
            Some(clip.attachment().clone()),
            MessageKind::Voice,
        )
        .await
    }

    /// Case-insensitive substring filter over message bodies; applied only
    /// at snapshot time, stored messages are untouched.
    pub async fn set_message_filter(&self, term: impl Into<String>) {
        {
            let mut state = self.shared.state.lock();
            state.message_filter = term.into();
        }
        self.shared.listener.on_state_changed().await;
    }

    /// Case-insensitive substring filter over contact names.
    pub async fn set_contact_filter(&self, term: impl Into<String>) {
        {
            let mut state = self.shared.state.lock();
            state.contact_filter = term.into();
        }
        self.shared.listener.on_state_changed().await;
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = self.shared.state.lock();
        let contact_filter = state.contact_filter.to_lowercase();
        let contacts = state
            .contacts
            .iter()
            .filter(|contact| {
                contact_filter.is_empty() || contact.name.to_lowercase().contains(&contact_filter)
            })
            .cloned()
            .collect();
        let message_filter = state.message_filter.to_lowercase();
        let messages = state
            .messages
            .iter()
            .filter(|message| {
                message_filter.is_empty() || message.body.to_lowercase().contains(&message_filter)
            })
            .cloned()
            .collect();
        let selected = state.selected.and_then(|id| {
            state
                .contacts
                .iter()
                .find(|contact| contact.id == id)
                .cloned()
        });
        ConversationSnapshot {
            contacts,
            unread: state.unread.counts(),
            selected,
            messages,
            contacts_loading: state.contacts_loading,
            messages_loading: state.messages_loading,
        }
    }

    /// Tears down the session state and the subscription for a new user,
    /// then reloads the directory. The subscription comes back on the next
    /// selection.
    pub async fn switch_user(&self, user_id: ContactId) {
        {
            let mut slot = self.subscription.lock().await;
            *slot = None;
        }
        {
            let mut state = self.shared.state.lock();
            *state = State::new(user_id);
        }
        self.shared.listener.on_state_changed().await;
        if let Err(err) = self.load_contacts().await {
            // Retryable through another load_contacts call.
            tracing::warn!(?err, %user_id, "Failed to load contacts for new user");
        }
    }

    /// Releases the realtime channel. Also happens on drop.
    pub async fn shutdown(&self) {
        let mut slot = self.subscription.lock().await;
        *slot = None;
    }

    async fn ensure_subscribed(&self) {
        let user_id = self.shared.state.lock().user_id;
        let mut slot = self.subscription.lock().await;
        let current = slot
            .as_ref()
            .map(|subscription| subscription.user_id() == user_id)
            .unwrap_or(false);
        if current {
            return;
        }
        *slot = Some(RealtimeSubscription::connect(
            self.backend.clone(),
            user_id,
            Arc::new(InsertBridge {
                shared: self.shared.clone(),
            }),
        ));
    }
}

// Bounded dedup window over push-channel ids. Ids are evicted in arrival
// order once the cap is reached, keeping the set small over a long session.
struct SeenInserts {
    cap: usize,
    set: HashSet<uuid::Uuid>,
    order: VecDeque<uuid::Uuid>,
}

impl SeenInserts {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            set: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    // Returns false if the id was already present.
    fn insert(&mut self, id: uuid::Uuid) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }
}

struct InsertBridge {
    shared: Arc<Shared>,
}

#[async_trait]
impl InsertListener for InsertBridge {
    async fn on_insert(&self, message: Message) {
        let message = {
            let mut state = self.shared.state.lock();
            if message.recipient_id != state.user_id {
                // Late event from a subscription being torn down.
                return;
            }
            let already_seen = !state.seen_inserts.insert(message.id.uuid())
                || state
                    .messages
                    .iter()
                    .any(|existing| existing.id == message.id);
            if already_seen {
                tracing::debug!(id = ?message.id, "Dropping redelivered insert");
                return;
            }
            // Only unreconciled optimistic entries can shadow a pushed
            // insert; a contact repeating the same text is a new message.
            let echo = state.messages.iter().any(|existing| {
                existing.id.is_pending()
                    && existing.sender_id == message.sender_id
                    && existing.body == message.body
                    && (existing.created_at.micros() - message.created_at.micros()).abs()
                        <= ECHO_WINDOW_MICROS
            });
            if echo {
                tracing::debug!(id = ?message.id, "Dropping optimistic echo");
                return;
            }
            if state.selected == Some(message.sender_id) {
                state.messages.push(message.clone());
                sort_chronological(&mut state.messages);
            }
            state.unread.on_inbound_message(message.sender_id);
            message
        };
        self.shared.listener.on_inbound_message(message).await;
        self.shared.listener.on_state_changed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_inserts_dedup_and_eviction() {
        let mut seen = SeenInserts::new(3);
        let ids: Vec<uuid::Uuid> = (0..4).map(|_| uuid::Uuid::now_v7()).collect();
        assert!(seen.insert(ids[0]));
        assert!(!seen.insert(ids[0]));
        assert!(seen.insert(ids[1]));
        assert!(seen.insert(ids[2]));
        assert!(!seen.insert(ids[2]));
        // A fourth id evicts the oldest, which then reads as unseen again.
        assert!(seen.insert(ids[3]));
        assert!(seen.insert(ids[0]));
        assert!(!seen.insert(ids[3]));
        assert_eq!(seen.set.len(), 3);
        assert_eq!(seen.order.len(), 3);
    }
}
