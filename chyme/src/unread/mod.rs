use std::collections::HashMap;

use chyme_types::ContactId;

/// Per-contact unread counts, reduced from two event kinds. Purely local
/// state owned by the conversation manager; no backend calls.
#[derive(Default)]
pub struct UnreadCounter {
    counts: HashMap<ContactId, u64>,
    open: Option<ContactId>,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all counts from the backend's unread rows, one entry per
    /// unread message. The open conversation, if any, stays at zero.
    pub fn seed<I>(&mut self, senders: I)
    where
        I: IntoIterator<Item = ContactId>,
    {
        self.counts.clear();
        for sender in senders {
            self.on_inbound_message(sender);
        }
    }

    /// Inbound message observed; increments unless that conversation is the
    /// open one.
    pub fn on_inbound_message(&mut self, contact_id: ContactId) {
        if self.open == Some(contact_id) {
            return;
        }
        *self.counts.entry(contact_id).or_insert(0) += 1;
    }

    /// Conversation became the open one; its count resets to zero.
    pub fn on_conversation_opened(&mut self, contact_id: ContactId) {
        self.open = Some(contact_id);
        self.counts.remove(&contact_id);
    }

    pub fn on_conversation_closed(&mut self) {
        self.open = None;
    }

    pub fn open(&self) -> Option<ContactId> {
        self.open
    }

    pub fn count(&self, contact_id: ContactId) -> u64 {
        self.counts.get(&contact_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> HashMap<ContactId, u64> {
        self.counts.clone()
    }
}
