use async_trait::async_trait;
use chyme_types::{ContactId, Message};

/// Observer for the presentation layer. The manager alone decides what
/// becomes user-facing messaging; lower components never surface UI.
#[async_trait]
pub trait ConversationListener: Send + Sync {
    /// Some rendered state changed; pull a fresh snapshot.
    async fn on_state_changed(&self);

    /// A genuine (non-duplicate) inbound message arrived.
    async fn on_inbound_message(&self, message: Message);

    /// A send was rolled back. `body` is handed back so the input is not
    /// lost.
    async fn on_send_failed(&self, recipient_id: ContactId, body: String);
}

pub(super) struct StubListener;

#[async_trait]
impl ConversationListener for StubListener {
    async fn on_state_changed(&self) {}

    async fn on_inbound_message(&self, message: Message) {
        _ = message;
    }

    async fn on_send_failed(&self, recipient_id: ContactId, body: String) {
        _ = recipient_id;
        _ = body;
    }
}
