use async_trait::async_trait;
use chyme_types::Message;

/// Consumer of pushed insert events. Events for the same sender arrive in
/// order; nothing is guaranteed across senders.
#[async_trait]
pub trait InsertListener: Send + Sync {
    async fn on_insert(&self, message: Message);
}

pub struct StubListener;

#[async_trait]
impl InsertListener for StubListener {
    async fn on_insert(&self, message: Message) {
        _ = message;
    }
}
