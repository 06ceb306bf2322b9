mod listener;

pub use listener::*;

use std::sync::Arc;
use std::time::Duration;

use chyme_backend::Backend;
use chyme_types::ContactId;
use rand::Rng as _;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Owned handle to the per-user insert subscription. There is at most one
/// for the lifetime of a logged-in session, created and torn down only by
/// the conversation manager. Dropping the handle releases the channel.
pub struct RealtimeSubscription {
    user_id: ContactId,
    main_task: JoinHandle<()>,
}

impl RealtimeSubscription {
    pub fn connect(
        backend: Arc<dyn Backend>,
        user_id: ContactId,
        listener: Arc<dyn InsertListener>,
    ) -> Self {
        let main_task = tokio::spawn(Self::main_loop(backend, user_id, listener));
        Self { user_id, main_task }
    }

    pub fn user_id(&self) -> ContactId {
        self.user_id
    }

    pub fn close(self) {
        // Drop runs and aborts the loop.
    }

    async fn main_loop(
        backend: Arc<dyn Backend>,
        user_id: ContactId,
        listener: Arc<dyn InsertListener>,
    ) {
        loop {
            let mut stream = match backend.subscribe_inserts(user_id).await {
                Ok(v) => v,
                Err(err) => {
                    // Not fatal: stale unread counts self-correct on the
                    // next full conversation fetch.
                    tracing::warn!(?err, %user_id, "Failed to open insert channel");
                    Self::reconnect_delay().await;
                    continue;
                }
            };
            tracing::debug!(%user_id, "Insert channel established");
            while let Some(message) = stream.recv().await {
                listener.on_insert(message).await;
            }
            tracing::debug!(%user_id, "Insert channel lost");
            Self::reconnect_delay().await;
        }
    }

    async fn reconnect_delay() {
        let millis = rand::thread_rng().gen_range(1000..5000);
        sleep(Duration::from_millis(millis)).await;
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.main_task.abort();
    }
}
