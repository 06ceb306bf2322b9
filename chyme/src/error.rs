use chyme_backend::BackendError;

// Failure taxonomy of the engine. Nothing here is fatal: reads degrade to an
// empty retryable view, writes roll back their optimistic entry, and the
// realtime channel retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("backend unavailable")]
    BackendUnavailable(#[source] BackendError),
    #[error("message send failed")]
    SendFailed(#[source] BackendError),
    #[error("no contact selected")]
    NoContactSelected,
}
