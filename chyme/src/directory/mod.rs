use std::sync::Arc;

use chyme_backend::Backend;
use chyme_types::{Contact, ContactId};

use crate::error::SyncError;

/// Read-only view of the known contacts. Profiles are owned by the backend;
/// the only way a contact changes during a session is a refetch.
pub struct ContactDirectory {
    backend: Arc<dyn Backend>,
}

impl ContactDirectory {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// All contacts except `exclude`, sorted by display name ascending.
    pub async fn list_contacts(&self, exclude: ContactId) -> Result<Vec<Contact>, SyncError> {
        let mut contacts = self.backend.list_contacts(exclude).await.map_err(|err| {
            tracing::warn!(?err, "Failed to fetch contact directory");
            SyncError::BackendUnavailable(err)
        })?;
        sort_by_name(&mut contacts);
        Ok(contacts)
    }
}

pub(crate) fn sort_by_name(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
}
