use serde::{Deserialize, Serialize};

use super::{ContactId, DateTime};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    // Display name obtained from the directory.
    pub name: String,
    pub avatar_url: Option<String>,
    pub online: bool,
    pub last_seen: Option<DateTime>,
    // Directory category tag (business, personal, ...).
    pub category: Option<String>,
}

impl Contact {
    pub fn new(id: ContactId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_url: None,
            online: false,
            last_seen: None,
            category: None,
        }
    }
}
