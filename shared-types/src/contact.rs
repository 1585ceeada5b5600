use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name used when the CRM record has no first name
pub const UNKNOWN_FIRST_NAME: &str = "Unknown";

/// A CRM contact, read-only to this system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Builds a contact, falling back to "Unknown" for a missing or empty first
    /// name. Any other value is kept as the CRM returned it.
    pub fn new(
        id: impl Into<String>,
        first_name: Option<String>,
        email: Option<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        let first_name = first_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_FIRST_NAME.to_string());

        Self {
            id: id.into(),
            first_name,
            email: email.unwrap_or_default(),
            created_at,
        }
    }
}
