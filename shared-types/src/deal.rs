use serde::{Deserialize, Serialize};

use crate::contact::Contact;

pub const DEFAULT_PIPELINE: &str = "default";
pub const DEFAULT_DEAL_STAGE: &str = "appointmentscheduled";
pub const DEFAULT_DEAL_AMOUNT: f64 = 1000.0;

/// Follow-up state of a deal, stored in the `follow_up_status` CRM property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FollowUpStatus {
    PendingReview,
    /// Any value written by someone else; kept verbatim
    Other(String),
}

impl FollowUpStatus {
    pub fn as_str(&self) -> &str {
        match self {
            FollowUpStatus::PendingReview => "pending_review",
            FollowUpStatus::Other(value) => value.as_str(),
        }
    }
}

impl From<String> for FollowUpStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending_review" => FollowUpStatus::PendingReview,
            _ => FollowUpStatus::Other(value),
        }
    }
}

impl From<FollowUpStatus> for String {
    fn from(status: FollowUpStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for FollowUpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CRM deal associated with a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub pipeline: String,
    pub stage: String,
    pub amount: Option<f64>,
    pub associated_contact_id: String,
    pub follow_up_status: Option<FollowUpStatus>,
}

/// Property set for a deal that does not exist yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeal {
    pub name: String,
    pub pipeline: String,
    pub stage: String,
    pub amount: f64,
    pub associated_contact_id: String,
}

impl NewDeal {
    /// The deal opened for a contact that has none yet
    pub fn for_contact(contact: &Contact) -> Self {
        Self {
            name: format!("New Deal for {}", contact.first_name),
            pipeline: DEFAULT_PIPELINE.to_string(),
            stage: DEFAULT_DEAL_STAGE.to_string(),
            amount: DEFAULT_DEAL_AMOUNT,
            associated_contact_id: contact.id.clone(),
        }
    }
}
