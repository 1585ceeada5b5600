use async_trait::async_trait;
use shared_types::{Contact, DateWindow, Deal, FollowUpStatus, NewDeal};

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("CRM transport error")]
    Transport(#[from] reqwest::Error),

    #[error("CRM returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected CRM response")]
    Decode(#[from] serde_json::Error),

    #[error("CRM credentials are not configured")]
    MissingCredentials,
}

/// One page of a contact search plus the cursor for the next page, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    pub next_after: Option<String>,
}

/// The four CRM calls a run needs
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Contacts whose creation date falls inside `window`, one page at a time
    async fn search_contacts(
        &self,
        window: &DateWindow,
        page_size: u32,
        after: Option<String>,
    ) -> Result<ContactPage, CrmError>;

    /// Deals associated with the contact, in provider order
    async fn find_deals_for_contact(&self, contact_id: &str) -> Result<Vec<Deal>, CrmError>;

    async fn update_follow_up_status(
        &self,
        deal_id: &str,
        status: &FollowUpStatus,
    ) -> Result<(), CrmError>;

    /// Creates the deal and associates it with its contact; returns the new deal id
    async fn create_deal(&self, deal: &NewDeal) -> Result<String, CrmError>;
}
