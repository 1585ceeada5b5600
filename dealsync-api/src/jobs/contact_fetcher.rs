use shared_types::{Contact, DateWindow};
use std::sync::Arc;

use crate::integrations::crm::{CrmClient, CrmError};

pub struct ContactFetcher {
    crm: Arc<dyn CrmClient>,
    max_pages: u32,
}

impl ContactFetcher {
    pub fn new(crm: Arc<dyn CrmClient>, max_pages: u32) -> Self {
        Self {
            crm,
            max_pages: max_pages.max(1),
        }
    }

    /// Contacts created inside `window`, in provider order. Any failed page
    /// is logged and the whole fetch degrades to an empty result.
    pub async fn fetch_contacts(&self, window: &DateWindow, page_size: u32) -> Vec<Contact> {
        match self.try_fetch_contacts(window, page_size).await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(
                    error = &e as &dyn std::error::Error,
                    "Error fetching contacts for {}",
                    window
                );
                Vec::new()
            }
        }
    }

    pub async fn try_fetch_contacts(
        &self,
        window: &DateWindow,
        page_size: u32,
    ) -> Result<Vec<Contact>, CrmError> {
        let mut contacts = Vec::new();
        let mut after: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = self
                .crm
                .search_contacts(window, page_size, after.take())
                .await?;
            pages += 1;
            contacts.extend(page.contacts);

            match page.next_after {
                Some(next) if pages < self.max_pages => after = Some(next),
                Some(_) => {
                    tracing::warn!(
                        "Stopped paging contacts after {} pages ({} contacts); raise automation.max_pages to fetch more",
                        pages,
                        contacts.len()
                    );
                    break;
                }
                None => break,
            }
        }

        tracing::info!("Fetched {} contacts across {} pages", contacts.len(), pages);
        Ok(contacts)
    }
}
