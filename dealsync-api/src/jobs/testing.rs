//! In-memory CRM and mailer used by the job tests

use async_trait::async_trait;
use shared_types::{Contact, DateWindow, Deal, FollowUpStatus, NewDeal};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::integrations::crm::{ContactPage, CrmClient, CrmError};
use crate::integrations::mailer::{Mailer, NotifyError, OutgoingEmail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmCall {
    SearchContacts { after: Option<String> },
    FindDeals(String),
    UpdateDeal(String),
    CreateDeal(String),
}

fn simulated_failure() -> CrmError {
    CrmError::Status {
        status: 503,
        body: "simulated failure".to_string(),
    }
}

#[derive(Default)]
pub struct FakeCrm {
    pages: Vec<ContactPage>,
    fail_search: bool,
    deals: HashMap<String, Vec<Deal>>,
    failing_lookups: HashSet<String>,
    failing_updates: HashSet<String>,
    failing_creates: HashSet<String>,
    calls: Mutex<Vec<CrmCall>>,
}

impl FakeCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `contacts` as one page per chunk of `per_page`
    pub fn with_contacts(mut self, contacts: Vec<Contact>, per_page: usize) -> Self {
        let chunks: Vec<Vec<Contact>> = contacts.chunks(per_page).map(|c| c.to_vec()).collect();
        let last = chunks.len().saturating_sub(1);
        self.pages = chunks
            .into_iter()
            .enumerate()
            .map(|(i, contacts)| ContactPage {
                contacts,
                next_after: (i < last).then(|| (i + 1).to_string()),
            })
            .collect();
        self
    }

    pub fn with_pages(mut self, pages: Vec<ContactPage>) -> Self {
        self.pages = pages;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn with_deal(mut self, contact_id: &str, deal_id: &str) -> Self {
        self.deals
            .entry(contact_id.to_string())
            .or_default()
            .push(deal(deal_id, contact_id));
        self
    }

    pub fn failing_lookup(mut self, contact_id: &str) -> Self {
        self.failing_lookups.insert(contact_id.to_string());
        self
    }

    pub fn failing_update(mut self, deal_id: &str) -> Self {
        self.failing_updates.insert(deal_id.to_string());
        self
    }

    pub fn failing_create(mut self, contact_id: &str) -> Self {
        self.failing_creates.insert(contact_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<CrmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&CrmCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: CrmCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn search_contacts(
        &self,
        _window: &DateWindow,
        _page_size: u32,
        after: Option<String>,
    ) -> Result<ContactPage, CrmError> {
        self.record(CrmCall::SearchContacts {
            after: after.clone(),
        });
        if self.fail_search {
            return Err(simulated_failure());
        }

        let index = match after {
            Some(cursor) => cursor.parse::<usize>().unwrap(),
            None => 0,
        };
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn find_deals_for_contact(&self, contact_id: &str) -> Result<Vec<Deal>, CrmError> {
        self.record(CrmCall::FindDeals(contact_id.to_string()));
        if self.failing_lookups.contains(contact_id) {
            return Err(simulated_failure());
        }
        Ok(self.deals.get(contact_id).cloned().unwrap_or_default())
    }

    async fn update_follow_up_status(
        &self,
        deal_id: &str,
        _status: &FollowUpStatus,
    ) -> Result<(), CrmError> {
        self.record(CrmCall::UpdateDeal(deal_id.to_string()));
        if self.failing_updates.contains(deal_id) {
            return Err(simulated_failure());
        }
        Ok(())
    }

    async fn create_deal(&self, deal: &NewDeal) -> Result<String, CrmError> {
        let contact_id = deal.associated_contact_id.clone();
        self.record(CrmCall::CreateDeal(contact_id.clone()));
        if self.failing_creates.contains(&contact_id) {
            return Err(simulated_failure());
        }
        Ok(format!("deal-for-{}", contact_id))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    fail: bool,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::MissingCredentials);
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn contact(id: &str, first_name: &str) -> Contact {
    Contact::new(
        id,
        Some(first_name.to_string()),
        Some(format!("{}@example.com", first_name.to_lowercase())),
        None,
    )
}

pub fn deal(id: &str, contact_id: &str) -> Deal {
    Deal {
        id: id.to_string(),
        name: format!("Deal {}", id),
        pipeline: "default".to_string(),
        stage: "appointmentscheduled".to_string(),
        amount: Some(1000.0),
        associated_contact_id: contact_id.to_string(),
        follow_up_status: None,
    }
}
