use serde::{Deserialize, Serialize};

/// What the reconciler did for a single contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DealOutcome {
    Updated { deal_id: String },
    Created { deal_id: String },
}

/// Counters accumulated while reconciling a batch of contacts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileTally {
    pub updated_deals: usize,
    pub new_deals: usize,
    pub failed_contacts: usize,
}

impl ReconcileTally {
    pub fn record<E>(&mut self, outcome: &Result<DealOutcome, E>) {
        match outcome {
            Ok(DealOutcome::Updated { .. }) => self.updated_deals += 1,
            Ok(DealOutcome::Created { .. }) => self.new_deals += 1,
            Err(_) => self.failed_contacts += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.updated_deals + self.new_deals + self.failed_contacts
    }
}

/// Per-run totals handed to the report notifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_contacts: usize,
    pub updated_deals: usize,
    pub new_deals: usize,
    pub failed_contacts: usize,
}

impl RunSummary {
    pub fn new(total_contacts: usize, tally: ReconcileTally) -> Self {
        Self {
            total_contacts,
            updated_deals: tally.updated_deals,
            new_deals: tally.new_deals,
            failed_contacts: tally.failed_contacts,
        }
    }

    /// Each contact yields at most one deal outcome
    pub fn is_consistent(&self) -> bool {
        self.updated_deals + self.new_deals <= self.total_contacts
            && self.updated_deals + self.new_deals + self.failed_contacts == self.total_contacts
    }
}
