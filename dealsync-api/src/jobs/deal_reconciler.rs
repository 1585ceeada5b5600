use futures::stream::{self, StreamExt};
use shared_types::{Contact, DealOutcome, FollowUpStatus, NewDeal, ReconcileTally};
use std::sync::Arc;

use crate::integrations::crm::{CrmClient, CrmError};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("deal lookup failed")]
    Lookup(#[source] CrmError),

    #[error("updating deal {deal_id} failed")]
    Update {
        deal_id: String,
        #[source]
        source: CrmError,
    },

    #[error("deal creation failed")]
    Create(#[source] CrmError),
}

/// Makes sure every contact has a deal: the first existing one is flagged
/// for review, otherwise a new one is opened.
pub struct DealReconciler {
    crm: Arc<dyn CrmClient>,
    max_concurrency: usize,
}

impl DealReconciler {
    pub fn new(crm: Arc<dyn CrmClient>, max_concurrency: usize) -> Self {
        Self {
            crm,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Failed contacts are logged and counted separately; they never stop the batch.
    pub async fn reconcile_deals(&self, contacts: &[Contact]) -> ReconcileTally {
        let mut tally = ReconcileTally::default();

        if self.max_concurrency == 1 {
            for contact in contacts {
                let outcome = self.reconcile_logged(contact).await;
                tally.record(&outcome);
            }
        } else {
            let outcomes: Vec<_> = stream::iter(contacts)
                .map(|contact| self.reconcile_logged(contact))
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
            for outcome in &outcomes {
                tally.record(outcome);
            }
        }

        tracing::info!(
            "Reconciled {} contacts: {} deals updated, {} created, {} failed",
            contacts.len(),
            tally.updated_deals,
            tally.new_deals,
            tally.failed_contacts
        );
        tally
    }

    async fn reconcile_logged(&self, contact: &Contact) -> Result<DealOutcome, ReconcileError> {
        let outcome = self.reconcile_contact(contact).await;
        match &outcome {
            Ok(DealOutcome::Updated { deal_id }) => {
                tracing::debug!("Contact {}: flagged deal {} for review", contact.id, deal_id)
            }
            Ok(DealOutcome::Created { deal_id }) => {
                tracing::debug!("Contact {}: created deal {}", contact.id, deal_id)
            }
            Err(e) => tracing::error!(
                error = e as &dyn std::error::Error,
                "Error processing deals for {}",
                contact.id
            ),
        }
        outcome
    }

    pub async fn reconcile_contact(&self, contact: &Contact) -> Result<DealOutcome, ReconcileError> {
        let deals = self
            .crm
            .find_deals_for_contact(&contact.id)
            .await
            .map_err(ReconcileError::Lookup)?;

        // provider order is not guaranteed; the first deal is taken as-is
        if let Some(existing) = deals.into_iter().next() {
            self.crm
                .update_follow_up_status(&existing.id, &FollowUpStatus::PendingReview)
                .await
                .map_err(|source| ReconcileError::Update {
                    deal_id: existing.id.clone(),
                    source,
                })?;
            return Ok(DealOutcome::Updated {
                deal_id: existing.id,
            });
        }

        let deal_id = self
            .crm
            .create_deal(&NewDeal::for_contact(contact))
            .await
            .map_err(ReconcileError::Create)?;
        Ok(DealOutcome::Created { deal_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{contact, CrmCall, FakeCrm};

    #[tokio::test]
    async fn test_existing_deal_gets_one_update_on_first_deal() {
        let crm = Arc::new(
            FakeCrm::new()
                .with_deal("1", "d-first")
                .with_deal("1", "d-second"),
        );
        let reconciler = DealReconciler::new(crm.clone(), 1);

        let outcome = reconciler.reconcile_contact(&contact("1", "Ada")).await.unwrap();

        assert_eq!(
            outcome,
            DealOutcome::Updated {
                deal_id: "d-first".to_string()
            }
        );
        assert_eq!(
            crm.calls(),
            vec![
                CrmCall::FindDeals("1".to_string()),
                CrmCall::UpdateDeal("d-first".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_deal_gets_one_create() {
        let crm = Arc::new(FakeCrm::new());
        let reconciler = DealReconciler::new(crm.clone(), 1);

        let outcome = reconciler.reconcile_contact(&contact("2", "Bo")).await.unwrap();

        assert_eq!(
            outcome,
            DealOutcome::Created {
                deal_id: "deal-for-2".to_string()
            }
        );
        assert_eq!(crm.count(|c| matches!(c, CrmCall::CreateDeal(_))), 1);
        assert_eq!(crm.count(|c| matches!(c, CrmCall::UpdateDeal(_))), 0);
    }

    #[tokio::test]
    async fn test_failure_skips_contact_and_continues() {
        let crm = Arc::new(
            FakeCrm::new()
                .failing_lookup("1")
                .with_deal("3", "d-3")
                .failing_update("d-3"),
        );
        let reconciler = DealReconciler::new(crm.clone(), 1);
        let contacts = vec![contact("1", "Ada"), contact("2", "Bo"), contact("3", "Cy")];

        let tally = reconciler.reconcile_deals(&contacts).await;

        assert_eq!(tally.updated_deals, 0);
        assert_eq!(tally.new_deals, 1);
        assert_eq!(tally.failed_contacts, 2);
        assert_eq!(
            crm.calls(),
            vec![
                CrmCall::FindDeals("1".to_string()),
                CrmCall::FindDeals("2".to_string()),
                CrmCall::CreateDeal("2".to_string()),
                CrmCall::FindDeals("3".to_string()),
                CrmCall::UpdateDeal("d-3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported() {
        let crm = Arc::new(FakeCrm::new().failing_lookup("9"));
        let reconciler = DealReconciler::new(crm, 1);

        let result = reconciler.reconcile_contact(&contact("9", "Ivy")).await;
        assert!(matches!(result, Err(ReconcileError::Lookup(_))));
    }

    #[tokio::test]
    async fn test_update_error_names_deal_once() {
        let crm = Arc::new(FakeCrm::new().with_deal("3", "d-3").failing_update("d-3"));
        let reconciler = DealReconciler::new(crm, 1);

        let error = reconciler
            .reconcile_contact(&contact("3", "Cy"))
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "updating deal d-3 failed");
        assert!(std::error::Error::source(&error).is_some());
    }

    #[tokio::test]
    async fn test_counts_match_contacts_without_failures() {
        for n in 0..6 {
            let mut crm = FakeCrm::new();
            for i in (0..n).filter(|i| i % 2 == 0) {
                crm = crm.with_deal(&i.to_string(), &format!("d-{}", i));
            }
            let crm = Arc::new(crm);
            let reconciler = DealReconciler::new(crm, 1);
            let contacts: Vec<_> = (0..n).map(|i| contact(&i.to_string(), "Pat")).collect();

            let tally = reconciler.reconcile_deals(&contacts).await;

            assert_eq!(tally.updated_deals + tally.new_deals, n);
            assert_eq!(tally.updated_deals, (n + 1) / 2);
            assert_eq!(tally.failed_contacts, 0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_pool_gives_same_counts() {
        let crm = Arc::new(
            FakeCrm::new()
                .with_deal("0", "d-0")
                .with_deal("4", "d-4")
                .failing_create("2"),
        );
        let reconciler = DealReconciler::new(crm.clone(), 4);
        let contacts: Vec<_> = (0..8).map(|i| contact(&i.to_string(), "Pat")).collect();

        let tally = reconciler.reconcile_deals(&contacts).await;

        assert_eq!(tally.updated_deals, 2);
        assert_eq!(tally.new_deals, 5);
        assert_eq!(tally.failed_contacts, 1);
        assert_eq!(crm.count(|c| matches!(c, CrmCall::FindDeals(_))), 8);
    }
}
