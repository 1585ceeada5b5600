use shared_types::RunSummary;
use std::sync::Arc;

use crate::integrations::mailer::{Mailer, NotifyError, OutgoingEmail};

pub const REPORT_SUBJECT: &str = "CRM Automation Report";

pub struct ReportNotifier {
    mailer: Arc<dyn Mailer>,
    admin_email: String,
}

impl ReportNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, admin_email: impl Into<String>) -> Self {
        Self {
            mailer,
            admin_email: admin_email.into(),
        }
    }

    /// Delivery errors are returned to the caller untouched
    pub async fn send_report(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        let email = OutgoingEmail {
            to: self.admin_email.clone(),
            subject: REPORT_SUBJECT.to_string(),
            body: compose_report(summary),
        };

        self.mailer.send(&email).await?;
        tracing::info!("Sent automation report to {}", self.admin_email);
        Ok(())
    }
}

pub fn compose_report(summary: &RunSummary) -> String {
    format!(
        "Total contacts processed: {}\nDeals updated: {}\nNew deals created: {}\n",
        summary.total_contacts, summary.updated_deals, summary.new_deals
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::RecordingMailer;

    #[test]
    fn test_compose_report() {
        let summary = RunSummary {
            total_contacts: 2,
            updated_deals: 1,
            new_deals: 1,
            failed_contacts: 0,
        };

        assert_eq!(
            compose_report(&summary),
            "Total contacts processed: 2\nDeals updated: 1\nNew deals created: 1\n"
        );
    }

    #[tokio::test]
    async fn test_send_report_to_admin() {
        let mailer = Arc::new(RecordingMailer::new());
        let notifier = ReportNotifier::new(mailer.clone(), "admin@example.com");

        notifier.send_report(&RunSummary::default()).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert_eq!(sent[0].subject, "CRM Automation Report");
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let notifier = ReportNotifier::new(Arc::new(RecordingMailer::failing()), "admin@example.com");
        assert!(notifier.send_report(&RunSummary::default()).await.is_err());
    }
}
