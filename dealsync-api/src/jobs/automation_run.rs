use actix_web::rt::task::JoinHandle;
use shared_types::{DateWindow, RunSummary, WindowError};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AutomationConfig;
use crate::integrations::crm::{CrmClient, CrmError};
use crate::integrations::hubspot::HubSpotClient;
use crate::integrations::mailer::{Mailer, NotifyError, SmtpMailer};
use crate::jobs::contact_fetcher::ContactFetcher;
use crate::jobs::deal_reconciler::DealReconciler;
use crate::jobs::report_notifier::ReportNotifier;

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("Invalid configuration")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("Failed to set up CRM client")]
    Crm(#[from] CrmError),

    #[error("Failed to send report")]
    Notify(#[from] NotifyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Empty,
    Reconciling,
    Reporting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No contacts in the window; nothing was reconciled or reported
    Empty,
    Done(RunSummary),
}

impl RunOutcome {
    pub fn log(&self) {
        match self {
            RunOutcome::Empty => tracing::info!("Run finished: no contacts to process"),
            RunOutcome::Done(summary) => tracing::info!(
                "Run finished: {} contacts, {} deals updated, {} created, {} failed",
                summary.total_contacts,
                summary.updated_deals,
                summary.new_deals,
                summary.failed_contacts
            ),
        }
    }
}

/// One fetch -> reconcile -> report pass
pub struct AutomationRun {
    fetcher: ContactFetcher,
    reconciler: DealReconciler,
    notifier: ReportNotifier,
    window: DateWindow,
    page_size: u32,
    history: Vec<RunState>,
}

impl AutomationRun {
    pub fn new(
        fetcher: ContactFetcher,
        reconciler: DealReconciler,
        notifier: ReportNotifier,
        window: DateWindow,
        page_size: u32,
    ) -> Self {
        Self {
            fetcher,
            reconciler,
            notifier,
            window,
            page_size,
            history: vec![RunState::Idle],
        }
    }

    pub fn from_config(
        config: &AutomationConfig,
        crm: Arc<dyn CrmClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, AutomationError> {
        let window = config.automation.date_window()?;
        let admin_email = config.email.admin_email.clone().unwrap_or_default();

        Ok(Self::new(
            ContactFetcher::new(crm.clone(), config.automation.max_pages),
            DealReconciler::new(crm, config.automation.max_concurrency),
            ReportNotifier::new(mailer, admin_email),
            window,
            config.automation.page_size,
        ))
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    /// Every state the run has passed through, starting with `Idle`
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!("Run state {:?} -> {:?}", self.state(), next);
        self.history.push(next);
    }

    pub async fn run(&mut self) -> Result<RunOutcome, AutomationError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("automation_run", %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<RunOutcome, AutomationError> {
        tracing::info!("Fetching contacts created in {}", self.window);
        self.transition(RunState::Fetching);

        let contacts = self
            .fetcher
            .fetch_contacts(&self.window, self.page_size)
            .await;

        if contacts.is_empty() {
            tracing::info!("No contacts found for {}", self.window);
            self.transition(RunState::Empty);
            return Ok(RunOutcome::Empty);
        }

        self.transition(RunState::Reconciling);
        let tally = self.reconciler.reconcile_deals(&contacts).await;
        let summary = RunSummary::new(contacts.len(), tally);
        debug_assert!(summary.is_consistent(), "inconsistent summary: {summary:?}");

        self.transition(RunState::Reporting);
        self.notifier.send_report(&summary).await?;

        self.transition(RunState::Done);
        tracing::info!("Automation completed successfully");
        Ok(RunOutcome::Done(summary))
    }
}

/// Validates `config`, wires the HubSpot client and SMTP mailer, and runs one pass
pub async fn run_automation(config: &AutomationConfig) -> Result<RunOutcome, AutomationError> {
    config.validate()?;

    let crm: Arc<dyn CrmClient> = Arc::new(HubSpotClient::new(&config.hubspot)?);
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::from_config(&config.email)?);

    AutomationRun::from_config(config, crm, mailer)?.run().await
}

/// Runs one pass on the actix system's local task set next to the HTTP server.
/// The outcome is logged; a failure never stops the server.
pub fn spawn_startup_run(
    config: AutomationConfig,
) -> JoinHandle<Result<RunOutcome, AutomationError>> {
    actix_web::rt::spawn(async move {
        let result = run_automation(&config).await;
        match &result {
            Ok(outcome) => outcome.log(),
            Err(e) => tracing::error!(
                error = e as &dyn std::error::Error,
                "Startup automation run failed"
            ),
        }
        result
    })
}
