pub mod automation_run;
pub mod contact_fetcher;
pub mod deal_reconciler;
pub mod report_notifier;

#[cfg(test)]
pub(crate) mod testing;

pub use automation_run::{
    run_automation, spawn_startup_run, AutomationError, AutomationRun, RunOutcome, RunState,
};
