pub mod config;
pub mod handlers;
pub mod helpers;
pub mod integrations;
pub mod jobs;

pub use config::AutomationConfig;
pub use jobs::{run_automation, AutomationError, RunOutcome};
