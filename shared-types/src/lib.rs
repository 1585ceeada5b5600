use serde::{Deserialize, Serialize};

pub mod contact;
pub mod deal;
pub mod report;
pub mod window;

pub use contact::{Contact, UNKNOWN_FIRST_NAME};
pub use deal::{Deal, FollowUpStatus, NewDeal};
pub use report::{DealOutcome, ReconcileTally, RunSummary};
pub use window::{DateWindow, WindowError};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
