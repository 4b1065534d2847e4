mod duplicates;
mod error;
mod reconcile;
mod runloop;
mod store;
mod submit;

pub use duplicates::{pick_survivor, resolve, Candidate, Resolution};
pub use error::{Result, TrackerError};
pub use reconcile::{apply, derive_status, gather_evidence, StepEvidence};
pub use runloop::CampaignTracker;
pub use store::{JobRecord, TrackingStore};
pub use submit::{campaign_units, SubmissionController};
