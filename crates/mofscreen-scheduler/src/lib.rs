mod error;
mod script;
mod slurm;

pub use error::{Result, SchedulerError};
pub use script::JobScriptBuilder;
pub use slurm::SlurmScheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Scheduler-assigned job identifier.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SchedJobId(pub String);

impl fmt::Display for SchedJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SchedJobId {
    fn from(s: String) -> Self {
        SchedJobId(s)
    }
}

/// The three states the orchestration core distinguishes; every concrete
/// scheduler state maps onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedState {
    Queued,
    Running,
    /// Left the queue for any reason (completed, failed, cancelled, timeout).
    Finished,
}

#[derive(Debug, Clone)]
pub struct SchedJob {
    pub state: SchedState,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// The external scheduler collaborator. Implementations need only these
/// three operations.
pub trait Scheduler {
    fn submit(&self, script: &Path) -> Result<SchedJobId>;

    /// Query the given jobs; ids absent from the returned map have left the
    /// queue and are no longer known to the scheduler.
    fn query(&self, ids: &[SchedJobId]) -> Result<HashMap<SchedJobId, SchedJob>>;

    /// Best-effort cancellation; `false` means the scheduler refused.
    fn cancel(&self, id: &SchedJobId) -> Result<bool>;
}
