use crate::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One schedulable unit of work: a batch, or a batch crossed with a
/// parameter combination in sweep mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UnitId {
    pub batch_id: u32,
    pub param_id: Option<u32>,
}

impl UnitId {
    pub fn batch(batch_id: u32) -> Self {
        Self {
            batch_id,
            param_id: None,
        }
    }

    pub fn with_param(batch_id: u32, param_id: u32) -> Self {
        Self {
            batch_id,
            param_id: Some(param_id),
        }
    }

    /// Directory name under the results root; identical to the display form.
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param_id {
            Some(p) => write!(f, "batch_{}_param_{}", self.batch_id, p),
            None => write!(f, "batch_{}", self.batch_id),
        }
    }
}

impl FromStr for UnitId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("batch_")
            .ok_or_else(|| DomainError::InvalidUnitId(s.to_string()))?;

        match rest.split_once("_param_") {
            Some((b, p)) => {
                let batch_id = b
                    .parse()
                    .map_err(|_| DomainError::InvalidUnitId(s.to_string()))?;
                let param_id = p
                    .parse()
                    .map_err(|_| DomainError::InvalidUnitId(s.to_string()))?;
                Ok(UnitId::with_param(batch_id, param_id))
            }
            None => {
                let batch_id = rest
                    .parse()
                    .map_err(|_| DomainError::InvalidUnitId(s.to_string()))?;
                Ok(UnitId::batch(batch_id))
            }
        }
    }
}

/// Coarse, externally visible status of a unit's job.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    PartiallyComplete,
    Cancelled,
}

impl JobState {
    /// Terminal states never regress to PENDING/RUNNING during reconciliation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::PartiallyComplete
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::PartiallyComplete => "PARTIALLY_COMPLETE",
            JobState::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobState::Pending),
            "RUNNING" => Ok(JobState::Running),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            "PARTIALLY_COMPLETE" => Ok(JobState::PartiallyComplete),
            "CANCELLED" => Ok(JobState::Cancelled),
            other => Err(DomainError::InvalidJobState(other.to_string())),
        }
    }
}

/// Static, config-derived descriptor of one pipeline stage. Shared read-only
/// across all units once the configuration is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub name: String,

    /// Executable invoked as `<command> <unit_id> <input> <out_dir> [template]`.
    pub command: PathBuf,

    /// A required step's failure halts the unit's workflow; an optional
    /// step's failure does not.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Names of directly declared prerequisite steps (earlier in the list).
    #[serde(default)]
    pub after: Vec<String>,

    /// Run-file template handed to the step as its fourth argument.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

fn default_required() -> bool {
    true
}
