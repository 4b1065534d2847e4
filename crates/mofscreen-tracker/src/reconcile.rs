use crate::store::JobRecord;
use chrono::{DateTime, Utc};
use mofscreen_core::model::{JobState, StepDef, UnitId};
use mofscreen_pipeline::{check_step, StepCompletion, UnitLayout};
use mofscreen_scheduler::SchedState;
use std::path::Path;

/// On-disk evidence for one step of one unit, snapshotted at poll time.
#[derive(Debug, Clone)]
pub struct StepEvidence {
    pub name: String,
    pub required: bool,
    pub completion: StepCompletion,
    pub dir_exists: bool,
}

/// Snapshot completion evidence for every declared step of a unit.
pub fn gather_evidence(results_dir: &Path, unit: &UnitId, steps: &[StepDef]) -> Vec<StepEvidence> {
    let layout = UnitLayout::new(results_dir, unit);
    steps
        .iter()
        .map(|step| StepEvidence {
            name: step.name.clone(),
            required: step.required,
            completion: check_step(&layout, step),
            dir_exists: layout.step_dir(step).exists(),
        })
        .collect()
}

/// Derive the unit's coarse status and stage label from scheduler state plus
/// step evidence. Pure projection: calling it twice on the same inputs gives
/// the same answer.
///
/// Precedence: queued wins over any stale evidence, running reports the
/// in-flight step, and once the job has left the queue the markers alone
/// decide between COMPLETED, PARTIALLY_COMPLETE and FAILED.
pub fn derive_status(evidence: &[StepEvidence], sched: Option<SchedState>) -> (JobState, String) {
    let all_completed = !evidence.is_empty()
        && evidence.iter().all(|e| e.completion.is_completed());

    match sched {
        Some(SchedState::Queued) => (JobState::Pending, "pending".to_string()),
        Some(SchedState::Running) => {
            if all_completed {
                (JobState::Running, "completed".to_string())
            } else {
                (JobState::Running, current_stage(evidence))
            }
        }
        Some(SchedState::Finished) | None => {
            if all_completed {
                return (JobState::Completed, "completed".to_string());
            }

            let completed: Vec<&str> = evidence
                .iter()
                .filter(|e| e.completion.is_completed())
                .map(|e| e.name.as_str())
                .collect();

            if completed.is_empty() {
                let first = evidence
                    .iter()
                    .find(|e| e.required)
                    .or_else(|| evidence.first())
                    .map(|e| e.name.as_str())
                    .unwrap_or("unknown");
                (JobState::Failed, format!("{} (failed)", first))
            } else {
                (
                    JobState::PartiallyComplete,
                    format!("partially_complete (completed: {})", completed.join(", ")),
                )
            }
        }
    }
}

/// The step a running job is presumably working on: the furthest step whose
/// directory exists without a success marker, or the first not-yet-completed
/// step when nothing has been touched yet.
fn current_stage(evidence: &[StepEvidence]) -> String {
    evidence
        .iter()
        .rev()
        .find(|e| e.dir_exists && !e.completion.is_completed())
        .or_else(|| evidence.iter().find(|e| !e.completion.is_completed()))
        .map(|e| e.name.clone())
        .unwrap_or_else(|| "completed".to_string())
}

/// Fold a freshly derived status into a record. Terminal states never
/// regress, and both timestamps are set exactly once.
pub fn apply(
    record: &mut JobRecord,
    status: JobState,
    stage: String,
    sched_submit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    if record.status.is_terminal() && !status.is_terminal() {
        tracing::debug!(
            "keeping terminal status {} for {} despite derived {}",
            record.status,
            record.unit,
            status
        );
        return;
    }

    record.status = status;
    record.stage = stage;

    if record.submitted_at.is_none() {
        record.submitted_at = sched_submit.or(Some(now));
    }
    if record.completed_at.is_none() && status.is_terminal() {
        record.completed_at = Some(now);
    }
}
