use chrono::{DateTime, Utc};
use mofscreen_core::model::UnitId;
use mofscreen_scheduler::{SchedJobId, SchedState, Scheduler};

/// One scheduler job competing to be a unit's surviving job.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub job_id: SchedJobId,
    pub state: SchedState,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub kept: Option<SchedJobId>,
    pub cancelled: Vec<SchedJobId>,
}

/// Pick the job that survives duplicate resolution.
///
/// Queued jobs outrank running ones: a queued duplicate will start from
/// scratch with a clean view of the markers, while the running ones race each
/// other. Among queued jobs the oldest wins, among running jobs the newest.
/// When every candidate has already left the queue, the newest one survives
/// so the unit keeps an active row carrying its completion evidence. Ties
/// fall back to the job id so the outcome is deterministic.
pub fn pick_survivor(candidates: &[Candidate]) -> Option<&Candidate> {
    let queued: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.state == SchedState::Queued)
        .collect();
    if !queued.is_empty() {
        return queued.into_iter().min_by_key(|c| {
            (
                c.submitted_at.unwrap_or(DateTime::<Utc>::MAX_UTC),
                c.job_id.clone(),
            )
        });
    }

    let running = candidates
        .iter()
        .filter(|c| c.state == SchedState::Running)
        .max_by_key(|c| {
            (
                c.submitted_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
                c.job_id.clone(),
            )
        });
    if running.is_some() {
        return running;
    }

    candidates.iter().max_by_key(|c| {
        (
            c.submitted_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
            c.job_id.clone(),
        )
    })
}

/// Cancel every candidate except the survivor. Cancellation is best effort; a
/// loser that refuses to die is retried on the next polling pass.
pub fn resolve<S: Scheduler>(unit: &UnitId, candidates: &[Candidate], scheduler: &S) -> Resolution {
    if candidates.len() < 2 {
        return Resolution {
            kept: candidates.first().map(|c| c.job_id.clone()),
            cancelled: Vec::new(),
        };
    }

    let survivor = pick_survivor(candidates).map(|c| c.job_id.clone());
    let mut cancelled = Vec::new();

    for candidate in candidates {
        if Some(&candidate.job_id) == survivor.as_ref() {
            continue;
        }
        tracing::info!(
            "cancelling duplicate job {} for {} (keeping {:?})",
            candidate.job_id,
            unit,
            survivor
        );
        match scheduler.cancel(&candidate.job_id) {
            Ok(true) => cancelled.push(candidate.job_id.clone()),
            Ok(false) => {
                tracing::warn!(
                    "scheduler refused to cancel duplicate job {} for {}; will retry",
                    candidate.job_id,
                    unit
                );
            }
            Err(err) => {
                tracing::warn!(
                    "failed to cancel duplicate job {} for {}: {}; will retry",
                    candidate.job_id,
                    unit,
                    err
                );
            }
        }
    }

    Resolution {
        kept: survivor,
        cancelled,
    }
}
