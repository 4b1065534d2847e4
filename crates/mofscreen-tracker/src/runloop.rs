use crate::duplicates::{self, Candidate};
use crate::error::Result;
use crate::reconcile::{apply, derive_status, gather_evidence};
use crate::store::TrackingStore;
use crate::submit::SubmissionController;
use chrono::Utc;
use mofscreen_core::config::Config;
use mofscreen_core::model::JobState;
use mofscreen_pipeline::StepCompletion;
use mofscreen_scheduler::{SchedJob, SchedJobId, SchedState, Scheduler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The single-threaded polling core: query the scheduler, prune duplicate
/// jobs, reconcile every tracked unit, persist the table, submit new work,
/// sleep, repeat.
pub struct CampaignTracker<'a, S: Scheduler> {
    config: &'a Config,
    scheduler: &'a S,
}

impl<'a, S: Scheduler> CampaignTracker<'a, S> {
    pub fn new(config: &'a Config, scheduler: &'a S) -> Self {
        Self { config, scheduler }
    }

    /// One reconciliation pass over the whole table. Does not submit and
    /// does not save; callers decide when to persist.
    pub fn poll_once(&self, store: &mut TrackingStore) -> Result<()> {
        let ids = store.live_job_ids();
        let jobs = self.scheduler.query(&ids)?;

        self.resolve_duplicates(store, &jobs);
        self.reconcile_all(store, &jobs);
        Ok(())
    }

    fn resolve_duplicates(&self, store: &mut TrackingStore, jobs: &HashMap<SchedJobId, SchedJob>) {
        for unit in store.units() {
            let live = store.live_rows(&unit);
            if live.len() < 2 {
                continue;
            }

            let candidates: Vec<Candidate> = live
                .iter()
                .filter_map(|&i| {
                    let row = &store.rows()[i];
                    let job_id = row.job_id.clone()?;
                    let sched = jobs.get(&job_id);
                    Some(Candidate {
                        state: sched.map(|j| j.state).unwrap_or(SchedState::Finished),
                        submitted_at: sched
                            .and_then(|j| j.submitted_at)
                            .or(row.submitted_at),
                        job_id,
                    })
                })
                .collect();

            let resolution = duplicates::resolve(&unit, &candidates, self.scheduler);
            for &i in &live {
                let row = store.row_mut(i);
                if let Some(job_id) = &row.job_id {
                    if resolution.cancelled.contains(job_id) {
                        row.status = JobState::Cancelled;
                        row.stage = "cancelled (duplicate)".to_string();
                    }
                }
            }
        }
    }

    fn reconcile_all(&self, store: &mut TrackingStore, jobs: &HashMap<SchedJobId, SchedJob>) {
        let results_dir = self.config.results_dir();

        for unit in store.units() {
            let Some(record) = store.active(&unit) else {
                continue;
            };

            let sched = record.job_id.as_ref().and_then(|id| jobs.get(id));
            let sched_state = sched.map(|j| j.state);
            let sched_submit = sched.and_then(|j| j.submitted_at);
            let was_pending = record.status == JobState::Pending;

            let evidence = gather_evidence(&results_dir, &unit, &self.config.steps);

            // A just-submitted job can be momentarily invisible to the
            // scheduler query. With no evidence on disk either, keep the
            // PENDING row instead of deriving a failure from silence.
            let untouched = evidence
                .iter()
                .all(|e| matches!(e.completion, StepCompletion::New));
            if sched_state.is_none() && untouched && was_pending {
                continue;
            }

            let (status, stage) = derive_status(&evidence, sched_state);
            if let Some(record) = store.active_mut(&unit) {
                apply(record, status, stage, sched_submit, Utc::now());
            }
        }
    }

    /// Poll-and-submit until every unit in the controller's scope reaches a
    /// terminal state, or `stop` is raised.
    pub fn run(
        &self,
        store: &mut TrackingStore,
        controller: &SubmissionController<'a, S>,
        stop: &AtomicBool,
    ) -> Result<()> {
        let interval = Duration::from_secs(self.config.limits.poll_interval_secs);

        loop {
            self.poll_once(store)?;
            controller.submit_pending(store)?;
            store.save()?;

            let units = controller.scoped_units()?;
            if units.is_empty() {
                tracing::warn!("no batches found; nothing to track");
                break;
            }
            if units.iter().all(|u| {
                store
                    .active(u)
                    .map(|r| r.status.is_terminal())
                    .unwrap_or(false)
            }) {
                tracing::info!("all {} units reached a terminal state", units.len());
                break;
            }

            if !sleep_interruptible(interval, stop) {
                tracing::info!("interrupted; status table saved");
                break;
            }
        }

        Ok(())
    }
}

/// Sleep in one-second slices so an interrupt is honored promptly. Returns
/// false when the stop flag was raised.
fn sleep_interruptible(total: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(Duration::from_secs(1));
        std::thread::sleep(slice);
        remaining -= slice;
    }
    !stop.load(Ordering::Relaxed)
}
