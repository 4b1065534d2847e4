use chrono::{DateTime, Utc};
use mofscreen_core::config::Config;
use mofscreen_core::model::{JobState, UnitId};
use mofscreen_scheduler::{SchedJob, SchedJobId, SchedState, Scheduler};
use mofscreen_tracker::{CampaignTracker, JobRecord, SubmissionController, TrackingStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

/// In-memory scheduler: jobs and states are scripted by the test, and
/// submissions/cancellations are recorded for assertions.
#[derive(Default)]
struct StaticScheduler {
    jobs: Mutex<HashMap<SchedJobId, SchedJob>>,
    cancelled: Mutex<Vec<SchedJobId>>,
    next_id: Mutex<u64>,
}

impl StaticScheduler {
    fn set_job(&self, id: &str, state: SchedState, submitted_at: Option<DateTime<Utc>>) {
        self.jobs.lock().unwrap().insert(
            SchedJobId(id.to_string()),
            SchedJob {
                state,
                submitted_at,
            },
        );
    }

    fn cancelled_ids(&self) -> Vec<String> {
        self.cancelled
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.0.clone())
            .collect()
    }
}

impl Scheduler for StaticScheduler {
    fn submit(&self, _script: &Path) -> mofscreen_scheduler::Result<SchedJobId> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = SchedJobId(format!("{}", 1000 + *next));
        self.jobs.lock().unwrap().insert(
            id.clone(),
            SchedJob {
                state: SchedState::Queued,
                submitted_at: Some(Utc::now()),
            },
        );
        Ok(id)
    }

    fn query(
        &self,
        ids: &[SchedJobId],
    ) -> mofscreen_scheduler::Result<HashMap<SchedJobId, SchedJob>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| jobs.get(id).map(|j| (id.clone(), j.clone())))
            .collect())
    }

    fn cancel(&self, id: &SchedJobId) -> mofscreen_scheduler::Result<bool> {
        self.cancelled.lock().unwrap().push(id.clone());
        self.jobs.lock().unwrap().remove(id);
        Ok(true)
    }
}

struct Fixture {
    _dir: TempDir,
    config: Config,
    config_path: PathBuf,
}

impl Fixture {
    fn new(batch_count: u32) -> Self {
        let dir = tempdir().unwrap();
        let mut steps = String::new();
        for name in ["partial_charge", "simulation", "analysis"] {
            let exe = dir.path().join(format!("{}.sh", name));
            fs_err::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
            steps.push_str(&format!(
                "[[step]]\nname = \"{}\"\ncommand = \"{}\"\n\n",
                name,
                exe.display()
            ));
        }

        let toml = format!(
            r#"
[project]
name = "screen"

[paths]
output_dir = "{out}"

[slurm]
account = "a"
partition = "p"
time = "1:00:00"
nodes = 1

[limits]
max_concurrent_jobs = 2

{steps}
"#,
            out = dir.path().display(),
            steps = steps,
        );
        let config_path = dir.path().join("campaign.toml");
        fs_err::write(&config_path, toml).unwrap();
        let config = Config::load(&config_path).unwrap();
        config.ensure_layout().unwrap();

        for batch in 1..=batch_count {
            fs_err::write(
                config.batches_dir().join(format!("batch_{}.txt", batch)),
                "/db/MOF-1.cif\n",
            )
            .unwrap();
        }

        Fixture {
            _dir: dir,
            config,
            config_path,
        }
    }

    fn store(&self) -> TrackingStore {
        TrackingStore::open(&TrackingStore::default_path(&self.config)).unwrap()
    }

    fn write_marker(&self, unit: UnitId, step: &str, content: &str) {
        let dir = self.config.results_dir().join(unit.dir_name()).join(step);
        fs_err::create_dir_all(&dir).unwrap();
        fs_err::write(dir.join("exit_status.log"), content).unwrap();
    }

    fn running_record(&self, unit: UnitId, job: &str) -> JobRecord {
        let mut record = JobRecord::pending(unit, SchedJobId(job.to_string()), Utc::now());
        record.status = JobState::Running;
        record.stage = "partial_charge".to_string();
        record
    }
}

#[test]
fn test_all_steps_done_reconciles_to_completed() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);
    for step in ["partial_charge", "simulation", "analysis"] {
        fx.write_marker(unit, step, "0\n");
    }

    let mut store = fx.store();
    store.push(fx.running_record(unit, "101"));

    // Job 101 has left the queue: the query returns nothing for it.
    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();

    let record = store.active(&unit).unwrap();
    assert_eq!(record.status, JobState::Completed);
    assert_eq!(record.stage, "completed");
    assert!(record.completed_at.is_some());
}

#[test]
fn test_mid_chain_failure_reconciles_to_partially_complete() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);
    fx.write_marker(unit, "partial_charge", "0\n");
    fx.write_marker(unit, "simulation", "1\n");

    let mut store = fx.store();
    store.push(fx.running_record(unit, "101"));

    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();

    let record = store.active(&unit).unwrap();
    assert_eq!(record.status, JobState::PartiallyComplete);
    assert_eq!(record.stage, "partially_complete (completed: partial_charge)");
}

#[test]
fn test_duplicate_pending_beats_older_running() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);

    let t5 = DateTime::<Utc>::from_timestamp(5, 0);
    let t10 = DateTime::<Utc>::from_timestamp(10, 0);
    scheduler.set_job("11", SchedState::Running, t5);
    scheduler.set_job("22", SchedState::Queued, t10);

    let mut store = fx.store();
    store.push(fx.running_record(unit, "11"));
    store.push(JobRecord::pending(
        unit,
        SchedJobId("22".to_string()),
        t10.unwrap(),
    ));

    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();

    assert_eq!(scheduler.cancelled_ids(), vec!["11".to_string()]);

    let record = store.active(&unit).unwrap();
    assert_eq!(record.job_id, Some(SchedJobId("22".to_string())));
    assert_eq!(record.status, JobState::Pending);

    let cancelled: Vec<&JobRecord> = store
        .rows()
        .iter()
        .filter(|r| r.status == JobState::Cancelled)
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].job_id, Some(SchedJobId("11".to_string())));
}

#[test]
fn test_finished_duplicates_keep_one_row_and_complete() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);
    for step in ["partial_charge", "simulation", "analysis"] {
        fx.write_marker(unit, step, "0\n");
    }

    // Two overlapping submissions; both jobs have left the queue.
    let mut store = fx.store();
    let mut first = fx.running_record(unit, "11");
    first.submitted_at = DateTime::<Utc>::from_timestamp(5, 0);
    store.push(first);
    let mut second = fx.running_record(unit, "22");
    second.submitted_at = DateTime::<Utc>::from_timestamp(10, 0);
    store.push(second);

    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();

    // One row survives and carries the completion evidence.
    let record = store.active(&unit).unwrap();
    assert_eq!(record.job_id, Some(SchedJobId("22".to_string())));
    assert_eq!(record.status, JobState::Completed);
    assert_eq!(record.stage, "completed");

    let cancelled: Vec<&JobRecord> = store
        .rows()
        .iter()
        .filter(|r| r.status == JobState::Cancelled)
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].job_id, Some(SchedJobId("11".to_string())));

    // The completed unit is not eligible for resubmission.
    let controller = SubmissionController::new(&fx.config, &fx.config_path, &scheduler)
        .with_launcher(PathBuf::from("/usr/bin/mofscreen"));
    assert!(controller.submit_pending(&mut store).unwrap().is_empty());
}

#[test]
fn test_terminal_status_never_regresses() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);
    for step in ["partial_charge", "simulation", "analysis"] {
        fx.write_marker(unit, step, "0\n");
    }

    let mut store = fx.store();
    store.push(fx.running_record(unit, "101"));

    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();
    assert_eq!(store.active(&unit).unwrap().status, JobState::Completed);
    let completed_at = store.active(&unit).unwrap().completed_at;

    // The scheduler now claims the job is running again; the derived
    // terminal state must hold.
    scheduler.set_job("101", SchedState::Running, None);
    tracker.poll_once(&mut store).unwrap();

    let record = store.active(&unit).unwrap();
    assert_eq!(record.status, JobState::Completed);
    assert_eq!(record.completed_at, completed_at);
}

#[test]
fn test_fresh_pending_job_is_not_failed_by_a_blind_spot() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);

    let mut store = fx.store();
    // Submitted a moment ago; neither squeue nor the filesystem has caught up.
    store.push(JobRecord::pending(
        unit,
        SchedJobId("999".to_string()),
        Utc::now(),
    ));

    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();

    assert_eq!(store.active(&unit).unwrap().status, JobState::Pending);
}

#[test]
fn test_submission_respects_cap_and_records_pending_rows() {
    let fx = Fixture::new(4);
    let scheduler = StaticScheduler::default();
    let mut store = fx.store();

    let controller = SubmissionController::new(&fx.config, &fx.config_path, &scheduler)
        .with_launcher(PathBuf::from("/usr/bin/mofscreen"));
    let submitted = controller.submit_pending(&mut store).unwrap();

    // max_concurrent_jobs = 2
    assert_eq!(submitted, vec![UnitId::batch(1), UnitId::batch(2)]);
    for unit in &submitted {
        let record = store.active(unit).unwrap();
        assert_eq!(record.status, JobState::Pending);
        assert!(record.job_id.is_some());
        assert!(record.submitted_at.is_some());
        let script = fx
            .config
            .scripts_dir()
            .join(format!("job_{}.sh", unit.dir_name()));
        assert!(script.exists());
    }

    // No capacity left until the first two finish.
    assert!(controller.submit_pending(&mut store).unwrap().is_empty());
}

#[test]
fn test_failed_unit_is_resubmitted_with_a_new_row() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);

    let mut store = fx.store();
    let mut failed = JobRecord::pending(unit, SchedJobId("7".to_string()), Utc::now());
    failed.status = JobState::Failed;
    failed.stage = "partial_charge (failed)".to_string();
    store.push(failed);

    let controller = SubmissionController::new(&fx.config, &fx.config_path, &scheduler)
        .with_launcher(PathBuf::from("/usr/bin/mofscreen"));
    let submitted = controller.submit_pending(&mut store).unwrap();

    assert_eq!(submitted, vec![unit]);
    assert_eq!(store.rows().len(), 2);
    assert_eq!(store.active(&unit).unwrap().status, JobState::Pending);
}

#[test]
fn test_store_survives_save_and_reload() {
    let fx = Fixture::new(1);
    let scheduler = StaticScheduler::default();
    let unit = UnitId::batch(1);
    fx.write_marker(unit, "partial_charge", "0\n");
    fx.write_marker(unit, "simulation", "1\n");

    let mut store = fx.store();
    store.push(fx.running_record(unit, "101"));

    let tracker = CampaignTracker::new(&fx.config, &scheduler);
    tracker.poll_once(&mut store).unwrap();
    store.save().unwrap();

    let reloaded = fx.store();
    let record = reloaded.active(&unit).unwrap();
    assert_eq!(record.status, JobState::PartiallyComplete);
    assert_eq!(record.stage, "partially_complete (completed: partial_charge)");
}
