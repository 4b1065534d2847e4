use crate::error::Result;
use crate::store::{JobRecord, TrackingStore};
use chrono::Utc;
use mofscreen_core::batches;
use mofscreen_core::config::Config;
use mofscreen_core::model::{JobState, UnitId};
use mofscreen_core::params::ParameterMatrix;
use mofscreen_scheduler::{JobScriptBuilder, Scheduler};
use std::path::{Path, PathBuf};

/// Every unit the campaign can schedule: each discovered batch crossed with
/// the parameter matrix (or one unit per batch without a matrix).
pub fn campaign_units(config: &Config) -> Result<Vec<UnitId>> {
    let matrix = ParameterMatrix::from_config(config.parameters.as_ref());
    let ids = batches::list_batch_ids(&config.batches_dir())?;
    Ok(ids
        .into_iter()
        .flat_map(|b| matrix.units_for_batch(b))
        .collect())
}

/// Decides which units to hand to the scheduler next, honoring the
/// concurrency cap and an optional inclusive batch-id range.
pub struct SubmissionController<'a, S: Scheduler> {
    config: &'a Config,
    config_path: &'a Path,
    scheduler: &'a S,
    batch_range: Option<(u32, u32)>,
    launcher: Option<PathBuf>,
    only_retries: bool,
}

impl<'a, S: Scheduler> SubmissionController<'a, S> {
    pub fn new(config: &'a Config, config_path: &'a Path, scheduler: &'a S) -> Self {
        Self {
            config,
            config_path,
            scheduler,
            batch_range: None,
            launcher: None,
            only_retries: false,
        }
    }

    /// Restrict submission to batches with `lo <= id <= hi`.
    pub fn with_batch_range(mut self, lo: u32, hi: u32) -> Self {
        self.batch_range = Some((lo, hi));
        self
    }

    pub fn with_launcher(mut self, launcher: PathBuf) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Only reselect units whose latest attempt ended FAILED or
    /// PARTIALLY_COMPLETE; never pick up fresh work.
    pub fn retries_only(mut self) -> Self {
        self.only_retries = true;
        self
    }

    /// The campaign's units narrowed to this controller's batch range.
    pub fn scoped_units(&self) -> Result<Vec<UnitId>> {
        Ok(campaign_units(self.config)?
            .into_iter()
            .filter(|u| {
                self.batch_range
                    .map(|(lo, hi)| u.batch_id >= lo && u.batch_id <= hi)
                    .unwrap_or(true)
            })
            .collect())
    }

    /// Open submission slots: the cap minus units currently pending or
    /// running.
    pub fn capacity(&self, store: &TrackingStore) -> usize {
        self.config
            .limits
            .max_concurrent_jobs
            .saturating_sub(store.active_units().len())
    }

    /// Units worth submitting, in batch order, up to the open capacity.
    /// A unit qualifies when it was never submitted, or its latest attempt
    /// ended FAILED or PARTIALLY_COMPLETE. COMPLETED units are never
    /// reselected.
    pub fn eligible(&self, store: &TrackingStore, units: &[UnitId]) -> Vec<UnitId> {
        units
            .iter()
            .filter(|u| {
                self.batch_range
                    .map(|(lo, hi)| u.batch_id >= lo && u.batch_id <= hi)
                    .unwrap_or(true)
            })
            .filter(|u| match store.active(u) {
                None => !self.only_retries,
                Some(r) => matches!(r.status, JobState::Failed | JobState::PartiallyComplete),
            })
            .take(self.capacity(store))
            .copied()
            .collect()
    }

    /// Prepare scripts, submit, and record a fresh PENDING row per unit.
    pub fn submit_pending(&self, store: &mut TrackingStore) -> Result<Vec<UnitId>> {
        let units = self.scoped_units()?;
        let selected = self.eligible(store, &units);
        if selected.is_empty() {
            return Ok(selected);
        }

        let mut builder = JobScriptBuilder::new(self.config, self.config_path);
        if let Some(launcher) = &self.launcher {
            builder = builder.with_launcher(launcher.clone());
        }

        let mut submitted = Vec::new();
        for unit in selected {
            let script = builder.prepare(&unit)?;
            let job_id = self.scheduler.submit(&script)?;
            tracing::info!("submitted {} as job {}", unit, job_id);
            store.push(JobRecord::pending(unit, job_id, Utc::now()));
            submitted.push(unit);
        }
        Ok(submitted)
    }
}
