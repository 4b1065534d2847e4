use crate::error::CliError;
use colored::Colorize;
use mofscreen_core::config::Config;
use mofscreen_core::constants::files;
use mofscreen_core::errors::ConfigError;
use mofscreen_core::params::ParameterMatrix;
use mofscreen_scheduler::SlurmScheduler;
use mofscreen_tracker::{CampaignTracker, SubmissionController, TrackingStore};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `mofscreen run`: submit work and poll the scheduler until every unit in
/// scope reaches a terminal state, or the user interrupts.
pub fn handle_run(
    config: &Config,
    config_path: &Path,
    range: Option<(u32, u32)>,
) -> Result<(), CliError> {
    config.ensure_layout()?;

    let matrix = ParameterMatrix::from_config(config.parameters.as_ref());
    if matrix.is_enabled() {
        matrix.save(&config.paths.output_dir.join(files::PARAM_MATRIX))?;
        tracing::info!("parameter sweep with {} combinations", matrix.combos().len());
    }

    let scheduler = SlurmScheduler::new();
    let mut controller = SubmissionController::new(config, config_path, &scheduler);
    if let Some((lo, hi)) = range {
        controller = controller.with_batch_range(lo, hi);
    }

    let tracker = CampaignTracker::new(config, &scheduler);
    let mut store = TrackingStore::open(&TrackingStore::default_path(config))?;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| {
        ConfigError::General(format!("failed to install interrupt handler: {}", e))
    })?;

    println!(
        "Tracking campaign '{}' ({} job slots, polling every {}s)",
        config.project.name.bold(),
        config.limits.max_concurrent_jobs,
        config.limits.poll_interval_secs
    );

    tracker.run(&mut store, &controller, &stop)?;
    Ok(())
}
