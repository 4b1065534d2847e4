use crate::error::CliError;
use colored::Colorize;
use mofscreen_core::config::Config;
use mofscreen_scheduler::SlurmScheduler;
use mofscreen_tracker::{SubmissionController, TrackingStore};
use std::path::Path;

/// `mofscreen submit` / `mofscreen resubmit`: one submission pass, no
/// polling. Resubmit additionally skips units that were never attempted.
pub fn handle_submit(
    config: &Config,
    config_path: &Path,
    range: Option<(u32, u32)>,
    retries_only: bool,
) -> Result<(), CliError> {
    config.ensure_layout()?;

    let scheduler = SlurmScheduler::new();
    let mut controller = SubmissionController::new(config, config_path, &scheduler);
    if let Some((lo, hi)) = range {
        controller = controller.with_batch_range(lo, hi);
    }
    if retries_only {
        controller = controller.retries_only();
    }

    let mut store = TrackingStore::open(&TrackingStore::default_path(config))?;
    let submitted = controller.submit_pending(&mut store)?;
    store.save()?;

    if submitted.is_empty() {
        println!("{}", "Nothing to submit.".yellow());
    } else {
        println!("Submitted {} unit(s):", submitted.len());
        for unit in &submitted {
            println!("  {}", unit.to_string().green());
        }
    }
    Ok(())
}
