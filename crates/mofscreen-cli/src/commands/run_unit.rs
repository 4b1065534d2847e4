use crate::error::CliError;
use fs_err::OpenOptions;
use mofscreen_core::batches;
use mofscreen_core::config::Config;
use mofscreen_core::constants::files;
use mofscreen_core::errors::DomainError;
use mofscreen_core::model::UnitId;
use mofscreen_core::params::{ParamCombo, ParameterMatrix};
use mofscreen_pipeline::{StepEnv, UnitLayout, WorkflowDriver};
use std::io::Write;

/// `mofscreen run-unit`: the pipeline entry point inside a scheduler job, and
/// the way to run one unit by hand outside the batching scheme. Exits
/// non-zero and appends the unit to the failure log when a required step
/// halts the workflow.
pub fn handle_run_unit(config: &Config, unit_str: &str) -> Result<(), CliError> {
    let unit: UnitId = unit_str.parse()?;

    let combo = resolve_combo(config, &unit)?;
    let layout = UnitLayout::new(&config.results_dir(), &unit);
    fs_err::create_dir_all(layout.root())?;
    stage_file_list(config, &unit, &layout)?;

    let env = StepEnv::from_config(config, combo.as_ref());
    let result = WorkflowDriver::new(&unit, &layout, &config.steps, &env).run()?;

    match result.halted_at {
        None => Ok(()),
        Some(step) => {
            append_failed_unit(config, &unit)?;
            Err(CliError::WorkflowFailed {
                unit: unit.to_string(),
                step,
            })
        }
    }
}

fn resolve_combo(config: &Config, unit: &UnitId) -> Result<Option<ParamCombo>, CliError> {
    match unit.param_id {
        None => Ok(None),
        Some(param_id) => {
            let matrix = ParameterMatrix::from_config(config.parameters.as_ref());
            Ok(Some(matrix.combo(param_id)?.clone()))
        }
    }
}

/// Submission normally stages the file list; a manual run may start from a
/// bare results tree.
fn stage_file_list(config: &Config, unit: &UnitId, layout: &UnitLayout) -> Result<(), CliError> {
    if layout.file_list().exists() {
        return Ok(());
    }

    let list = batches::batch_file_list(&config.batches_dir(), unit.batch_id);
    if !list.exists() {
        return Err(DomainError::BatchNotFound(unit.batch_id).into());
    }
    fs_err::copy(&list, layout.file_list())?;
    Ok(())
}

fn append_failed_unit(config: &Config, unit: &UnitId) -> Result<(), CliError> {
    let path = config.paths.output_dir.join(files::FAILED_UNITS);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", unit)?;
    Ok(())
}
