use crate::deps;
use crate::error::{PipelineError, Result};
use crate::layout::UnitLayout;
use crate::oracle::{self, StepCompletion};
use chrono::Local;
use mofscreen_core::config::Config;
use mofscreen_core::constants::{env as env_keys, markers};
use mofscreen_core::logging::log_command;
use mofscreen_core::model::{StepDef, UnitId};
use mofscreen_core::params::ParamCombo;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Configuration-derived values forwarded to step executables through the
/// process environment, keeping the positional argument contract stable.
#[derive(Debug, Clone, Default)]
pub struct StepEnv {
    pub forcefields: BTreeMap<String, PathBuf>,
    pub variables: BTreeMap<String, String>,
}

impl StepEnv {
    /// Merge campaign-level simulation variables with a sweep combination's
    /// values; the combination wins on conflicts.
    pub fn from_config(config: &Config, combo: Option<&ParamCombo>) -> Self {
        let mut variables = config.simulation_variable_strings();
        if let Some(combo) = combo {
            for (k, v) in &combo.values {
                variables.insert(k.clone(), v.clone());
            }
        }
        Self {
            forcefields: config.forcefields.clone(),
            variables,
        }
    }

    fn apply(&self, cmd: &mut Command, step: &StepDef) {
        for (name, path) in &self.forcefields {
            cmd.env(
                format!("{}{}", env_keys::FORCEFIELD_PREFIX, name.to_uppercase()),
                path,
            );
        }
        for (name, value) in &self.variables {
            cmd.env(
                format!("{}{}", env_keys::SIM_VAR_PREFIX, name.to_uppercase()),
                value,
            );
        }
        if let Some(template) = &step.template {
            cmd.env(
                format!(
                    "{}{}{}",
                    env_keys::TEMPLATE_PREFIX,
                    step.name.to_uppercase(),
                    env_keys::TEMPLATE_SUFFIX
                ),
                template,
            );
        }
    }
}

/// Outcome of one step-execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Marker already reports success; the command was not invoked.
    AlreadyComplete,
    Completed,
    /// Required prerequisites unmet; no marker written so a later retry
    /// is indistinguishable from a fresh run.
    Blocked { unmet: Vec<String> },
    /// Optional step with a stale failure; skipped without re-running.
    SkippedOptional,
    Failed { exit_code: i32 },
}

pub struct StepExecutor<'a> {
    unit: &'a UnitId,
    layout: &'a UnitLayout,
    env: &'a StepEnv,
}

impl<'a> StepExecutor<'a> {
    pub fn new(unit: &'a UnitId, layout: &'a UnitLayout, env: &'a StepEnv) -> Self {
        Self { unit, layout, env }
    }

    pub fn execute(&self, step: &StepDef, all_steps: &[StepDef], input: &Path) -> Result<StepOutcome> {
        let completion = oracle::check_step(self.layout, step);

        if completion.is_completed() {
            tracing::info!(
                "[{}] step '{}' already completed, skipping",
                self.unit,
                step.name
            );
            return Ok(StepOutcome::AlreadyComplete);
        }

        // Blocked before any filesystem mutation: no marker is written, so a
        // retry after the dependency is fixed starts from a clean slate.
        if let Some(blocked) = self.blocked_outcome(step, all_steps) {
            return Ok(blocked);
        }

        match completion {
            StepCompletion::Failed { .. } | StepCompletion::InProgress => {
                if !step.required {
                    tracing::warn!(
                        "[{}] optional step '{}' has a stale attempt, skipping",
                        self.unit,
                        step.name
                    );
                    return Ok(StepOutcome::SkippedOptional);
                }
                self.backup_stale_output(step)?;
            }
            StepCompletion::New => {}
            StepCompletion::Completed => unreachable!(),
        }

        self.run_command(step, input)
    }

    fn blocked_outcome(&self, step: &StepDef, all_steps: &[StepDef]) -> Option<StepOutcome> {
        let report = deps::check_dependencies(step, self.layout, all_steps);
        if report.satisfied() {
            None
        } else {
            tracing::warn!(
                "[{}] step '{}' blocked on unmet prerequisites: {}",
                self.unit,
                step.name,
                report.unmet.join(", ")
            );
            Some(StepOutcome::Blocked {
                unmet: report.unmet,
            })
        }
    }

    /// Preserve a failed or interrupted attempt's output for postmortem
    /// before retrying.
    fn backup_stale_output(&self, step: &StepDef) -> Result<()> {
        let step_dir = self.layout.step_dir(step);
        if !step_dir.exists() {
            return Ok(());
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut backup = step_dir.with_file_name(format!("{}.bak_{}", step.name, timestamp));
        let mut attempt = 1;
        while backup.exists() {
            backup = step_dir.with_file_name(format!("{}.bak_{}_{}", step.name, timestamp, attempt));
            attempt += 1;
        }

        tracing::info!(
            "[{}] backing up stale output of '{}' to {}",
            self.unit,
            step.name,
            backup.display()
        );
        fs_err::rename(&step_dir, &backup).map_err(|source| PipelineError::PathIo {
            path: step_dir.clone(),
            source,
        })?;
        Ok(())
    }

    fn run_command(&self, step: &StepDef, input: &Path) -> Result<StepOutcome> {
        let out_dir = self.layout.step_dir(step);
        fs_err::create_dir_all(&out_dir).map_err(|source| PipelineError::PathIo {
            path: out_dir.clone(),
            source,
        })?;

        let mut cmd = Command::new(&step.command);
        cmd.arg(self.unit.to_string()).arg(input).arg(&out_dir);
        if let Some(template) = &step.template {
            cmd.arg(template);
        }
        self.env.apply(&mut cmd, step);

        log_command(&cmd);
        tracing::info!("[{}] running step '{}'", self.unit, step.name);

        let status = cmd.status().map_err(|source| PipelineError::Spawn {
            step: step.name.clone(),
            command: step.command.clone(),
            source,
        })?;

        // Capture the exit code before anything else touches the step
        // directory. A killed process has no code; record it as a failure.
        let exit_code = status.code().unwrap_or(-1);
        self.write_marker(step, exit_code)?;

        if exit_code == 0 {
            tracing::info!("[{}] step '{}' completed", self.unit, step.name);
            Ok(StepOutcome::Completed)
        } else {
            tracing::error!(
                "[{}] step '{}' failed with exit code {}",
                self.unit,
                step.name,
                exit_code
            );
            Ok(StepOutcome::Failed { exit_code })
        }
    }

    /// Atomic replace: a concurrent reader never observes a half-written
    /// marker.
    fn write_marker(&self, step: &StepDef, exit_code: i32) -> Result<()> {
        let marker = self.layout.marker_path(step);
        let tmp = self.layout.step_dir(step).join(format!(".{}.tmp", markers::EXIT_STATUS));
        fs_err::write(&tmp, format!("{}\n", exit_code)).map_err(|source| PipelineError::PathIo {
            path: tmp.clone(),
            source,
        })?;
        fs_err::rename(&tmp, &marker).map_err(|source| PipelineError::PathIo {
            path: marker.clone(),
            source,
        })?;
        Ok(())
    }
}
