use crate::error::{Result, SchedulerError};
use crate::{SchedJob, SchedJobId, SchedState, Scheduler};
use chrono::{DateTime, NaiveDateTime, Utc};
use mofscreen_core::logging::log_command;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

/// SLURM-backed scheduler: `sbatch` for submission, `squeue` with an
/// `sacct` fallback for status, `scancel` for cancellation.
#[derive(Debug, Default)]
pub struct SlurmScheduler;

impl SlurmScheduler {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        log_command(&cmd);

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(SchedulerError::CommandFailed {
                command: program.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Scheduler for SlurmScheduler {
    fn submit(&self, script: &Path) -> Result<SchedJobId> {
        let stdout = self.run("sbatch", &["--parsable", &script.to_string_lossy()])?;
        let id = parse_sbatch_output(&stdout)
            .ok_or_else(|| SchedulerError::UnparsableJobId(stdout.trim().to_string()))?;
        tracing::info!("submitted {} as SLURM job {}", script.display(), id);
        Ok(id)
    }

    fn query(&self, ids: &[SchedJobId]) -> Result<HashMap<SchedJobId, SchedJob>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids
            .iter()
            .map(|id| id.0.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut jobs = HashMap::new();

        let squeue_out = self.run(
            "squeue",
            &[
                "--jobs",
                &id_list,
                "--format=%i|%T|%V",
                "--noheader",
            ],
        )
        // squeue errors out when none of the jobs are queued anymore; treat
        // that as an empty listing and let sacct fill in the rest.
        .unwrap_or_default();

        for line in squeue_out.lines() {
            if let Some((id, job)) = parse_status_line(line) {
                jobs.insert(id, job);
            }
        }

        let missing: Vec<&SchedJobId> = ids.iter().filter(|id| !jobs.contains_key(*id)).collect();
        if !missing.is_empty() {
            let missing_list = missing
                .iter()
                .map(|id| id.0.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let sacct_out = self
                .run(
                    "sacct",
                    &[
                        "--jobs",
                        &missing_list,
                        "--format=JobID,State,Submit",
                        "--parsable2",
                        "--noheader",
                    ],
                )
                .unwrap_or_default();

            for line in sacct_out.lines() {
                if let Some((id, job)) = parse_sacct_line(line) {
                    jobs.entry(id).or_insert(job);
                }
            }
        }

        Ok(jobs)
    }

    fn cancel(&self, id: &SchedJobId) -> Result<bool> {
        let mut cmd = Command::new("scancel");
        cmd.arg(&id.0);
        log_command(&cmd);

        let output = cmd.output()?;
        if output.status.success() {
            tracing::info!("cancelled SLURM job {}", id);
            Ok(true)
        } else {
            tracing::warn!(
                "scancel {} failed: {}",
                id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Ok(false)
        }
    }
}

/// `sbatch --parsable` prints `<jobid>` or `<jobid>;<cluster>`.
fn parse_sbatch_output(stdout: &str) -> Option<SchedJobId> {
    let first = stdout.trim().split(';').next()?;
    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        Some(SchedJobId(first.to_string()))
    } else {
        None
    }
}

/// `squeue --format=%i|%T|%V` line: `<jobid>|<STATE>|<submit time>`.
fn parse_status_line(line: &str) -> Option<(SchedJobId, SchedJob)> {
    let mut parts = line.trim().split('|');
    let id = parts.next()?.trim();
    let state = parts.next()?.trim();
    let submit = parts.next().map(str::trim);

    if id.is_empty() {
        return None;
    }

    Some((
        SchedJobId(id.to_string()),
        SchedJob {
            state: map_slurm_state(state),
            submitted_at: submit.and_then(parse_slurm_time),
        },
    ))
}

/// `sacct --parsable2` line, same field order. Sub-step rows (`<id>.batch`,
/// `<id>.0`) are skipped; only the parent job row counts.
fn parse_sacct_line(line: &str) -> Option<(SchedJobId, SchedJob)> {
    let (id, _) = line.trim().split_once('|')?;
    if id.contains('.') {
        return None;
    }
    parse_status_line(line)
}

fn map_slurm_state(state: &str) -> SchedState {
    // "CANCELLED by 1234" and friends carry a suffix.
    let state = state
        .split_whitespace()
        .next()
        .unwrap_or(state)
        .to_uppercase();

    match state.as_str() {
        "PENDING" | "CONFIGURING" | "REQUEUED" | "REQUEUE_HOLD" => SchedState::Queued,
        "RUNNING" | "COMPLETING" | "SUSPENDED" | "RESIZING" | "STAGE_OUT" => SchedState::Running,
        _ => SchedState::Finished,
    }
}

fn parse_slurm_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}
