use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use mofscreen_core::config::Config;
use mofscreen_core::constants::files;
use mofscreen_core::model::{JobState, UnitId};
use mofscreen_scheduler::SchedJobId;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One row of the tracking table. Rows are never deleted; a unit that is
/// resubmitted gets a fresh row, and rows for cancelled duplicate jobs are
/// kept with CANCELLED status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub unit: UnitId,
    pub job_id: Option<SchedJobId>,
    pub status: JobState,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stage: String,
}

impl JobRecord {
    pub fn pending(unit: UnitId, job_id: SchedJobId, submitted_at: DateTime<Utc>) -> Self {
        Self {
            unit,
            job_id: Some(job_id),
            status: JobState::Pending,
            submitted_at: Some(submitted_at),
            completed_at: None,
            stage: "pending".to_string(),
        }
    }
}

/// The campaign's job table, persisted as `job_status.csv` under the output
/// directory. All writes go through whole-file atomic replace so a status CLI
/// reading concurrently never sees a torn table.
#[derive(Debug)]
pub struct TrackingStore {
    path: PathBuf,
    rows: Vec<JobRecord>,
}

const HEADER: &str = "unit,job_id,status,submitted_at,completed_at,stage";

impl TrackingStore {
    pub fn default_path(config: &Config) -> PathBuf {
        config.paths.output_dir.join(files::STATUS_TABLE)
    }

    /// Load the table, or start an empty one when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            rows: Vec::new(),
        };

        if !path.exists() {
            return Ok(store);
        }

        let content = fs_err::read_to_string(path)?;
        for (i, line) in content.lines().enumerate() {
            if i == 0 || line.trim().is_empty() {
                continue;
            }
            store.rows.push(parse_row(line).ok_or_else(|| {
                TrackerError::MalformedRecord {
                    line: i + 1,
                    content: line.to_string(),
                }
            })?);
        }

        Ok(store)
    }

    /// Atomic whole-file replace: write a sibling temp file, then rename.
    pub fn save(&self) -> Result<()> {
        let mut out = String::from(HEADER);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&render_row(row));
            out.push('\n');
        }

        let tmp = self.path.with_extension("csv.tmp");
        fs_err::write(&tmp, out).map_err(|source| TrackerError::PathIo {
            path: tmp.clone(),
            source,
        })?;
        fs_err::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn rows(&self) -> &[JobRecord] {
        &self.rows
    }

    pub fn push(&mut self, record: JobRecord) {
        self.rows.push(record);
    }

    /// The row that currently represents a unit: its most recent
    /// non-cancelled entry.
    pub fn active(&self, unit: &UnitId) -> Option<&JobRecord> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.unit == *unit && r.status != JobState::Cancelled)
    }

    pub fn active_mut(&mut self, unit: &UnitId) -> Option<&mut JobRecord> {
        self.rows
            .iter_mut()
            .rev()
            .find(|r| r.unit == *unit && r.status != JobState::Cancelled)
    }

    /// Indices of rows still tied to a live scheduler job for this unit.
    /// More than one means overlapping submissions.
    pub fn live_rows(&self, unit: &UnitId) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.unit == *unit && r.status.is_active() && r.job_id.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn row_mut(&mut self, index: usize) -> &mut JobRecord {
        &mut self.rows[index]
    }

    /// Units with at least one PENDING or RUNNING row, in table order.
    pub fn active_units(&self) -> Vec<UnitId> {
        let mut seen = BTreeSet::new();
        self.rows
            .iter()
            .filter(|r| r.status.is_active())
            .filter(|r| seen.insert(r.unit))
            .map(|r| r.unit)
            .collect()
    }

    /// Every unit the table has ever seen, in table order.
    pub fn units(&self) -> Vec<UnitId> {
        let mut seen = BTreeSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.unit))
            .map(|r| r.unit)
            .collect()
    }

    /// Scheduler job ids worth querying this cycle.
    pub fn live_job_ids(&self) -> Vec<SchedJobId> {
        self.rows
            .iter()
            .filter(|r| r.status.is_active())
            .filter_map(|r| r.job_id.clone())
            .collect()
    }
}

fn render_row(row: &JobRecord) -> String {
    format!(
        "{},{},{},{},{},{}",
        row.unit,
        row.job_id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
        row.status,
        row.submitted_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        row.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        quote_stage(&row.stage),
    )
}

/// Only the stage label is free text; the first five fields never contain
/// commas, so the stage is everything after the fifth comma.
fn parse_row(line: &str) -> Option<JobRecord> {
    let mut parts = line.splitn(6, ',');
    let unit = parts.next()?.trim().parse().ok()?;
    let job_id = match parts.next()?.trim() {
        "" => None,
        id => Some(SchedJobId(id.to_string())),
    };
    let status = parts.next()?.trim().parse().ok()?;
    let submitted_at = parse_time(parts.next()?)?;
    let completed_at = parse_time(parts.next()?)?;
    let stage = unquote_stage(parts.next()?);

    Some(JobRecord {
        unit,
        job_id,
        status,
        submitted_at,
        completed_at,
        stage,
    })
}

fn parse_time(field: &str) -> Option<Option<DateTime<Utc>>> {
    let field = field.trim();
    if field.is_empty() {
        return Some(None);
    }
    DateTime::parse_from_rfc3339(field)
        .ok()
        .map(|t| Some(t.with_timezone(&Utc)))
}

fn quote_stage(stage: &str) -> String {
    if stage.contains(',') || stage.contains('"') {
        format!("\"{}\"", stage.replace('"', "\"\""))
    } else {
        stage.to_string()
    }
}

fn unquote_stage(field: &str) -> String {
    let field = field.trim();
    if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
        field[1..field.len() - 1].replace("\"\"", "\"")
    } else {
        field.to_string()
    }
}
