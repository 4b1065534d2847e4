use crate::layout::UnitLayout;
use mofscreen_core::model::StepDef;
use std::path::Path;

/// Completion evidence for one (unit, step) pair, derived purely from the
/// step's status marker and output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCompletion {
    /// No marker and no output directory contents.
    New,
    /// Output directory has artifacts but no marker yet (interrupted run).
    InProgress,
    Completed,
    /// Marker holds a non-success code, or is unreadable. A corrupt marker
    /// is never treated as success.
    Failed { exit_code: Option<i32> },
}

impl StepCompletion {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepCompletion::Completed)
    }
}

/// Parse a status marker: exactly one line holding a decimal exit code.
/// Empty or non-numeric content yields `None`.
pub fn read_marker(path: &Path) -> Option<Option<i32>> {
    let content = fs_err::read_to_string(path).ok()?;
    Some(content.trim().parse::<i32>().ok())
}

pub fn check_step(layout: &UnitLayout, step: &StepDef) -> StepCompletion {
    let marker = layout.marker_path(step);

    if marker.exists() {
        return match read_marker(&marker) {
            Some(Some(0)) => StepCompletion::Completed,
            Some(other) => StepCompletion::Failed { exit_code: other },
            None => StepCompletion::Failed { exit_code: None },
        };
    }

    if dir_has_artifacts(&layout.step_dir(step)) {
        StepCompletion::InProgress
    } else {
        StepCompletion::New
    }
}

fn dir_has_artifacts(dir: &Path) -> bool {
    match fs_err::read_dir(dir) {
        Ok(mut entries) => entries.next().is_some(),
        Err(_) => false,
    }
}
