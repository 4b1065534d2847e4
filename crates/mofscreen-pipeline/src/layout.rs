use mofscreen_core::constants::{files, markers};
use mofscreen_core::model::{StepDef, UnitId};
use std::path::{Path, PathBuf};

/// On-disk layout of one unit's output tree:
///
/// ```text
/// <results>/<unit>/structure_file_list.txt
/// <results>/<unit>/<step>/...
/// <results>/<unit>/<step>/exit_status.log
/// ```
#[derive(Debug, Clone)]
pub struct UnitLayout {
    root: PathBuf,
}

impl UnitLayout {
    pub fn new(results_dir: &Path, unit: &UnitId) -> Self {
        Self {
            root: results_dir.join(unit.dir_name()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The unit's staged copy of its batch file list; first-step input.
    pub fn file_list(&self) -> PathBuf {
        self.root.join(files::FILE_LIST)
    }

    pub fn step_dir(&self, step: &StepDef) -> PathBuf {
        self.root.join(&step.name)
    }

    pub fn marker_path(&self, step: &StepDef) -> PathBuf {
        self.step_dir(step).join(markers::EXIT_STATUS)
    }
}
