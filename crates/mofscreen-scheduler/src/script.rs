use crate::error::{Result, SchedulerError};
use mofscreen_core::batches;
use mofscreen_core::config::Config;
use mofscreen_core::constants::files;
use mofscreen_core::model::UnitId;
use std::fmt::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Generates the per-unit SLURM job script and stages the unit's batch file
/// list. The script carries no step logic of its own: it sets up the
/// environment and execs `mofscreen run-unit`, which drives the pipeline.
pub struct JobScriptBuilder<'a> {
    config: &'a Config,
    config_path: &'a Path,
    launcher: PathBuf,
}

impl<'a> JobScriptBuilder<'a> {
    pub fn new(config: &'a Config, config_path: &'a Path) -> Self {
        let launcher = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("mofscreen"));
        Self {
            config,
            config_path,
            launcher,
        }
    }

    /// Override the binary the script execs (tests, relocated installs).
    pub fn with_launcher(mut self, launcher: PathBuf) -> Self {
        self.launcher = launcher;
        self
    }

    /// Stage the file list into the unit's directory and write the job
    /// script. Returns the script path, ready for submission.
    pub fn prepare(&self, unit: &UnitId) -> Result<PathBuf> {
        self.stage_file_list(unit)?;

        let script_path = self
            .config
            .scripts_dir()
            .join(format!("job_{}.sh", unit.dir_name()));

        fs_err::write(&script_path, self.render(unit)).map_err(|source| {
            SchedulerError::PathIo {
                path: script_path.clone(),
                source,
            }
        })?;

        let mut perms = fs_err::metadata(&script_path)?.permissions();
        perms.set_mode(0o755);
        fs_err::set_permissions(&script_path, perms)?;

        Ok(script_path)
    }

    fn stage_file_list(&self, unit: &UnitId) -> Result<()> {
        let list = batches::batch_file_list(&self.config.batches_dir(), unit.batch_id);
        if !list.exists() {
            return Err(mofscreen_core::errors::DomainError::BatchNotFound(unit.batch_id).into());
        }

        let unit_dir = self.config.results_dir().join(unit.dir_name());
        fs_err::create_dir_all(&unit_dir).map_err(|source| SchedulerError::PathIo {
            path: unit_dir.clone(),
            source,
        })?;
        fs_err::copy(&list, unit_dir.join(files::FILE_LIST))?;
        Ok(())
    }

    fn render(&self, unit: &UnitId) -> String {
        let slurm = &self.config.slurm;
        let logs = self.config.logs_dir();
        let job_name = format!("{}_{}", self.config.project.name, unit.dir_name());

        let mut script = String::from("#!/bin/bash\n\n");
        let mut directive = |key: &str, value: &str| {
            let _ = writeln!(script, "#SBATCH --{}={}", key, value);
        };

        directive("job-name", &job_name);
        directive(
            "output",
            &logs.join(format!("{}_%j.out", unit.dir_name())).to_string_lossy(),
        );
        directive(
            "error",
            &logs.join(format!("{}_%j.err", unit.dir_name())).to_string_lossy(),
        );
        directive("account", &slurm.account);
        directive("partition", &slurm.partition);
        directive("time", &slurm.time);
        directive("nodes", &slurm.nodes.to_string());
        for (key, value) in &slurm.extra {
            directive(key, value);
        }

        script.push('\n');
        if let Some(setup) = &self.config.environment_setup {
            script.push_str(setup.trim_end());
            script.push_str("\n\n");
        }

        let _ = writeln!(
            script,
            "exec {} run-unit --config {} --unit {}",
            shell_quote(&self.launcher.to_string_lossy()),
            shell_quote(&self.config_path.to_string_lossy()),
            unit
        );

        script
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
