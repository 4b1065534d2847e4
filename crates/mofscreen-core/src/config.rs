use crate::constants::dirs;
use crate::errors::ConfigError;
use crate::model::StepDef;
use crate::params::MatrixConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project: Project,
    pub paths: Paths,

    /// Shell fragment prepended to every generated job script (module loads,
    /// conda activation, and the like).
    #[serde(default)]
    pub environment_setup: Option<String>,

    pub slurm: SlurmConfig,

    #[serde(default)]
    pub limits: Limits,

    #[serde(rename = "step")]
    pub steps: Vec<StepDef>,

    /// Forcefield-like file paths, forwarded to steps as `FF_<NAME>`.
    #[serde(default)]
    pub forcefields: BTreeMap<String, PathBuf>,

    /// Simulation variables, forwarded to steps as `SIM_VAR_<NAME>`.
    #[serde(default)]
    pub simulation_variables: BTreeMap<String, toml::Value>,

    /// Optional parameter-sweep matrix; absent means one unit per batch.
    #[serde(default)]
    pub parameters: Option<MatrixConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    pub output_dir: PathBuf,

    /// Pre-materialized batch file lists; defaults to `<output_dir>/batches`.
    #[serde(default)]
    pub batches_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlurmConfig {
    pub account: String,
    pub partition: String,
    pub time: String,
    pub nodes: u32,

    /// Free-form additional `#SBATCH --<key>=<value>` directives.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_max_files() -> usize {
    10
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs_err::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.paths.output_dir = expand_path(&config.paths.output_dir);
        if let Some(dir) = config.paths.batches_dir.take() {
            config.paths.batches_dir = Some(expand_path(&dir));
        }
        config.validate()?;
        Ok(config)
    }

    /// Fatal configuration errors, surfaced before any unit of work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(ConfigError::DuplicateStep(step.name.clone()));
            }
            for prereq in &step.after {
                // Prerequisites must name an earlier step; `seen` holds the
                // current step too, so reject self-references explicitly.
                if prereq == &step.name || !seen.contains(prereq.as_str()) {
                    return Err(ConfigError::UnknownPrerequisite {
                        step: step.name.clone(),
                        prereq: prereq.clone(),
                    });
                }
            }
            if !step.command.is_file() {
                return Err(ConfigError::ExecutableNotFound {
                    step: step.name.clone(),
                    path: step.command.clone(),
                });
            }
            if let Some(template) = &step.template {
                if !template.is_file() {
                    return Err(ConfigError::TemplateNotFound {
                        step: step.name.clone(),
                        path: template.clone(),
                    });
                }
            }
        }

        for (name, path) in &self.forcefields {
            if !path.is_file() {
                return Err(ConfigError::ForcefieldNotFound {
                    name: name.clone(),
                    path: path.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.paths
            .batches_dir
            .clone()
            .unwrap_or_else(|| self.paths.output_dir.join(dirs::BATCHES))
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.paths.output_dir.join(dirs::SCRIPTS)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.paths.output_dir.join(dirs::LOGS)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.paths.output_dir.join(dirs::RESULTS)
    }

    pub fn ensure_layout(&self) -> Result<(), ConfigError> {
        for dir in [
            self.paths.output_dir.clone(),
            self.batches_dir(),
            self.scripts_dir(),
            self.logs_dir(),
            self.results_dir(),
        ] {
            fs_err::create_dir_all(&dir).map_err(|source| ConfigError::PathIo {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn step(&self, name: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Simulation variables rendered as plain strings for the process
    /// environment (TOML strings lose their quotes).
    pub fn simulation_variable_strings(&self) -> BTreeMap<String, String> {
        self.simulation_variables
            .iter()
            .map(|(k, v)| (k.clone(), toml_value_to_string(v)))
            .collect()
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(s.as_ref()).into_owned())
}

fn toml_value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
