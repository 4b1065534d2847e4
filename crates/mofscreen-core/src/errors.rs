use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize parameter matrix: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    General(String),

    #[error("The campaign defines no pipeline steps.")]
    NoSteps,

    #[error("Duplicate step name '{0}' in pipeline definition.")]
    DuplicateStep(String),

    #[error("Step '{step}' declares prerequisite '{prereq}', which is not an earlier step.")]
    UnknownPrerequisite { step: String, prereq: String },

    #[error("Executable for step '{step}' not found at '{path}'.")]
    ExecutableNotFound { step: String, path: PathBuf },

    #[error("Template file for step '{step}' not found at '{path}'.")]
    TemplateNotFound { step: String, path: PathBuf },

    #[error("Forcefield file '{name}' not found at '{path}'.")]
    ForcefieldNotFound { name: String, path: PathBuf },

    #[error("Config file not found at '{0}'.")]
    ConfigNotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid unit id '{0}'. Expected 'batch_<N>' or 'batch_<N>_param_<M>'.")]
    InvalidUnitId(String),

    #[error("Invalid job state '{0}'.")]
    InvalidJobState(String),

    #[error("No batch file list found for batch {0}.")]
    BatchNotFound(u32),

    #[error("Unknown parameter combination id {0}.")]
    UnknownParamCombo(u32),
}
