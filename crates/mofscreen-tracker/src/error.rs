use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed tracking record at line {line}: '{content}'")]
    MalformedRecord { line: usize, content: String },

    #[error(transparent)]
    Config(#[from] mofscreen_core::errors::ConfigError),

    #[error(transparent)]
    Domain(#[from] mofscreen_core::errors::DomainError),

    #[error(transparent)]
    Scheduler(#[from] mofscreen_scheduler::SchedulerError),
}
