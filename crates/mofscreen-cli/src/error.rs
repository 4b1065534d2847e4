use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] mofscreen_core::errors::ConfigError),

    #[error(transparent)]
    Domain(#[from] mofscreen_core::errors::DomainError),

    #[error(transparent)]
    Pipeline(#[from] mofscreen_pipeline::PipelineError),

    #[error(transparent)]
    Scheduler(#[from] mofscreen_scheduler::SchedulerError),

    #[error(transparent)]
    Tracker(#[from] mofscreen_tracker::TrackerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Workflow for {unit} halted at step '{step}'")]
    WorkflowFailed { unit: String, step: String },
}
