mod deps;
mod driver;
mod error;
mod executor;
mod layout;
mod oracle;

pub use deps::{check_dependencies, DependencyReport};
pub use driver::{WorkflowDriver, WorkflowResult, WorkflowStatus};
pub use error::{PipelineError, Result};
pub use executor::{StepEnv, StepExecutor, StepOutcome};
pub use layout::UnitLayout;
pub use oracle::{check_step, read_marker, StepCompletion};
