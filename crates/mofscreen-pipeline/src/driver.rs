use crate::error::Result;
use crate::executor::{StepEnv, StepExecutor, StepOutcome};
use crate::layout::UnitLayout;
use mofscreen_core::model::{StepDef, UnitId};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    Completed,
    /// Halted at a required step that failed or was blocked.
    Failed,
}

#[derive(Debug)]
pub struct WorkflowResult {
    /// Per-step outcomes in declared order, up to and including the halting
    /// step if any.
    pub outcomes: Vec<(String, StepOutcome)>,
    pub halted_at: Option<String>,
}

impl WorkflowResult {
    pub fn status(&self) -> WorkflowStatus {
        if self.halted_at.is_none() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        }
    }
}

/// Sequences the pipeline steps for one unit of work, strictly in declared
/// order, stopping at the first unrecoverable (required-step) failure.
pub struct WorkflowDriver<'a> {
    unit: &'a UnitId,
    layout: &'a UnitLayout,
    steps: &'a [StepDef],
    env: &'a StepEnv,
}

impl<'a> WorkflowDriver<'a> {
    pub fn new(
        unit: &'a UnitId,
        layout: &'a UnitLayout,
        steps: &'a [StepDef],
        env: &'a StepEnv,
    ) -> Self {
        Self {
            unit,
            layout,
            steps,
            env,
        }
    }

    pub fn run(&self) -> Result<WorkflowResult> {
        let executor = StepExecutor::new(self.unit, self.layout, self.env);
        let mut outcomes = Vec::with_capacity(self.steps.len());
        let mut halted_at = None;

        for (i, step) in self.steps.iter().enumerate() {
            let input = self.input_for(i);
            let outcome = executor.execute(step, self.steps, &input)?;

            let halts = step.required
                && matches!(
                    outcome,
                    StepOutcome::Failed { .. } | StepOutcome::Blocked { .. }
                );

            outcomes.push((step.name.clone(), outcome));

            if halts {
                tracing::error!(
                    "[{}] workflow halted at required step '{}'",
                    self.unit,
                    step.name
                );
                halted_at = Some(step.name.clone());
                break;
            }
        }

        if halted_at.is_none() {
            tracing::info!("[{}] workflow completed", self.unit);
        }

        Ok(WorkflowResult { outcomes, halted_at })
    }

    /// Input-source convention: the staged file list for the first step, the
    /// previous step's output directory for every later one.
    fn input_for(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.layout.file_list()
        } else {
            self.layout.step_dir(&self.steps[index - 1])
        }
    }
}
