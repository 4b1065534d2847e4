use crate::layout::UnitLayout;
use crate::oracle;
use mofscreen_core::model::StepDef;

/// Result of evaluating a step's declared prerequisites for one unit.
#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    pub unmet: Vec<String>,
}

impl DependencyReport {
    pub fn satisfied(&self) -> bool {
        self.unmet.is_empty()
    }
}

/// Check every directly declared prerequisite of `step` against the
/// completion oracle. A step with no prerequisites is always satisfied.
/// Config validation guarantees prerequisite names resolve to earlier steps;
/// a name that fails to resolve is reported as unmet rather than ignored.
pub fn check_dependencies(
    step: &StepDef,
    layout: &UnitLayout,
    all_steps: &[StepDef],
) -> DependencyReport {
    let mut unmet = Vec::new();

    for prereq_name in &step.after {
        let satisfied = all_steps
            .iter()
            .find(|s| &s.name == prereq_name)
            .map(|prereq| oracle::check_step(layout, prereq).is_completed())
            .unwrap_or(false);

        if !satisfied {
            unmet.push(prereq_name.clone());
        }
    }

    DependencyReport { unmet }
}
