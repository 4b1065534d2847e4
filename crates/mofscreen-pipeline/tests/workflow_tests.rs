use mofscreen_core::model::{StepDef, UnitId};
use mofscreen_pipeline::{
    check_step, StepCompletion, StepEnv, StepExecutor, StepOutcome, UnitLayout, WorkflowDriver,
    WorkflowStatus,
};
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs_err::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs_err::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs_err::set_permissions(&path, perms).unwrap();
    path
}

fn step(name: &str, command: &Path, required: bool, after: &[&str]) -> StepDef {
    StepDef {
        name: name.to_string(),
        command: command.to_path_buf(),
        required,
        after: after.iter().map(|s| s.to_string()).collect(),
        template: None,
    }
}

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    bin: PathBuf,
    unit: UnitId,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("results");
        let bin = tmp.path().join("bin");
        fs_err::create_dir_all(&root).unwrap();
        fs_err::create_dir_all(&bin).unwrap();

        let unit = UnitId::batch(1);
        let layout = UnitLayout::new(&root, &unit);
        fs_err::create_dir_all(layout.root()).unwrap();
        fs_err::write(layout.file_list(), "/db/MOF-1.cif\n").unwrap();

        Self {
            _tmp: tmp,
            root,
            bin,
            unit,
        }
    }

    fn layout(&self) -> UnitLayout {
        UnitLayout::new(&self.root, &self.unit)
    }

    fn run(&self, steps: &[StepDef]) -> mofscreen_pipeline::WorkflowResult {
        let env = StepEnv::default();
        let layout = self.layout();
        let driver = WorkflowDriver::new(&self.unit, &layout, steps, &env);
        driver.run().unwrap()
    }
}

#[test]
fn test_chain_completes_and_writes_markers() {
    let fx = Fixture::new();
    // Each step records its input path so chaining can be asserted.
    let ok = write_script(&fx.bin, "ok.sh", "echo \"$2\" > \"$3/input_seen.txt\"");
    let steps = vec![
        step("partial_charge", &ok, true, &[]),
        step("simulation", &ok, true, &["partial_charge"]),
        step("analysis", &ok, true, &["simulation"]),
    ];

    let result = fx.run(&steps);
    assert_eq!(result.status(), WorkflowStatus::Completed);
    assert_eq!(result.outcomes.len(), 3);

    let layout = fx.layout();
    for s in &steps {
        assert_eq!(check_step(&layout, s), StepCompletion::Completed);
    }

    let first_input =
        fs_err::read_to_string(layout.step_dir(&steps[0]).join("input_seen.txt")).unwrap();
    assert_eq!(first_input.trim(), layout.file_list().to_string_lossy());

    let second_input =
        fs_err::read_to_string(layout.step_dir(&steps[1]).join("input_seen.txt")).unwrap();
    assert_eq!(
        second_input.trim(),
        layout.step_dir(&steps[0]).to_string_lossy()
    );
}

#[test]
fn test_completed_step_not_reinvoked() {
    let fx = Fixture::new();
    let counter = fx.bin.join("invocations.txt");
    let count = write_script(
        &fx.bin,
        "count.sh",
        &format!("echo run >> \"{}\"", counter.display()),
    );
    let steps = vec![step("simulation", &count, true, &[])];

    fx.run(&steps);
    let result = fx.run(&steps);

    assert_eq!(result.outcomes[0].1, StepOutcome::AlreadyComplete);
    let invocations = fs_err::read_to_string(&counter).unwrap();
    assert_eq!(invocations.lines().count(), 1);

    // Marker unchanged by the second pass.
    let marker = fs_err::read_to_string(fx.layout().marker_path(&steps[0])).unwrap();
    assert_eq!(marker.trim(), "0");
}

#[test]
fn test_required_failure_halts_later_steps() {
    let fx = Fixture::new();
    let ok = write_script(&fx.bin, "ok.sh", "exit 0");
    let fail = write_script(&fx.bin, "fail.sh", "exit 3");
    let steps = vec![
        step("partial_charge", &ok, true, &[]),
        step("simulation", &fail, true, &["partial_charge"]),
        step("analysis", &ok, true, &["simulation"]),
    ];

    let result = fx.run(&steps);
    assert_eq!(result.status(), WorkflowStatus::Failed);
    assert_eq!(result.halted_at.as_deref(), Some("simulation"));
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[1].1, StepOutcome::Failed { exit_code: 3 });

    // The halted step never ran: no marker, no directory.
    let layout = fx.layout();
    assert_eq!(check_step(&layout, &steps[2]), StepCompletion::New);
    assert!(!layout.step_dir(&steps[2]).exists());
}

#[test]
fn test_optional_failure_does_not_halt() {
    let fx = Fixture::new();
    let ok = write_script(&fx.bin, "ok.sh", "exit 0");
    let fail = write_script(&fx.bin, "fail.sh", "exit 1");
    let steps = vec![
        step("partial_charge", &ok, true, &[]),
        step("mincell_check", &fail, false, &[]),
        step("simulation", &ok, true, &["partial_charge"]),
    ];

    let result = fx.run(&steps);
    assert_eq!(result.status(), WorkflowStatus::Completed);
    assert_eq!(result.outcomes[1].1, StepOutcome::Failed { exit_code: 1 });
    assert_eq!(result.outcomes[2].1, StepOutcome::Completed);
}

#[test]
fn test_blocked_step_leaves_no_trace() {
    let fx = Fixture::new();
    let ok = write_script(&fx.bin, "ok.sh", "exit 0");
    let steps = vec![
        step("partial_charge", &ok, true, &[]),
        step("simulation", &ok, true, &["partial_charge"]),
    ];

    // Fail the prerequisite on disk, then try the dependent step directly.
    let layout = fx.layout();
    fs_err::create_dir_all(layout.step_dir(&steps[0])).unwrap();
    fs_err::write(layout.marker_path(&steps[0]), "1").unwrap();

    let env = StepEnv::default();
    let executor = StepExecutor::new(&fx.unit, &layout, &env);
    let outcome = executor
        .execute(&steps[1], &steps, &layout.step_dir(&steps[0]))
        .unwrap();

    assert_eq!(
        outcome,
        StepOutcome::Blocked {
            unmet: vec!["partial_charge".to_string()]
        }
    );
    assert_eq!(check_step(&layout, &steps[1]), StepCompletion::New);
    assert!(!layout.marker_path(&steps[1]).exists());
}

#[test]
fn test_retry_backs_up_failed_output() {
    let fx = Fixture::new();
    // Fails until the flag file appears, then succeeds.
    let flag = fx.bin.join("fixed.flag");
    let flaky = write_script(
        &fx.bin,
        "flaky.sh",
        &format!(
            "touch \"$3/partial.out\"\ntest -f \"{}\" || exit 9",
            flag.display()
        ),
    );
    let steps = vec![step("simulation", &flaky, true, &[])];

    let result = fx.run(&steps);
    assert_eq!(result.status(), WorkflowStatus::Failed);

    fs_err::write(&flag, "").unwrap();
    let result = fx.run(&steps);
    assert_eq!(result.status(), WorkflowStatus::Completed);

    // The failed attempt's directory was renamed aside, not overwritten.
    let layout = fx.layout();
    let backups: Vec<_> = fs_err::read_dir(layout.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("simulation.bak_")
        })
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].path().join("partial.out").exists());
    assert_eq!(check_step(&layout, &steps[0]), StepCompletion::Completed);
}

#[test]
fn test_interrupted_step_backed_up_and_rerun() {
    let fx = Fixture::new();
    let counter = fx.bin.join("invocations.txt");
    let count = write_script(
        &fx.bin,
        "count.sh",
        &format!("echo run >> \"{}\"", counter.display()),
    );
    let steps = vec![step("simulation", &count, true, &[])];

    // A preempted attempt: artifacts on disk, no marker yet.
    let layout = fx.layout();
    fs_err::create_dir_all(layout.step_dir(&steps[0])).unwrap();
    fs_err::write(layout.step_dir(&steps[0]).join("partial.out"), "x").unwrap();
    assert_eq!(check_step(&layout, &steps[0]), StepCompletion::InProgress);

    let result = fx.run(&steps);
    assert_eq!(result.status(), WorkflowStatus::Completed);
    assert_eq!(result.outcomes[0].1, StepOutcome::Completed);

    // The interrupted output was renamed aside, and the command ran once.
    let backups: Vec<_> = fs_err::read_dir(layout.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("simulation.bak_")
        })
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].path().join("partial.out").exists());
    let invocations = fs_err::read_to_string(&counter).unwrap();
    assert_eq!(invocations.lines().count(), 1);
}

#[test]
fn test_environment_forwarding() {
    let fx = Fixture::new();
    let dump = write_script(
        &fx.bin,
        "dump.sh",
        "printf '%s\\n%s\\n%s\\n' \"$FF_UFF\" \"$SIM_VAR_TEMPERATURE\" \"$TEMPLATE_SIMULATION_INPUT\" > \"$3/env.txt\"",
    );
    let template = fx.bin.join("sim.input");
    fs_err::write(&template, "template").unwrap();

    let mut steps = vec![step("simulation", &dump, true, &[])];
    steps[0].template = Some(template.clone());

    let mut forcefields = BTreeMap::new();
    forcefields.insert("UFF".to_string(), PathBuf::from("/ff/uff.def"));
    let mut variables = BTreeMap::new();
    variables.insert("temperature".to_string(), "298".to_string());
    let env = StepEnv {
        forcefields,
        variables,
    };

    let layout = fx.layout();
    let driver = WorkflowDriver::new(&fx.unit, &layout, &steps, &env);
    let result = driver.run().unwrap();
    assert_eq!(result.status(), WorkflowStatus::Completed);

    let dumped = fs_err::read_to_string(layout.step_dir(&steps[0]).join("env.txt")).unwrap();
    let lines: Vec<&str> = dumped.lines().collect();
    assert_eq!(lines[0], "/ff/uff.def");
    assert_eq!(lines[1], "298");
    assert_eq!(lines[2], template.to_string_lossy());
}
