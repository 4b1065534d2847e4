pub mod markers {
    /// Per-step status marker holding the step's decimal exit code.
    pub const EXIT_STATUS: &str = "exit_status.log";
}

pub mod files {
    pub const STATUS_TABLE: &str = "job_status.csv";
    pub const FAILED_UNITS: &str = "failed_units.txt";
    pub const FILE_LIST: &str = "structure_file_list.txt";
    pub const PARAM_MATRIX: &str = "parameter_matrix.json";
}

pub mod dirs {
    pub const BATCHES: &str = "batches";
    pub const SCRIPTS: &str = "job_scripts";
    pub const LOGS: &str = "job_logs";
    pub const RESULTS: &str = "results";
}

pub mod env {
    pub const FORCEFIELD_PREFIX: &str = "FF_";
    pub const SIM_VAR_PREFIX: &str = "SIM_VAR_";
    pub const TEMPLATE_PREFIX: &str = "TEMPLATE_";
    pub const TEMPLATE_SUFFIX: &str = "_INPUT";
}
