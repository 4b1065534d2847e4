pub mod run;
pub mod run_unit;
pub mod status;
pub mod submit;
