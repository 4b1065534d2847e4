pub mod batches;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod model;
pub mod params;
