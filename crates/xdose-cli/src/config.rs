mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_coefficients_config, build_run_config};
