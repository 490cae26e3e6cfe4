use std::path::PathBuf;
use xdose::core::beam::Beam;
use xdose::engine::config as core_config;

/// A fully merged `run` configuration.
#[derive(Debug)]
pub struct RunConfig {
    pub experiment: core_config::ExperimentConfig,
    pub cross_sections: Option<PathBuf>,
}

/// Inputs of the `coefficients` command.
#[derive(Debug)]
pub struct CoefficientsConfig {
    pub composition: core_config::CompositionConfig,
    pub beams: Vec<Beam>,
    pub cross_sections: Option<PathBuf>,
}
