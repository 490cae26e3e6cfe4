use crate::core::coefficients::params::ParamsCalculator;
use crate::core::coefficients::sequence::SequenceCalculator;
use crate::core::coefficients::{CoefficientSet, CoefficientSource};
use crate::core::data::cross_sections::CrossSectionProvider;
use crate::core::geometry::crystal::Crystal;
use crate::engine::config::{CompositionConfig, ConfigError, CrystalConfig, ExperimentConfig};
use crate::engine::dose::DoseEngine;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::summary::DoseResult;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[instrument(skip_all, name = "dose_workflow")]
pub fn run(
    config: &ExperimentConfig,
    provider: Arc<dyn CrossSectionProvider>,
    reporter: &ProgressReporter,
) -> Result<DoseResult, EngineError> {
    // === Phase 0: Crystal and composition ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    info!("Building crystal and resolving composition.");

    let crystal = build_crystal(&config.crystal)?;
    let mut source = build_coefficient_source(&config.composition, provider)?;
    info!(
        interior_voxels = crystal.interior_voxels().len(),
        voxel_size_um = crystal.grid().voxel_size(),
        "Crystal ready."
    );

    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Exposures ===
    reporter.report(Progress::PhaseStart { name: "Exposure" });
    let engine = DoseEngine::new(&crystal, config.decay, reporter);
    let mut state = engine.new_state();
    let mut current: Option<CoefficientSet> = None;
    let total = config.exposures.len();

    for (index, exposure) in config.exposures.iter().enumerate() {
        let energy_kev = exposure.beam.energy_kev();
        reporter.report(Progress::ExposureStart {
            index,
            total,
            energy_kev,
        });

        let coefficients = match current {
            Some(set) if set.energy_kev == energy_kev => set,
            _ => {
                let set = source.update_coefficients(&exposure.beam)?;
                info!(
                    energy_kev,
                    absorption = set.absorption,
                    elastic = set.elastic,
                    attenuation = set.attenuation,
                    density = set.density,
                    "Coefficients updated."
                );
                reporter.report(Progress::Message(format!(
                    "{energy_kev:.2} keV: absorption {:.3e} µm⁻¹, attenuation {:.3e} µm⁻¹",
                    set.absorption, set.attenuation
                )));
                current = Some(set);
                set
            }
        };

        debug!(
            exposure = index + 1,
            total,
            steps = exposure.wedge.step_count(),
            "Exposing wedge."
        );
        engine.expose(&mut state, &exposure.beam, &exposure.wedge, &coefficients)?;
    }
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Statistics ===
    let result = engine.finalize(state, config.dose_limit_mgy);
    info!(
        max_dose_mgy = result.summary.max_dose_mgy,
        dwd_mgy = result.summary.diffraction_weighted_dose_mgy,
        "Workflow complete."
    );
    Ok(result)
}

pub fn build_crystal(config: &CrystalConfig) -> Result<Crystal, ConfigError> {
    let shape = config.shape.to_shape()?;
    Ok(Crystal::new(
        shape,
        config.angle_p_deg,
        config.angle_l_deg,
        config.resolution,
    )?)
}

pub fn build_coefficient_source(
    config: &CompositionConfig,
    provider: Arc<dyn CrossSectionProvider>,
) -> Result<Box<dyn CoefficientSource>, EngineError> {
    let source: Box<dyn CoefficientSource> = match config {
        CompositionConfig::Params(params) => Box::new(ParamsCalculator::new(params, provider)?),
        CompositionConfig::Sequence(sequence) => {
            Box::new(SequenceCalculator::new(sequence, provider)?)
        }
    };
    Ok(source)
}
