use super::decay::DecayModel;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::summary::{DoseGrid, DoseResult, DoseSummary};
use crate::core::beam::Beam;
use crate::core::coefficients::CoefficientSet;
use crate::core::geometry::crystal::{Crystal, DepthSnapshot};
use crate::core::geometry::grid::VoxelIndex;
use crate::core::wedge::{AngleStep, Wedge};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Mass of 1 µm³ at 1 g/ml, in kg.
const KG_PER_CUBIC_MICRON_PER_G_ML: f64 = 1e-15;
const GY_TO_MGY: f64 = 1e-6;

/// Running totals for one interior voxel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoxelAccumulator {
    pub dose_mgy: f64,
    /// Photons/µm² that reached the voxel.
    pub fluence: f64,
    /// Elastically scattered photons from this voxel that escape the crystal.
    pub elastic_yield: f64,
    pub(crate) dwd_numerator: f64,
    pub(crate) dwd_denominator: f64,
}

impl VoxelAccumulator {
    fn accumulate(&mut self, dose: f64, fluence: f64, elastic: f64, decay: &DecayModel) {
        // Weight by the dose halfway through the step.
        let mid_dose = self.dose_mgy + dose / 2.0;
        let weight = fluence * decay.relative_efficiency(mid_dose);
        self.dwd_numerator += mid_dose * weight;
        self.dwd_denominator += weight;

        self.dose_mgy += dose;
        self.fluence += fluence;
        self.elastic_yield += elastic;
    }
}

/// Accumulators for every interior voxel of a crystal, in grid order.
#[derive(Debug, Clone)]
pub struct DoseState {
    accumulators: Vec<VoxelAccumulator>,
}

impl DoseState {
    pub fn accumulators(&self) -> &[VoxelAccumulator] {
        &self.accumulators
    }
}

/// Per-exposure constants converting fluence into dose and elastic yield.
#[derive(Debug, Clone, Copy)]
struct FluenceFactors {
    attenuation: f64,
    dose_per_fluence: f64,
    elastic_per_fluence: f64,
}

impl FluenceFactors {
    fn new(coefficients: &CoefficientSet, beam: &Beam, voxel_size: f64) -> Self {
        let absorbed_fraction = -(-coefficients.absorption * voxel_size).exp_m1();
        let elastic_fraction = -(-coefficients.elastic * voxel_size).exp_m1();
        let voxel_mass_kg = voxel_size * KG_PER_CUBIC_MICRON_PER_G_ML * coefficients.density;
        Self {
            attenuation: coefficients.attenuation,
            dose_per_fluence: absorbed_fraction * beam.photon_energy_joules() / voxel_mass_kg
                * GY_TO_MGY,
            elastic_per_fluence: voxel_size * voxel_size * elastic_fraction,
        }
    }
}

pub struct DoseEngine<'a> {
    crystal: &'a Crystal,
    decay: DecayModel,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a> DoseEngine<'a> {
    pub fn new(crystal: &'a Crystal, decay: DecayModel, reporter: &'a ProgressReporter<'a>) -> Self {
        Self {
            crystal,
            decay,
            reporter,
        }
    }

    pub fn new_state(&self) -> DoseState {
        DoseState {
            accumulators: vec![VoxelAccumulator::default(); self.crystal.interior_voxels().len()],
        }
    }

    /// Accumulates one wedge into `state`, angle step by angle step.
    ///
    /// `coefficients` must correspond to the beam energy and stay fixed for the
    /// whole wedge.
    #[instrument(skip_all, name = "wedge_exposure", fields(energy_kev = beam.energy_kev()))]
    pub fn expose(
        &self,
        state: &mut DoseState,
        beam: &Beam,
        wedge: &Wedge,
        coefficients: &CoefficientSet,
    ) -> Result<(), EngineError> {
        if state.accumulators.len() != self.crystal.interior_voxels().len() {
            return Err(EngineError::Internal(format!(
                "dose state holds {} voxels but the crystal has {}",
                state.accumulators.len(),
                self.crystal.interior_voxels().len()
            )));
        }
        let factors = FluenceFactors::new(coefficients, beam, self.crystal.grid().voxel_size());
        debug!(
            steps = wedge.step_count(),
            dose_per_fluence = factors.dose_per_fluence,
            "Starting wedge."
        );

        self.reporter.report(Progress::WedgeStart {
            angle_steps: wedge.step_count() as u64,
            voxels: state.accumulators.len(),
        });
        for step in wedge.steps() {
            let snapshot = self.crystal.setup_depth_finding(&step);
            self.expose_step(&mut state.accumulators, beam, wedge, &step, &snapshot, &factors)?;
            self.reporter.report(Progress::AngleStepDone {
                angle_deg: step.angle_deg,
            });
        }
        self.reporter.report(Progress::WedgeFinish);
        Ok(())
    }

    fn expose_step(
        &self,
        accumulators: &mut [VoxelAccumulator],
        beam: &Beam,
        wedge: &Wedge,
        step: &AngleStep,
        snapshot: &DepthSnapshot,
        factors: &FluenceFactors,
    ) -> Result<(), EngineError> {
        let voxels = self.crystal.interior_voxels();

        #[cfg(not(feature = "parallel"))]
        let iterator = voxels.iter().zip(accumulators.iter_mut());

        #[cfg(feature = "parallel")]
        let iterator = voxels.par_iter().zip(accumulators.par_iter_mut());

        iterator.try_for_each(|(&voxel, acc)| {
            self.expose_voxel(voxel, acc, beam, wedge, step, snapshot, factors)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn expose_voxel(
        &self,
        voxel: VoxelIndex,
        acc: &mut VoxelAccumulator,
        beam: &Beam,
        wedge: &Wedge,
        step: &AngleStep,
        snapshot: &DepthSnapshot,
        factors: &FluenceFactors,
    ) -> Result<(), EngineError> {
        let point = self.crystal.grid().coordinate(voxel);
        let in_beam = wedge.to_beam_frame(&point, step);
        let intensity = beam.intensity(in_beam.x, in_beam.y);
        if intensity == 0.0 {
            return Ok(());
        }

        let depth = self
            .crystal
            .find_depth(&point, snapshot)
            .map_err(|e| EngineError::geometry(voxel, step.angle_deg, e))?;
        let exit_depth = self
            .crystal
            .find_exit_depth(&point, snapshot)
            .map_err(|e| EngineError::geometry(voxel, step.angle_deg, e))?;

        let fluence = intensity * step.exposure_s * (-factors.attenuation * depth).exp();
        let dose = fluence * factors.dose_per_fluence;
        let elastic =
            fluence * factors.elastic_per_fluence * (-factors.attenuation * exit_depth).exp();

        for value in [dose, elastic] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::NumericInvariant {
                    voxel,
                    angle_deg: step.angle_deg,
                    value,
                });
            }
        }

        acc.accumulate(dose, fluence, elastic, &self.decay);
        Ok(())
    }

    /// Derives summary statistics and hands the grid over as the run's result.
    pub fn finalize(&self, state: DoseState, dose_limit_mgy: f64) -> DoseResult {
        let summary = DoseSummary::from_accumulators(&state.accumulators, dose_limit_mgy);
        let grid = DoseGrid::new(
            self.crystal.grid().clone(),
            self.crystal.interior_voxels().to_vec(),
            state.accumulators,
        );
        DoseResult { grid, summary }
    }
}
