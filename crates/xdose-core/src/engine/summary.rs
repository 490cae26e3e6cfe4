use super::dose::VoxelAccumulator;
use crate::core::geometry::grid::{VoxelGrid, VoxelIndex};
use nalgebra::Point3;

/// Whole-crystal statistics of a finished dose calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseSummary {
    pub voxel_count: usize,
    pub exposed_voxel_count: usize,
    pub average_dose_whole_crystal_mgy: f64,
    /// Mean over voxels that received any dose.
    pub average_dose_exposed_region_mgy: f64,
    pub max_dose_mgy: f64,
    pub diffraction_weighted_dose_mgy: f64,
    /// Elastically scattered photons leaving the crystal.
    pub elastic_yield: f64,
    pub exposed_fraction: f64,
    pub dose_limit_mgy: f64,
    pub fraction_above_limit: f64,
}

impl DoseSummary {
    pub fn from_accumulators(accumulators: &[VoxelAccumulator], dose_limit_mgy: f64) -> Self {
        let voxel_count = accumulators.len();
        let mut exposed_voxel_count = 0;
        let mut above_limit = 0;
        let mut total_dose = 0.0;
        let mut max_dose_mgy: f64 = 0.0;
        let mut elastic_yield = 0.0;
        let mut dwd_numerator = 0.0;
        let mut dwd_denominator = 0.0;

        for acc in accumulators {
            total_dose += acc.dose_mgy;
            max_dose_mgy = max_dose_mgy.max(acc.dose_mgy);
            elastic_yield += acc.elastic_yield;
            dwd_numerator += acc.dwd_numerator;
            dwd_denominator += acc.dwd_denominator;
            if acc.dose_mgy > 0.0 {
                exposed_voxel_count += 1;
            }
            if acc.dose_mgy > dose_limit_mgy {
                above_limit += 1;
            }
        }

        let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
        Self {
            voxel_count,
            exposed_voxel_count,
            average_dose_whole_crystal_mgy: ratio(total_dose, voxel_count as f64),
            average_dose_exposed_region_mgy: ratio(total_dose, exposed_voxel_count as f64),
            max_dose_mgy,
            diffraction_weighted_dose_mgy: ratio(dwd_numerator, dwd_denominator),
            elastic_yield,
            exposed_fraction: ratio(exposed_voxel_count as f64, voxel_count as f64),
            dose_limit_mgy,
            fraction_above_limit: ratio(above_limit as f64, voxel_count as f64),
        }
    }
}

/// Final per-voxel values over the interior of the crystal.
#[derive(Debug, Clone)]
pub struct DoseGrid {
    grid: VoxelGrid,
    voxels: Vec<VoxelIndex>,
    accumulators: Vec<VoxelAccumulator>,
}

impl DoseGrid {
    pub(crate) fn new(
        grid: VoxelGrid,
        voxels: Vec<VoxelIndex>,
        accumulators: Vec<VoxelAccumulator>,
    ) -> Self {
        Self {
            grid,
            voxels,
            accumulators,
        }
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Accumulated values at an interior voxel; `None` outside the crystal.
    pub fn at(&self, index: VoxelIndex) -> Option<&VoxelAccumulator> {
        self.voxels
            .binary_search(&index)
            .ok()
            .map(|pos| &self.accumulators[pos])
    }

    pub fn dose_at(&self, index: VoxelIndex) -> Option<f64> {
        self.at(index).map(|acc| acc.dose_mgy)
    }

    /// Interior voxels in grid order with their crystal-frame coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelIndex, Point3<f64>, &VoxelAccumulator)> {
        self.voxels
            .iter()
            .zip(&self.accumulators)
            .map(|(&index, acc)| (index, self.grid.coordinate(index), acc))
    }
}

#[derive(Debug, Clone)]
pub struct DoseResult {
    pub grid: DoseGrid,
    pub summary: DoseSummary,
}
