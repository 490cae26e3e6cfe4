use super::config::ConfigError;
use crate::core::coefficients::CoefficientError;
use crate::core::data::cross_sections::ReferenceDataError;
use crate::core::geometry::GeometryError;
use crate::core::geometry::grid::VoxelIndex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Coefficient calculation failed: {source}")]
    Coefficients {
        #[from]
        source: CoefficientError,
    },

    #[error("Failed to load reference data: {0}")]
    ReferenceData(#[from] ReferenceDataError),

    #[error("Depth finding failed at voxel {voxel:?}, angle {angle_deg:.3}° (face {face:?}): {source}")]
    Geometry {
        voxel: VoxelIndex,
        angle_deg: f64,
        face: Option<usize>,
        #[source]
        source: GeometryError,
    },

    #[error("Non-physical dose increment {value} at voxel {voxel:?}, angle {angle_deg:.3}°")]
    NumericInvariant {
        voxel: VoxelIndex,
        angle_deg: f64,
        value: f64,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn geometry(voxel: VoxelIndex, angle_deg: f64, source: GeometryError) -> Self {
        let face = match &source {
            GeometryError::UnterminatedParity { face } => *face,
        };
        EngineError::Geometry {
            voxel,
            angle_deg,
            face,
            source,
        }
    }
}
