use super::decay::DecayModel;
use crate::core::beam::{Beam, BeamError};
use crate::core::coefficients::composition::CompositionError;
use crate::core::coefficients::params::CompositionParams;
use crate::core::coefficients::sequence::SequenceComposition;
use crate::core::geometry::ShapeError;
use crate::core::geometry::crystal::CrystalShape;
use crate::core::geometry::mesh::Mesh;
use crate::core::geometry::primitives::{Cuboid, Cylinder, Primitive, Sphere};
use crate::core::wedge::{Wedge, WedgeError};
use nalgebra::Point3;
use thiserror::Error;

pub const DEFAULT_DOSE_LIMIT_MGY: f64 = 30.0;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Invalid crystal shape: {0}")]
    Shape(#[from] ShapeError),
    #[error("Invalid beam: {0}")]
    Beam(#[from] BeamError),
    #[error("Invalid wedge: {0}")]
    Wedge(#[from] WedgeError),
    #[error("Invalid composition: {0}")]
    Composition(#[from] CompositionError),
}

/// Crystal shape dimensions in µm, before mounting orientation is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeConfig {
    Cuboid { x_um: f64, y_um: f64, z_um: f64 },
    Sphere { diameter_um: f64 },
    Cylinder { diameter_um: f64, height_um: f64 },
    Polyhedron {
        vertices: Vec<[f64; 3]>,
        faces: Vec<Vec<usize>>,
    },
}

impl ShapeConfig {
    pub fn to_shape(&self) -> Result<CrystalShape, ShapeError> {
        Ok(match self {
            ShapeConfig::Cuboid { x_um, y_um, z_um } => {
                CrystalShape::Primitive(Primitive::Cuboid(Cuboid::new(*x_um, *y_um, *z_um)?))
            }
            ShapeConfig::Sphere { diameter_um } => {
                CrystalShape::Primitive(Primitive::Sphere(Sphere::new(*diameter_um)?))
            }
            ShapeConfig::Cylinder {
                diameter_um,
                height_um,
            } => CrystalShape::Primitive(Primitive::Cylinder(Cylinder::new(
                *diameter_um,
                *height_um,
            )?)),
            ShapeConfig::Polyhedron { vertices, faces } => {
                let vertices = vertices.iter().map(|&v| Point3::from(v)).collect();
                CrystalShape::Polyhedron(Mesh::new(vertices, faces.clone())?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrystalConfig {
    pub shape: ShapeConfig,
    /// Voxels per µm.
    pub resolution: f64,
    pub angle_p_deg: f64,
    pub angle_l_deg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompositionConfig {
    Params(CompositionParams),
    Sequence(SequenceComposition),
}

/// One beam and the wedge collected with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    pub beam: Beam,
    pub wedge: Wedge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub crystal: CrystalConfig,
    pub composition: CompositionConfig,
    /// Exposures in acquisition order, all accumulated into the same crystal.
    pub exposures: Vec<Exposure>,
    pub decay: DecayModel,
    pub dose_limit_mgy: f64,
}

#[derive(Default)]
pub struct ExperimentConfigBuilder {
    crystal: Option<CrystalConfig>,
    composition: Option<CompositionConfig>,
    exposures: Vec<Exposure>,
    decay: Option<DecayModel>,
    dose_limit_mgy: Option<f64>,
}

impl ExperimentConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crystal(mut self, crystal: CrystalConfig) -> Self {
        self.crystal = Some(crystal);
        self
    }
    pub fn composition(mut self, composition: CompositionConfig) -> Self {
        self.composition = Some(composition);
        self
    }
    pub fn exposure(mut self, beam: Beam, wedge: Wedge) -> Self {
        self.exposures.push(Exposure { beam, wedge });
        self
    }
    pub fn exposures(mut self, exposures: Vec<Exposure>) -> Self {
        self.exposures = exposures;
        self
    }
    pub fn decay(mut self, decay: DecayModel) -> Self {
        self.decay = Some(decay);
        self
    }
    pub fn dose_limit_mgy(mut self, limit: f64) -> Self {
        self.dose_limit_mgy = Some(limit);
        self
    }

    pub fn build(self) -> Result<ExperimentConfig, ConfigError> {
        let crystal = self
            .crystal
            .ok_or(ConfigError::MissingParameter("crystal"))?;
        let composition = self
            .composition
            .ok_or(ConfigError::MissingParameter("composition"))?;
        if self.exposures.is_empty() {
            return Err(ConfigError::MissingParameter("exposures"));
        }

        if !(crystal.resolution.is_finite() && crystal.resolution > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "resolution",
                reason: format!("{} voxels/µm is not positive", crystal.resolution),
            });
        }
        for (name, angle) in [("angle_p", crystal.angle_p_deg), ("angle_l", crystal.angle_l_deg)] {
            if !angle.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("{angle} is not a finite angle"),
                });
            }
        }
        crystal.shape.to_shape()?;

        let decay = self.decay.unwrap_or_default();
        if let Some(half_dose) = decay.half_dose_mgy() {
            if !(half_dose.is_finite() && half_dose > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "half_dose",
                    reason: format!("{half_dose} MGy is not positive"),
                });
            }
        }

        let dose_limit_mgy = self.dose_limit_mgy.unwrap_or(DEFAULT_DOSE_LIMIT_MGY);
        if !(dose_limit_mgy.is_finite() && dose_limit_mgy > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "dose_limit",
                reason: format!("{dose_limit_mgy} MGy is not positive"),
            });
        }

        Ok(ExperimentConfig {
            crystal,
            composition,
            exposures: self.exposures,
            decay,
            dose_limit_mgy,
        })
    }
}
