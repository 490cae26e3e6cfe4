use crate::error::{CliError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use xdose::core::beam::Collimation;
use xdose::engine::config as core_config;
use xdose::engine::decay::DecayModel;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum FileShape {
    Cuboid {
        x: f64,
        y: f64,
        z: f64,
    },
    Sphere {
        diameter: f64,
    },
    Cylinder {
        diameter: f64,
        height: f64,
    },
    Polyhedron {
        vertices: Vec<[f64; 3]>,
        faces: Vec<Vec<usize>>,
    },
}

impl From<FileShape> for core_config::ShapeConfig {
    fn from(p: FileShape) -> Self {
        match p {
            FileShape::Cuboid { x, y, z } => Self::Cuboid {
                x_um: x,
                y_um: y,
                z_um: z,
            },
            FileShape::Sphere { diameter } => Self::Sphere {
                diameter_um: diameter,
            },
            FileShape::Cylinder { diameter, height } => Self::Cylinder {
                diameter_um: diameter,
                height_um: height,
            },
            FileShape::Polyhedron { vertices, faces } => Self::Polyhedron { vertices, faces },
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCrystalConfig {
    pub shape: Option<FileShape>,
    pub resolution: Option<f64>,
    pub angle_p: Option<f64>,
    pub angle_l: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct FileUnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    tag = "type"
)]
pub enum FileComposition {
    Params {
        unit_cell: FileUnitCell,
        num_monomers: u32,
        #[serde(default)]
        residues_per_monomer: u32,
        #[serde(default)]
        rna_per_monomer: u32,
        #[serde(default)]
        dna_per_monomer: u32,
        #[serde(default)]
        heavy_atoms_per_monomer: BTreeMap<String, f64>,
        #[serde(default)]
        solvent_concentrations: BTreeMap<String, f64>,
        solvent_fraction: Option<f64>,
    },
    Sequence {
        unit_cell: FileUnitCell,
        num_monomers: u32,
        monomer_elements: BTreeMap<String, f64>,
        #[serde(default)]
        heavy_atoms_per_monomer: BTreeMap<String, f64>,
        #[serde(default)]
        solvent_concentrations: BTreeMap<String, f64>,
        solvent_fraction: Option<f64>,
    },
}

impl FileComposition {
    pub fn solvent_fraction_mut(&mut self) -> &mut Option<f64> {
        match self {
            FileComposition::Params {
                solvent_fraction, ..
            }
            | FileComposition::Sequence {
                solvent_fraction, ..
            } => solvent_fraction,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case",
    tag = "type"
)]
pub enum FileDecay {
    Simple,
    Linear { half_dose: f64 },
    Exponential { half_dose: f64 },
}

impl From<FileDecay> for DecayModel {
    fn from(p: FileDecay) -> Self {
        match p {
            FileDecay::Simple => DecayModel::Simple,
            FileDecay::Linear { half_dose } => DecayModel::Linear {
                half_dose_mgy: half_dose,
            },
            FileDecay::Exponential { half_dose } => DecayModel::Exponential {
                half_dose_mgy: half_dose,
            },
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum BeamType {
    Tophat,
    Gaussian,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum FileCollimation {
    Rectangular { x: f64, y: f64 },
    Elliptical { x: f64, y: f64 },
}

impl From<FileCollimation> for Collimation {
    fn from(p: FileCollimation) -> Self {
        match p {
            FileCollimation::Rectangular { x, y } => Collimation::Rectangular { x_um: x, y_um: y },
            FileCollimation::Elliptical { x, y } => Collimation::Elliptical { x_um: x, y_um: y },
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBeamConfig {
    #[serde(rename = "type")]
    pub kind: BeamType,
    pub flux: Option<f64>,
    pub energy: Option<f64>,
    pub fwhm_x: Option<f64>,
    pub fwhm_y: Option<f64>,
    pub collimation: Option<FileCollimation>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileWedgeConfig {
    pub start_angle: Option<f64>,
    pub rotation_range: Option<f64>,
    pub angular_resolution: Option<f64>,
    pub exposure_time: Option<f64>,
    pub start_offset: Option<[f64; 3]>,
    pub translate_per_degree: Option<[f64; 3]>,
    pub rot_ax_beam_offset: Option<f64>,
}

/// One `[[exposure]]` table. An exposure without a beam reuses the previous one.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileExposure {
    pub beam: Option<FileBeamConfig>,
    pub wedge: FileWedgeConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub crystal: Option<FileCrystalConfig>,
    pub composition: Option<FileComposition>,
    #[serde(default, rename = "exposure")]
    pub exposures: Vec<FileExposure>,
    pub decay: Option<FileDecay>,
    pub dose_limit: Option<f64>,
    pub cross_sections: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Overrides energy and flux on every explicitly defined beam.
    pub fn override_beams(&mut self, energy: Option<f64>, flux: Option<f64>) {
        for beam in self.exposures.iter_mut().filter_map(|e| e.beam.as_mut()) {
            if energy.is_some() {
                beam.energy = energy;
            }
            if flux.is_some() {
                beam.flux = flux;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(content: &str) -> Result<FileConfig> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.toml");
        fs::write(&path, content).unwrap();
        FileConfig::from_file(&path)
    }

    #[test]
    fn unknown_fields_are_parse_errors() {
        let result = parse("[crystal]\nangle-q = 10.0\n");
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = FileConfig::from_file(Path::new("/nonexistent/experiment.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn exposure_tables_keep_file_order() {
        let config = parse(
            r#"
            [[exposure]]
            beam = { type = "tophat", energy = 12.4, collimation = { type = "elliptical", x = 50.0, y = 30.0 } }
            wedge = { rotation-range = 10.0 }

            [[exposure]]
            wedge = { start-angle = 10.0, rotation-range = 5.0 }
            "#,
        )
        .unwrap();

        assert_eq!(config.exposures.len(), 2);
        let beam = config.exposures[0].beam.as_ref().unwrap();
        assert_eq!(beam.kind, BeamType::Tophat);
        assert!(matches!(
            beam.collimation,
            Some(FileCollimation::Elliptical { x, y }) if x == 50.0 && y == 30.0
        ));
        assert!(config.exposures[1].beam.is_none());
        assert_eq!(config.exposures[1].wedge.start_angle, Some(10.0));
    }

    #[test]
    fn override_beams_leaves_missing_beams_alone() {
        let mut config = parse(
            r#"
            [[exposure]]
            beam = { type = "gaussian", flux = 1e12, energy = 12.4 }
            wedge = { rotation-range = 10.0 }

            [[exposure]]
            wedge = { rotation-range = 5.0 }
            "#,
        )
        .unwrap();

        config.override_beams(Some(9.0), None);

        let beam = config.exposures[0].beam.as_ref().unwrap();
        assert_eq!(beam.energy, Some(9.0));
        assert_eq!(beam.flux, Some(1e12));
        assert!(config.exposures[1].beam.is_none());
    }
}
