use super::defaults::DefaultsConfig;
use super::file::{
    BeamType, FileBeamConfig, FileComposition, FileConfig, FileDecay, FileUnitCell,
    FileWedgeConfig,
};
use super::models::{CoefficientsConfig, RunConfig};
use crate::cli::{CoefficientsArgs, RunArgs};
use crate::error::{CliError, Result};
use nalgebra::Vector3;
use std::path::PathBuf;
use xdose::core::beam::{Beam, Collimation};
use xdose::core::coefficients::composition::UnitCell;
use xdose::core::coefficients::params::{CompositionParams, MacromoleculeParams, SolventParams};
use xdose::core::coefficients::sequence::SequenceComposition;
use xdose::core::wedge::Wedge;
use xdose::engine::config as core_config;

pub fn build_run_config(args: &RunArgs) -> Result<RunConfig> {
    let defaults = DefaultsConfig::default();

    let mut file_config = FileConfig::from_file(&args.config)?;
    apply_set_values(&mut file_config, &args.set_values)?;
    file_config.override_beams(args.energy, args.flux);

    let crystal_file = file_config.crystal.take().unwrap_or_default();
    let shape = crystal_file
        .shape
        .ok_or_else(|| required("crystal.shape"))?;
    let resolution = args
        .resolution
        .or(crystal_file.resolution)
        .ok_or_else(|| required("crystal.resolution"))?;
    let crystal = core_config::CrystalConfig {
        shape: shape.into(),
        resolution,
        angle_p_deg: crystal_file.angle_p.unwrap_or(defaults.angle_p_deg),
        angle_l_deg: crystal_file.angle_l.unwrap_or(defaults.angle_l_deg),
    };

    let composition = resolve_composition(
        file_config
            .composition
            .take()
            .ok_or_else(|| required("composition"))?,
        &defaults,
    )?;
    let exposures = resolve_exposures(&file_config, &defaults)?;

    let mut builder = core_config::ExperimentConfigBuilder::new()
        .crystal(crystal)
        .composition(composition)
        .exposures(exposures);
    if let Some(decay) = file_config.decay {
        builder = builder.decay(decay.into());
    }
    if let Some(limit) = file_config.dose_limit {
        builder = builder.dose_limit_mgy(limit);
    }

    let experiment = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    Ok(RunConfig {
        experiment,
        cross_sections: args.cross_sections.clone().or(file_config.cross_sections),
    })
}

pub fn build_coefficients_config(args: &CoefficientsArgs) -> Result<CoefficientsConfig> {
    let defaults = DefaultsConfig::default();

    let mut file_config = FileConfig::from_file(&args.config)?;
    apply_set_values(&mut file_config, &args.set_values)?;
    file_config.override_beams(args.energy, None);

    let composition = resolve_composition(
        file_config
            .composition
            .take()
            .ok_or_else(|| required("composition"))?,
        &defaults,
    )?;
    let beams = resolve_exposures(&file_config, &defaults)?
        .into_iter()
        .map(|exposure| exposure.beam)
        .collect();
    Ok(CoefficientsConfig {
        composition,
        beams,
        cross_sections: args.cross_sections.clone().or(file_config.cross_sections),
    })
}

fn required(key: &str) -> CliError {
    CliError::Config(format!(
        "A value for `{}` is required either in the config file or via CLI argument.",
        key
    ))
}

fn resolve_unit_cell(cell: FileUnitCell, defaults: &DefaultsConfig) -> Result<UnitCell> {
    UnitCell::new(
        cell.a,
        cell.b,
        cell.c,
        cell.alpha.unwrap_or(defaults.cell_angle_deg),
        cell.beta.unwrap_or(defaults.cell_angle_deg),
        cell.gamma.unwrap_or(defaults.cell_angle_deg),
    )
    .map_err(|e| CliError::Config(e.to_string()))
}

fn resolve_composition(
    composition: FileComposition,
    defaults: &DefaultsConfig,
) -> Result<core_config::CompositionConfig> {
    Ok(match composition {
        FileComposition::Params {
            unit_cell,
            num_monomers,
            residues_per_monomer,
            rna_per_monomer,
            dna_per_monomer,
            heavy_atoms_per_monomer,
            solvent_concentrations,
            solvent_fraction,
        } => core_config::CompositionConfig::Params(CompositionParams {
            unit_cell: resolve_unit_cell(unit_cell, defaults)?,
            macromolecule: MacromoleculeParams {
                num_monomers,
                residues_per_monomer,
                rna_per_monomer,
                dna_per_monomer,
                heavy_atoms_per_monomer,
            },
            solvent: SolventParams {
                concentrations_mm: solvent_concentrations,
                solvent_fraction,
            },
        }),
        FileComposition::Sequence {
            unit_cell,
            num_monomers,
            monomer_elements,
            heavy_atoms_per_monomer,
            solvent_concentrations,
            solvent_fraction,
        } => core_config::CompositionConfig::Sequence(SequenceComposition {
            unit_cell: resolve_unit_cell(unit_cell, defaults)?,
            num_monomers,
            monomer_elements,
            heavy_atoms_per_monomer,
            solvent: SolventParams {
                concentrations_mm: solvent_concentrations,
                solvent_fraction,
            },
        }),
    })
}

fn resolve_beam(beam: &FileBeamConfig) -> Result<Beam> {
    let flux = beam.flux.ok_or_else(|| required("beam.flux"))?;
    let energy = beam.energy.ok_or_else(|| required("beam.energy"))?;
    let collimation = beam.collimation.map(Collimation::from);
    let resolved = match beam.kind {
        BeamType::Tophat => {
            let collimation = collimation.ok_or_else(|| required("beam.collimation"))?;
            Beam::tophat(collimation, flux, energy)
        }
        BeamType::Gaussian => {
            let fwhm_x = beam.fwhm_x.ok_or_else(|| required("beam.fwhm-x"))?;
            let fwhm_y = beam.fwhm_y.ok_or_else(|| required("beam.fwhm-y"))?;
            Beam::gaussian(fwhm_x, fwhm_y, collimation, flux, energy)
        }
    };
    resolved.map_err(|e| CliError::Config(e.to_string()))
}

fn resolve_wedge(wedge: &FileWedgeConfig, defaults: &DefaultsConfig) -> Result<Wedge> {
    let mut resolved = Wedge::new(
        wedge.start_angle.unwrap_or(defaults.start_angle_deg),
        wedge
            .rotation_range
            .ok_or_else(|| required("wedge.rotation-range"))?,
        wedge
            .angular_resolution
            .unwrap_or(defaults.angular_resolution_deg),
        wedge
            .exposure_time
            .ok_or_else(|| required("wedge.exposure-time"))?,
    )
    .map_err(|e| CliError::Config(e.to_string()))?;

    if let Some(offset) = wedge.start_offset {
        resolved = resolved.with_start_offset(Vector3::from(offset));
    }
    if let Some(translation) = wedge.translate_per_degree {
        resolved = resolved.with_translation_per_degree(Vector3::from(translation));
    }
    if let Some(offset) = wedge.rot_ax_beam_offset {
        resolved = resolved.with_rot_ax_beam_offset(offset);
    }
    Ok(resolved)
}

fn resolve_exposures(
    config: &FileConfig,
    defaults: &DefaultsConfig,
) -> Result<Vec<core_config::Exposure>> {
    if config.exposures.is_empty() {
        return Err(CliError::Config(
            "At least one `[[exposure]]` section is required.".to_string(),
        ));
    }

    let mut previous: Option<&FileBeamConfig> = None;
    let mut exposures = Vec::with_capacity(config.exposures.len());
    for (index, exposure) in config.exposures.iter().enumerate() {
        let context = |e: CliError| CliError::Config(format!("Exposure {}: {}", index + 1, e));
        let beam_config = exposure.beam.as_ref().or(previous).ok_or_else(|| {
            context(CliError::Config(
                "no beam defined and no earlier beam to reuse".to_string(),
            ))
        })?;
        previous = Some(beam_config);

        exposures.push(core_config::Exposure {
            beam: resolve_beam(beam_config).map_err(context)?,
            wedge: resolve_wedge(&exposure.wedge, defaults).map_err(context)?,
        });
    }
    Ok(exposures)
}

fn apply_set_values(config: &mut FileConfig, set_values: &[String]) -> Result<()> {
    for kv_pair in set_values {
        let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;
        let float = || -> Result<f64> {
            value_str.parse().map_err(|_| {
                CliError::Config(format!("Invalid float value for {}: {}", key, value_str))
            })
        };

        match key {
            "crystal.resolution" => {
                config
                    .crystal
                    .get_or_insert_with(Default::default)
                    .resolution = Some(float()?);
            }
            "crystal.angle-p" => {
                config.crystal.get_or_insert_with(Default::default).angle_p = Some(float()?);
            }
            "crystal.angle-l" => {
                config.crystal.get_or_insert_with(Default::default).angle_l = Some(float()?);
            }
            "composition.solvent-fraction" => {
                let composition = config.composition.as_mut().ok_or_else(|| {
                    CliError::Config(format!("`{}` requires a [composition] section", key))
                })?;
                *composition.solvent_fraction_mut() = Some(float()?);
            }
            "decay.half-dose" => match config.decay.as_mut() {
                Some(FileDecay::Linear { half_dose } | FileDecay::Exponential { half_dose }) => {
                    *half_dose = float()?
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "`{}` requires a linear or exponential decay model",
                        key
                    )));
                }
            },
            "dose-limit" => {
                config.dose_limit = Some(float()?);
            }
            "beam.energy" => {
                let energy = float()?;
                config.override_beams(Some(energy), None);
            }
            "beam.flux" => {
                let flux = float()?;
                config.override_beams(None, Some(flux));
            }
            "cross-sections" => {
                config.cross_sections = Some(PathBuf::from(value_str));
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use xdose::engine::decay::DecayModel;

    const LYSOZYME_CONFIG: &str = r#"
        dose-limit = 20.0

        [crystal]
        resolution = 0.5
        angle-p = 10.0

        [crystal.shape]
        type = "cuboid"
        x = 40.0
        y = 30.0
        z = 20.0

        [composition]
        type = "params"
        unit-cell = { a = 79.2, b = 79.2, c = 38.1 }
        num-monomers = 8
        residues-per-monomer = 129
        heavy-atoms-per-monomer = { S = 8 }
        solvent-concentrations = { Na = 1200, Cl = 200 }

        [decay]
        type = "exponential"
        half-dose = 10.0

        [[exposure]]
        [exposure.beam]
        type = "tophat"
        flux = 1e12
        energy = 12.4
        collimation = { type = "rectangular", x = 100.0, y = 100.0 }
        [exposure.wedge]
        rotation-range = 90.0
        angular-resolution = 10.0
        exposure-time = 30.0

        [[exposure]]
        [exposure.wedge]
        start-angle = 90.0
        rotation-range = 45.0
        exposure-time = 15.0
        translate-per-degree = [0.1, 0.0, 0.0]
    "#;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn run_args(extra: &[&str], config_path: &Path) -> RunArgs {
        let mut args = vec!["xdose", "run", "-c", config_path.to_str().unwrap()];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Run(args) => args,
            other => panic!("Expected 'run' subcommand, got {other:?}"),
        }
    }

    fn merged(extra: &[&str], content: &str) -> Result<RunConfig> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "experiment.toml", content);
        build_run_config(&run_args(extra, &path))
    }

    #[test]
    fn load_from_file_and_merge_with_defaults() {
        let config = merged(&[], LYSOZYME_CONFIG).unwrap().experiment;

        assert_eq!(config.crystal.resolution, 0.5);
        assert_eq!(config.crystal.angle_p_deg, 10.0);
        assert_eq!(config.crystal.angle_l_deg, 0.0);
        assert_eq!(
            config.crystal.shape,
            core_config::ShapeConfig::Cuboid {
                x_um: 40.0,
                y_um: 30.0,
                z_um: 20.0
            }
        );
        assert_eq!(
            config.decay,
            DecayModel::Exponential {
                half_dose_mgy: 10.0
            }
        );
        assert_eq!(config.dose_limit_mgy, 20.0);
        assert_eq!(config.exposures.len(), 2);
        assert_eq!(config.exposures[0].wedge.step_count(), 9);
        assert_eq!(config.exposures[1].wedge.step_count(), 23);
        assert_eq!(config.exposures[1].wedge.start_angle_deg(), 90.0);
    }

    #[test]
    fn exposure_without_beam_reuses_previous_beam() {
        let config = merged(&[], LYSOZYME_CONFIG).unwrap().experiment;
        assert_eq!(config.exposures[0].beam, config.exposures[1].beam);
    }

    #[test]
    fn cli_args_override_file_values() {
        let config = merged(
            &["--resolution", "0.25", "--energy", "9.0", "--flux", "5e11"],
            LYSOZYME_CONFIG,
        )
        .unwrap()
        .experiment;

        assert_eq!(config.crystal.resolution, 0.25);
        for exposure in &config.exposures {
            assert_eq!(exposure.beam.energy_kev(), 9.0);
            assert_eq!(exposure.beam.flux(), 5e11);
        }
    }

    #[test]
    fn set_values_override_file_values() {
        let config = merged(
            &[
                "-S",
                "crystal.angle-l=30",
                "-S",
                "decay.half-dose=5.5",
                "-S",
                "composition.solvent-fraction=0.4",
                "-S",
                "dose-limit=12",
            ],
            LYSOZYME_CONFIG,
        )
        .unwrap()
        .experiment;

        assert_eq!(config.crystal.angle_l_deg, 30.0);
        assert_eq!(config.decay, DecayModel::Exponential { half_dose_mgy: 5.5 });
        assert_eq!(config.dose_limit_mgy, 12.0);
        let core_config::CompositionConfig::Params(params) = &config.composition else {
            panic!("Expected a parameter composition");
        };
        assert_eq!(params.solvent.solvent_fraction, Some(0.4));
    }

    #[test]
    fn cross_section_path_prefers_cli_over_file() {
        let with_file = format!("cross-sections = \"from-file.csv\"\n{}", LYSOZYME_CONFIG);
        let from_file = merged(&[], &with_file).unwrap();
        let from_cli = merged(&["--cross-sections", "from-cli.csv"], &with_file).unwrap();

        assert_eq!(from_file.cross_sections, Some(PathBuf::from("from-file.csv")));
        assert_eq!(from_cli.cross_sections, Some(PathBuf::from("from-cli.csv")));
    }

    #[test]
    fn unsupported_set_key_is_rejected() {
        let result = merged(&["-S", "crystal.colour=blue"], LYSOZYME_CONFIG);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("crystal.colour")));
    }

    #[test]
    fn malformed_set_value_is_rejected() {
        let result = merged(&["-S", "dose-limit"], LYSOZYME_CONFIG);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("KEY=VALUE")));
        let result = merged(&["-S", "dose-limit=lots"], LYSOZYME_CONFIG);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("Invalid float")));
    }

    #[test]
    fn half_dose_override_requires_a_decaying_model() {
        let simple = LYSOZYME_CONFIG.replace(
            "type = \"exponential\"\n        half-dose = 10.0",
            "type = \"simple\"",
        );
        let result = merged(&["-S", "decay.half-dose=3"], &simple);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("decay.half-dose")));
    }

    #[test]
    fn missing_resolution_returns_error() {
        let content = LYSOZYME_CONFIG.replace("resolution = 0.5", "");
        let result = merged(&[], &content);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("crystal.resolution")));
    }

    #[test]
    fn first_exposure_without_beam_is_rejected() {
        let content = r#"
            [crystal]
            resolution = 0.5
            shape = { type = "sphere", diameter = 30.0 }

            [composition]
            type = "params"
            unit-cell = { a = 50.0, b = 50.0, c = 50.0 }
            num-monomers = 2
            residues-per-monomer = 100

            [[exposure]]
            wedge = { rotation-range = 10.0, exposure-time = 1.0 }
        "#;
        let result = merged(&[], content);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.starts_with("Exposure 1")));
    }

    #[test]
    fn invalid_beam_surfaces_as_config_error() {
        let content = LYSOZYME_CONFIG.replace("flux = 1e12", "flux = -1.0");
        let result = merged(&[], &content);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("Exposure 1")));
    }

    #[test]
    fn sequence_composition_and_gaussian_beam_are_supported() {
        let content = r#"
            [crystal]
            resolution = 0.2
            shape = { type = "polyhedron", vertices = [[0, 0, 0], [10, 0, 0], [0, 10, 0], [0, 0, 10]], faces = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]] }

            [composition]
            type = "sequence"
            unit-cell = { a = 60.0, b = 60.0, c = 60.0, gamma = 120.0 }
            num-monomers = 6
            monomer-elements = { C = 500, N = 130, O = 150, H = 800, S = 6 }

            [[exposure]]
            beam = { type = "gaussian", flux = 1e12, energy = 12.4, fwhm-x = 20.0, fwhm-y = 10.0 }
            wedge = { rotation-range = 360.0, angular-resolution = 5.0, exposure-time = 72.0 }
        "#;
        let config = merged(&[], content).unwrap().experiment;

        assert!(matches!(
            config.crystal.shape,
            core_config::ShapeConfig::Polyhedron { ref faces, .. } if faces.len() == 4
        ));
        let core_config::CompositionConfig::Sequence(sequence) = &config.composition else {
            panic!("Expected a sequence composition");
        };
        assert_eq!(sequence.unit_cell.gamma, 120.0);
        assert_eq!(sequence.unit_cell.alpha, 90.0);
        assert_eq!(sequence.monomer_elements["S"], 6.0);
        assert_eq!(config.exposures[0].wedge.step_count(), 72);
    }

    #[test]
    fn wedge_without_resolution_uses_default_step() {
        let content = LYSOZYME_CONFIG.replace("angular-resolution = 10.0", "");
        let config = merged(&[], &content).unwrap().experiment;
        let default_step = DefaultsConfig::default().angular_resolution_deg;
        assert_eq!(
            config.exposures[0].wedge.step_count(),
            (90.0 / default_step) as usize
        );
    }

    #[test]
    fn coefficients_config_overrides_energy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "experiment.toml", LYSOZYME_CONFIG);
        let args = match Cli::parse_from([
            "xdose",
            "coefficients",
            "-c",
            path.to_str().unwrap(),
            "--energy",
            "8.05",
        ])
        .command
        {
            Commands::Coefficients(args) => args,
            other => panic!("Expected 'coefficients' subcommand, got {other:?}"),
        };
        let config = build_coefficients_config(&args).unwrap();

        assert_eq!(config.beams.len(), 2);
        assert!(config.beams.iter().all(|b| b.energy_kev() == 8.05));
    }
}
