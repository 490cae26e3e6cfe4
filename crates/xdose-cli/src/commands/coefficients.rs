use super::load_cross_sections;
use crate::cli::CoefficientsArgs;
use crate::config::build_coefficients_config;
use crate::error::Result;
use tracing::info;
use xdose::core::coefficients::composition::Composition;
use xdose::engine::error::EngineError;
use xdose::workflows::expose::build_coefficient_source;

pub fn run(args: CoefficientsArgs) -> Result<()> {
    let config = build_coefficients_config(&args)?;
    let provider = load_cross_sections(config.cross_sections.as_deref())?;

    let mut source = build_coefficient_source(&config.composition, provider)?;
    print!("{}", format_composition(source.composition()));

    let mut energies: Vec<f64> = Vec::new();
    println!(
        "\n  {:>10} {:>14} {:>14} {:>14} {:>14} {:>12}",
        "keV", "absorption", "elastic", "inelastic", "attenuation", "density"
    );
    for beam in &config.beams {
        if energies.contains(&beam.energy_kev()) {
            continue;
        }
        energies.push(beam.energy_kev());

        let set = source.update_coefficients(beam).map_err(EngineError::from)?;
        info!(energy_kev = set.energy_kev, attenuation = set.attenuation, "Coefficients computed.");
        println!(
            "  {:>10.3} {:>14.6e} {:>14.6e} {:>14.6e} {:>14.6e} {:>12.4}",
            set.energy_kev, set.absorption, set.elastic, set.inelastic, set.attenuation, set.density
        );
    }
    println!("  (coefficients in µm⁻¹, density in g/ml)");
    Ok(())
}

fn format_composition(composition: &Composition) -> String {
    let mut out = format!(
        "Unit cell volume: {:.1} Å³\nSolvent fraction: {:.3}\n\n  {:<4} {:>16} {:>16}\n",
        composition.cell_volume(),
        composition.solvent_fraction(),
        "El",
        "macromolecule",
        "solvent"
    );
    for element in composition.elements() {
        out.push_str(&format!(
            "  {:<4} {:>16.3} {:>16.3}\n",
            element,
            composition.macromolecular_occurrence(element),
            composition.solvent_occurrence(element)
        ));
    }
    out
}
