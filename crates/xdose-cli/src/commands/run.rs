use super::load_cross_sections;
use crate::cli::RunArgs;
use crate::config::build_run_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use tracing::info;
use xdose::engine::progress::ProgressReporter;
use xdose::engine::summary::DoseSummary;
use xdose::workflows;

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_run_config(&args)?;
    let provider = load_cross_sections(config.cross_sections.as_deref())?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.callback());

    println!(
        "Starting dose calculation ({} exposure(s))...",
        config.experiment.exposures.len()
    );
    info!("Invoking the core dose workflow...");
    let result = workflows::expose::run(&config.experiment, provider, &reporter)?;

    info!(
        voxels = result.summary.voxel_count,
        average_dose_mgy = result.summary.average_dose_whole_crystal_mgy,
        max_dose_mgy = result.summary.max_dose_mgy,
        dwd_mgy = result.summary.diffraction_weighted_dose_mgy,
        "Dose calculation finished."
    );
    print!("{}", format_summary(&result.summary));
    Ok(())
}

fn format_summary(summary: &DoseSummary) -> String {
    let rows = [
        (
            "Average dose (whole crystal)",
            format!("{:.6} MGy", summary.average_dose_whole_crystal_mgy),
        ),
        (
            "Average dose (exposed region)",
            format!("{:.6} MGy", summary.average_dose_exposed_region_mgy),
        ),
        ("Max dose", format!("{:.6} MGy", summary.max_dose_mgy)),
        (
            "Diffraction-weighted dose",
            format!("{:.6} MGy", summary.diffraction_weighted_dose_mgy),
        ),
        (
            "Elastic yield",
            format!("{:.4e} photons", summary.elastic_yield),
        ),
        (
            "Exposed voxels",
            format!(
                "{} / {} ({:.1}%)",
                summary.exposed_voxel_count,
                summary.voxel_count,
                summary.exposed_fraction * 100.0
            ),
        ),
        (
            "Above dose limit",
            format!(
                "{:.1}% of voxels > {} MGy",
                summary.fraction_above_limit * 100.0,
                summary.dose_limit_mgy
            ),
        ),
    ];
    let mut out = String::from("\nDose summary\n");
    for (label, value) in rows {
        out.push_str(&format!("  {:<30} {}\n", label, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_statistic() {
        let summary = DoseSummary {
            voxel_count: 200,
            exposed_voxel_count: 150,
            average_dose_whole_crystal_mgy: 1.5,
            average_dose_exposed_region_mgy: 2.0,
            max_dose_mgy: 4.25,
            diffraction_weighted_dose_mgy: 1.75,
            elastic_yield: 3.2e9,
            exposed_fraction: 0.75,
            dose_limit_mgy: 30.0,
            fraction_above_limit: 0.0,
        };
        let text = format_summary(&summary);

        assert!(text.contains("Max dose"));
        assert!(text.contains("4.250000 MGy"));
        assert!(text.contains("150 / 200 (75.0%)"));
        assert!(text.contains("0.0% of voxels > 30 MGy"));
        assert!(text.contains("3.2000e9 photons"));
    }
}
