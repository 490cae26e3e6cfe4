use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

/// Target prefix shared by the dose library and this binary.
const XDOSE_TARGET: &str = "xdose";

/// Installs the global subscriber.
///
/// `-v`/`-vv` raise only the xdose targets; dependencies stay at WARN until `-vvv`.
/// A log file always records at least DEBUG, plus a line per closed span, which
/// gives the wall time of every `wedge_exposure`.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let console_level = if quiet {
        LevelFilter::ERROR
    } else {
        level_for(verbosity)
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .with_filter(targets(console_level, verbosity));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(&path)?;
            let level = console_level.max(LevelFilter::DEBUG);
            Some(file_layer(file, targets(level, verbosity)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {}", e)))
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn targets(level: LevelFilter, verbosity: u8) -> Targets {
    let dependencies = if verbosity >= 3 {
        level
    } else {
        level.min(LevelFilter::WARN)
    };
    Targets::new()
        .with_target(XDOSE_TARGET, level)
        .with_default(dependencies)
}

fn file_layer<S>(file: File, filter: Targets) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{Level, debug, info, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn verbosity_maps_to_increasing_levels() {
        assert_eq!(level_for(0), LevelFilter::WARN);
        assert_eq!(level_for(1), LevelFilter::INFO);
        assert_eq!(level_for(2), LevelFilter::DEBUG);
        assert_eq!(level_for(7), LevelFilter::TRACE);
    }

    #[test]
    fn verbose_flags_raise_only_xdose_targets() {
        let filter = targets(level_for(2), 2);
        assert!(filter.would_enable("xdose::engine::dose", &Level::DEBUG));
        assert!(!filter.would_enable("xdose::engine::dose", &Level::TRACE));
        assert!(!filter.would_enable("rayon_core", &Level::INFO));
        assert!(filter.would_enable("rayon_core", &Level::WARN));

        let everything = targets(level_for(3), 3);
        assert!(everything.would_enable("rayon_core", &Level::TRACE));
    }

    #[test]
    fn quiet_keeps_errors_only() {
        let filter = targets(LevelFilter::ERROR, 0);
        assert!(filter.would_enable("xdose", &Level::ERROR));
        assert!(!filter.would_enable("xdose", &Level::WARN));
        assert!(!filter.would_enable("toml", &Level::WARN));
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        warn!("Crystal has few interior voxels");
        info!(interior_voxels = 27, "Crystal ready.");
        debug!(steps = 45, "Starting wedge.");
    }

    #[test]
    #[serial]
    fn second_initialization_is_an_error() {
        ensure_global_logger_is_set();
        let result = setup_logging(0, false, None);
        assert!(matches!(result, Err(CliError::Other(_))));
    }

    #[test]
    #[serial]
    fn log_file_records_wedge_spans_and_skips_dependency_noise() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("dose.log");
        let file = File::create(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(file_layer(file, targets(LevelFilter::DEBUG, 0)));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("wedge_exposure", energy_kev = 12.4);
            let _guard = span.enter();
            debug!("Starting wedge.");
            debug!(target: "rayon_core", "worker parked");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Starting wedge."));
        assert!(content.contains("energy_kev=12.4"));
        assert!(content.contains("close"));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains("worker parked"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
