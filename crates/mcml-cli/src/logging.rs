use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
    registry::LookupSpan,
};

pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Plain-text layer for `--log-file`. Records thread ids so lines from
/// parallel photon chunks can be told apart, and keeps the enclosing run
/// span on every line.
fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter(verbosity, quiet))
        .with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(path).map_err(CliError::Io)?;

        subscriber.with(file_layer(file)).try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install the logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{debug, error, info, info_span, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    fn read_log_of<F: FnOnce()>(emit: F) -> String {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("mcml.log");
        let file = File::create(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(level_filter(3, false))
            .with(file_layer(file));
        tracing::subscriber::with_default(subscriber, emit);
        std::fs::read_to_string(log_path).unwrap()
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        let span = info_span!("run", run = 1, label = "skin");
        let _enter = span.enter();
        error!(run = 1, reason = "missing source", "Run setup failed.");
        warn!(run = 1, photon = 3, uz = 0.0, "Packet is guided by a clear layer.");
        info!(run = 1, photons = 1000, "Tracing photons.");
        debug!(photon = 17, weight = 0.25, "Packet survived roulette.");
        trace!(photon = 17, layer = 2, step = 0.013, "Hop.");
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn file_log_keeps_run_span_and_photon_fields() {
        let content = read_log_of(|| {
            let span = info_span!("run", run = 2, label = "skin");
            let _enter = span.enter();
            info!(photons = 1000, "Tracing photons.");
            debug!(photon = 17, weight = 0.25, "Packet terminated by roulette.");
        });

        assert!(content.contains("Tracing photons."));
        assert!(content.contains("photons=1000"));
        assert!(content.contains("photon=17"));
        assert!(content.contains("weight=0.25"));
        assert_eq!(content.matches("run{run=2").count(), 2);
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn file_log_attributes_lines_to_their_run() {
        let content = read_log_of(|| {
            for run in 1..=2 {
                let span = info_span!("run", run);
                let _enter = span.enter();
                info!(photons = 100 * run, "Run finished.");
            }
        });

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("run{run=1}") && lines[0].contains("photons=100"));
        assert!(lines[1].contains("run{run=2}") && lines[1].contains("photons=200"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = Path::new("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
