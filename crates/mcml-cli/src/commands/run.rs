use super::load_parameters;
use crate::cli::RunArgs;
use crate::config::{PartialSimulationConfig, source_override};
use crate::error::{CliError, Result};
use crate::prompt::{InteractiveSetup, prompt_input_path};
use crate::utils::progress::CliProgressHandler;
use mcmlpp::{
    core::transport::standard::StandardKernel,
    engine::{progress::ProgressReporter, report::FileResultSink},
    workflows::{self, simulate::RunSummary},
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

/// What one pass over the parameter file produced.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// 1-based pass number.
    pub pass: u32,
    pub seed: Option<u64>,
    pub summaries: Vec<RunSummary>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    execute(&args, &mut io::stdout()).map(|_| ())
}

/// Executes `--repeat` passes over the parameter file, writing the per-run
/// results to `out`.
fn execute<W: Write>(args: &RunArgs, out: &mut W) -> Result<Vec<PassOutcome>> {
    let partial_config = PartialSimulationConfig::load(args)?;
    let source = source_override(args)?;
    let input = resolve_input(args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let kernel = StandardKernel::new();
    let mut outcomes = Vec::with_capacity(args.repeat as usize);

    for pass in 0..args.repeat {
        info!("Merging configuration from file and CLI arguments...");
        let config = partial_config.merge_with_cli(args, pass)?;
        let parameters = load_parameters(&input)?;

        if args.repeat > 1 {
            writeln!(out, "Pass {}/{}", pass + 1, args.repeat)?;
        }
        writeln!(
            out,
            "Starting {} run(s) from {}...",
            parameters.num_runs(),
            input.display()
        )?;

        let mut setup = InteractiveSetup::new(io::stdin().lock(), io::stdout(), !args.non_interactive)
            .with_label(args.label.clone())
            .with_source(source.clone());
        let mut sink = FileResultSink::new();

        info!(pass = pass + 1, seed = ?config.seed, "Invoking the core simulation workflow...");
        let summaries = tokio::task::block_in_place(|| {
            workflows::simulate::run(&parameters, &config, &kernel, &mut setup, &mut sink, &reporter)
        })?;

        for summary in &summaries {
            write_summary(out, summary)?;
        }
        for path in sink.written() {
            writeln!(out, "  wrote {}", path.display())?;
        }
        outcomes.push(PassOutcome {
            pass: pass + 1,
            seed: config.seed,
            summaries,
        });
    }

    Ok(outcomes)
}

fn resolve_input(args: &RunArgs) -> Result<PathBuf> {
    match &args.input {
        Some(path) => Ok(path.clone()),
        None if args.non_interactive => Err(CliError::Argument(
            "an input parameter file is required with --non-interactive".to_string(),
        )),
        None => prompt_input_path(io::stdin().lock(), io::stdout()),
    }
}

fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
    writeln!(
        out,
        "✓ Run {} '{}' [{}]: {} photons, {} steps",
        summary.run, summary.label, summary.source, summary.photons, summary.steps
    )?;
    writeln!(
        out,
        "    Rsp {:.6}  Rd {:.6}  A {:.6}  Tt {:.6}",
        summary.specular_reflectance,
        summary.diffuse_reflectance,
        summary.absorbed,
        summary.transmittance
    )?;
    writeln!(
        out,
        "    Secondary events: {} this run, {} in total",
        summary.secondary_events_run, summary.secondary_events_total
    )?;
    writeln!(out, "    {}", summary.time_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const PARAMS: &str = r#"
        [[runs]]
        output = "first.mco"
        photons = 200
        label = "first"

        [runs.grid]
        dz = 0.01
        dr = 0.01
        nz = 10
        nr = 10
        na = 5

        [[runs.layers]]
        n = 1.37
        mua = 1.0
        mus = 100.0
        g = 0.9
        thickness = 0.1

        [runs.source]
        type = "raw-origin"

        [[runs]]
        output = "second.mco"
        photons = 100

        [runs.grid]
        dz = 0.01
        dr = 0.01
        nz = 10
        nr = 10
        na = 5

        [[runs.layers]]
        n = 1.0
        mua = 0.0
        mus = 0.0
        g = 0.0
        thickness = 0.1
    "#;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["mcml", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Run(args) => args,
            _ => panic!("expected the run subcommand"),
        }
    }

    fn write_params(dir: &Path) -> PathBuf {
        let path = dir.join("params.toml");
        fs::write(&path, PARAMS).unwrap();
        path
    }

    #[test]
    fn missing_input_is_an_error_when_not_interactive() {
        let err = resolve_input(&run_args(&["--non-interactive"])).unwrap_err();
        assert!(matches!(err, CliError::Argument(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_every_declared_run_and_writes_results() {
        let dir = tempdir().unwrap();
        let input = write_params(dir.path());
        let input = input.to_str().unwrap();

        let args = run_args(&[
            input,
            "--non-interactive",
            "--seed",
            "11",
            "--source",
            "uniform-disk",
            "--radius-um",
            "5",
        ]);
        run(args).await.unwrap();

        for name in ["first.mco", "first-matrix.csv", "second.mco", "second-matrix.csv"] {
            assert!(dir.path().join(name).exists(), "{} was not written", name);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_without_a_source_fails_when_not_interactive() {
        let dir = tempdir().unwrap();
        let input = write_params(dir.path());

        let args = run_args(&[input.to_str().unwrap(), "--non-interactive", "--no-matrix"]);
        let err = run(args).await.unwrap_err();
        assert!(matches!(err, CliError::Engine(_)));
        assert!(dir.path().join("first.mco").exists());
        assert!(!dir.path().join("first-matrix.csv").exists());
        assert!(!dir.path().join("second.mco").exists());
    }

    /// The seed-dependent part of a run summary.
    fn tallies(summary: &RunSummary) -> (u64, u64, f64, f64, f64) {
        (
            summary.photons,
            summary.steps,
            summary.diffuse_reflectance,
            summary.absorbed,
            summary.transmittance,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeat_runs_exactly_n_passes_with_offset_seeds() {
        let dir = tempdir().unwrap();
        let input = write_params(dir.path());
        let input = input.to_str().unwrap();
        let common = [input, "--non-interactive", "--source", "uniform-disk", "--radius-um", "20"];

        let mut repeated_args = common.to_vec();
        repeated_args.extend_from_slice(&["--repeat", "3", "--seed", "5"]);
        let mut out = Vec::new();
        let outcomes = execute(&run_args(&repeated_args), &mut out).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes.iter().map(|o| (o.pass, o.seed)).collect::<Vec<_>>(),
            vec![(1, Some(5)), (2, Some(6)), (3, Some(7))]
        );
        assert!(outcomes.iter().all(|o| o.summaries.len() == 2));

        let transcript = String::from_utf8(out).unwrap();
        assert_eq!(transcript.matches("Pass ").count(), 3);
        assert!(transcript.contains("Pass 3/3"));
        assert!(!transcript.contains("Pass 4/"));

        let mut single_args = common.to_vec();
        single_args.extend_from_slice(&["--seed", "6"]);
        let single = execute(&run_args(&single_args), &mut Vec::new()).unwrap();
        assert_eq!(single.len(), 1);
        let expected: Vec<_> = single[0].summaries.iter().map(tallies).collect();
        let second_pass: Vec<_> = outcomes[1].summaries.iter().map(tallies).collect();
        assert_eq!(second_pass, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_pass_prints_no_pass_header() {
        let dir = tempdir().unwrap();
        let input = write_params(dir.path());

        let args = run_args(&[input.to_str().unwrap(), "--non-interactive", "--source", "raw-origin"]);
        let mut out = Vec::new();
        let outcomes = execute(&args, &mut out).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].seed, None);
        let transcript = String::from_utf8(out).unwrap();
        assert!(!transcript.contains("Pass "));
        assert!(transcript.contains("✓ Run 1 'first'"));
        assert!(transcript.contains("✓ Run 2 'run 2'"));
    }
}
