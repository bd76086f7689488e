use crate::core::io::params::{ParameterSet, RunSpec};
use crate::core::models::output::OutputAccumulator;
use crate::core::models::source::SourceSelection;
use crate::core::transport::TransportKernel;
use crate::core::transport::fresnel::specular_reflectance;
use crate::engine::config::SimulationConfig;
use crate::engine::context::SimulationContext;
use crate::engine::error::EngineError;
use crate::engine::lifecycle;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::{self, ResultSink};
use crate::engine::source::{self, PhotonSourceBatch, SourceError};
use crate::engine::timing::Clock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, instrument, warn};

/// Label and photon source chosen for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSetup {
    pub label: String,
    pub selection: SourceSelection,
}

/// Supplies the per-run choices that are not part of the parameter file,
/// or overrides the ones that are.
pub trait RunSetupProvider {
    /// Called once per run, before anything is simulated. `index` is 0-based.
    fn setup(&mut self, index: usize, run: &RunSpec) -> Result<RunSetup, EngineError>;

    /// Called when the photon source of a run cannot be built. Returning a
    /// selection retries with it; `None` fails the run with `error`.
    fn source_failed(
        &mut self,
        _index: usize,
        _run: &RunSpec,
        _error: &SourceError,
    ) -> Option<SourceSelection> {
        None
    }
}

/// Takes label and source straight from the parameter file. Runs without a
/// label are named after their position; runs without a source fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FromParameters;

impl RunSetupProvider for FromParameters {
    fn setup(&mut self, index: usize, run: &RunSpec) -> Result<RunSetup, EngineError> {
        let selection = run.source.clone().ok_or_else(|| EngineError::RunSetup {
            run: index + 1,
            reason: "no photon source is configured".to_string(),
        })?;
        Ok(RunSetup {
            label: default_label(index, run),
            selection,
        })
    }
}

/// The run's own label, or "run N" when it has none.
pub fn default_label(index: usize, run: &RunSpec) -> String {
    run.label
        .clone()
        .unwrap_or_else(|| format!("run {}", index + 1))
}

/// What one finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// 1-based position in the parameter file.
    pub run: usize,
    pub label: String,
    pub source: String,
    pub photons: u64,
    pub steps: u64,
    pub secondary_events_run: u64,
    pub secondary_events_total: u64,
    pub time_label: String,
    pub wall_seconds: f64,
    pub specular_reflectance: f64,
    pub diffuse_reflectance: f64,
    pub absorbed: f64,
    pub transmittance: f64,
}

/// Runs every simulation of `parameters` in order with the system clock.
pub fn run<K, P, S>(
    parameters: &ParameterSet,
    config: &SimulationConfig,
    kernel: &K,
    setup: &mut P,
    sink: &mut S,
    reporter: &ProgressReporter,
) -> Result<Vec<RunSummary>, EngineError>
where
    K: TransportKernel + Sync,
    P: RunSetupProvider + ?Sized,
    S: ResultSink + ?Sized,
{
    let mut context = SimulationContext::with_system_clock(config.counter_policy)?;
    run_with_context(parameters, config, kernel, setup, sink, &mut context, reporter)
}

/// Runs every simulation of `parameters` in order, carrying `context` from
/// run to run. Each run is fully reported before the next one starts.
#[instrument(skip_all, name = "simulation_workflow", fields(runs = parameters.num_runs()))]
pub fn run_with_context<K, P, S, C>(
    parameters: &ParameterSet,
    config: &SimulationConfig,
    kernel: &K,
    setup: &mut P,
    sink: &mut S,
    context: &mut SimulationContext<C>,
    reporter: &ProgressReporter,
) -> Result<Vec<RunSummary>, EngineError>
where
    K: TransportKernel + Sync,
    P: RunSetupProvider + ?Sized,
    S: ResultSink + ?Sized,
    C: Clock,
{
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let num_runs = parameters.num_runs();
    info!(num_runs, "Starting simulation.");

    let mut summaries = Vec::with_capacity(num_runs);
    for (index, run) in parameters.runs.iter().enumerate() {
        let summary = run_one(
            index, num_runs, run, config, kernel, setup, sink, context, &mut rng, reporter,
        )?;
        info!(
            run = summary.run,
            label = %summary.label,
            diffuse_reflectance = summary.diffuse_reflectance,
            absorbed = summary.absorbed,
            transmittance = summary.transmittance,
            "Run complete."
        );
        summaries.push(summary);
    }

    info!(num_runs, "Simulation finished.");
    Ok(summaries)
}

#[allow(clippy::too_many_arguments)]
fn run_one<K, P, S, C>(
    index: usize,
    num_runs: usize,
    run: &RunSpec,
    config: &SimulationConfig,
    kernel: &K,
    setup: &mut P,
    sink: &mut S,
    context: &mut SimulationContext<C>,
    rng: &mut StdRng,
    reporter: &ProgressReporter,
) -> Result<RunSummary, EngineError>
where
    K: TransportKernel + Sync,
    P: RunSetupProvider + ?Sized,
    S: ResultSink + ?Sized,
    C: Clock,
{
    let params = &run.params;
    let RunSetup { label, selection } = setup.setup(index, run)?;
    let (mut batch, selection) = build_source(index, run, selection, setup, rng)?;

    let mut output = OutputAccumulator::new(&params.grid);
    output.rsp = specular_reflectance(&params.layers);

    // The timed window covers photon tracing only, not source preparation.
    context.begin_run(params.num_photons)?;
    reporter.report(Progress::PhaseStart {
        name: format!("Run {}/{}: {}", index + 1, num_runs, label),
    });
    info!(run = index + 1, label = %label, photons = params.num_photons, "Starting run.");

    let stats = lifecycle::run_photons(
        kernel, params, &mut batch, &mut output, context, config, rng, reporter,
    )?;
    let elapsed = report::report_result(sink, params, &mut output, context, &label, config.write_matrix)?;
    reporter.report(Progress::PhaseFinish);

    let scaled = output
        .scaled()
        .ok_or_else(|| EngineError::Internal("result sink did not scale the output".to_string()))?;
    Ok(RunSummary {
        run: index + 1,
        label,
        source: selection.to_string(),
        photons: stats.photons,
        steps: stats.steps,
        secondary_events_run: context.secondary_events_this_run(),
        secondary_events_total: context.counters.secondary_events,
        time_label: elapsed.label,
        wall_seconds: elapsed.wall_seconds,
        specular_reflectance: output.rsp,
        diffuse_reflectance: scaled.diffuse_reflectance,
        absorbed: scaled.absorbed,
        transmittance: scaled.transmittance,
    })
}

/// Builds the photon source, giving the setup provider a chance to replace
/// a selection that fails.
fn build_source<P, R>(
    index: usize,
    run: &RunSpec,
    mut selection: SourceSelection,
    setup: &mut P,
    rng: &mut R,
) -> Result<(PhotonSourceBatch, SourceSelection), EngineError>
where
    P: RunSetupProvider + ?Sized,
    R: Rng + ?Sized,
{
    let params = &run.params;
    loop {
        match source::initialize(&selection, params.num_photons, &params.layers, rng) {
            Ok(batch) => return Ok((batch, selection)),
            Err(error) => {
                warn!(run = index + 1, source = %selection, %error, "Photon source failed.");
                match setup.source_failed(index, run, &error) {
                    Some(replacement) => selection = replacement,
                    None => return Err(error.into()),
                }
            }
        }
    }
}
