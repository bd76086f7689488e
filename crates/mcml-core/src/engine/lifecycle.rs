use super::config::SimulationConfig;
use super::context::SimulationContext;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::source::PhotonSourceBatch;
use super::timing::Clock;
use crate::core::models::output::OutputAccumulator;
use crate::core::models::params::InputParameters;
use crate::core::transport::TransportKernel;
use rand::Rng;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use crate::core::transport::EventCounters;
#[cfg(feature = "parallel")]
use super::source::SourceError;
#[cfg(feature = "parallel")]
use rand::SeedableRng;
#[cfg(feature = "parallel")]
use rand::rngs::StdRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Photons finished between two progress increments in sequential mode.
#[cfg(not(feature = "parallel"))]
const PROGRESS_STRIDE: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifecycleStats {
    pub photons: u64,
    pub steps: u64,
}

/// Tracks the 10, 100, 1000, ... completed-photon marks at which a
/// completion-time projection is published.
#[derive(Debug, Clone, Copy)]
struct EtaSchedule {
    next: u64,
    enabled: bool,
}

impl EtaSchedule {
    fn new(enabled: bool) -> Self {
        Self { next: 10, enabled }
    }

    /// Returns true when `completed` has reached the next mark, advancing the
    /// mark past it.
    fn due(&mut self, completed: u64) -> bool {
        if !self.enabled || completed < self.next {
            return false;
        }
        while self.next <= completed {
            self.next = self.next.saturating_mul(10);
        }
        true
    }
}

fn publish_eta<C: Clock>(
    context: &SimulationContext<C>,
    completed: u64,
    total: u64,
    reporter: &ProgressReporter,
) {
    if let Some(eta) = context.timing().predict_done_time(completed, total) {
        info!(completed, total, %eta, "Completion projection.");
        reporter.report(Progress::Message(format!(
            "{} of {} photons done. {}",
            completed, total, eta
        )));
    }
}

/// Launches every photon of the run and steps it until the kernel kills it.
///
/// Without the `parallel` feature photons are processed strictly one after
/// another. With it, the batch is split into chunks that run on the rayon
/// pool, each with its own seeded random stream, accumulator and counters;
/// chunk results are summed in chunk order.
#[instrument(skip_all, name = "photon_lifecycle", fields(photons = params.num_photons))]
#[allow(clippy::too_many_arguments)]
pub fn run_photons<K, R, C>(
    kernel: &K,
    params: &InputParameters,
    batch: &mut PhotonSourceBatch,
    output: &mut OutputAccumulator,
    context: &mut SimulationContext<C>,
    config: &SimulationConfig,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> Result<LifecycleStats, EngineError>
where
    K: TransportKernel + Sync,
    R: Rng + ?Sized,
    C: Clock,
{
    let total = params.num_photons;
    if batch.len() as u64 != total || batch.given() != 0 {
        return Err(EngineError::Internal(format!(
            "source batch holds {} unused entries but the run requests {} photons",
            batch.len() - batch.given(),
            total
        )));
    }

    reporter.report(Progress::TaskStart { total_steps: total });

    #[cfg(not(feature = "parallel"))]
    let stats = drive_sequential(kernel, params, batch, output, context, config, rng, reporter)?;

    #[cfg(feature = "parallel")]
    let stats = drive_parallel(kernel, params, batch, output, context, config, rng, reporter)?;

    reporter.report(Progress::TaskFinish);
    debug!(photons = stats.photons, steps = stats.steps, "Photon loop finished.");
    Ok(stats)
}

#[cfg(not(feature = "parallel"))]
#[allow(clippy::too_many_arguments)]
fn drive_sequential<K, R, C>(
    kernel: &K,
    params: &InputParameters,
    batch: &mut PhotonSourceBatch,
    output: &mut OutputAccumulator,
    context: &mut SimulationContext<C>,
    config: &SimulationConfig,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> Result<LifecycleStats, EngineError>
where
    K: TransportKernel,
    R: Rng + ?Sized,
    C: Clock,
{
    let total = params.num_photons;
    let mut stats = LifecycleStats::default();
    let mut schedule = EtaSchedule::new(config.eta_checkpoints);
    let mut unreported = 0;

    for _ in 0..total {
        let launch = batch.next_launch()?;
        let mut photon = kernel.launch(params, output.rsp, &launch);
        while !photon.is_dead() {
            kernel.step(params, &mut photon, output, &mut context.counters, rng);
            stats.steps += 1;
        }
        stats.photons += 1;

        unreported += 1;
        if unreported == PROGRESS_STRIDE {
            reporter.report(Progress::TaskIncrement {
                amount: unreported,
            });
            unreported = 0;
        }
        if schedule.due(stats.photons) {
            publish_eta(context, stats.photons, total, reporter);
        }
    }
    if unreported > 0 {
        reporter.report(Progress::TaskIncrement {
            amount: unreported,
        });
    }
    Ok(stats)
}

#[cfg(feature = "parallel")]
struct ChunkResult {
    output: OutputAccumulator,
    counters: EventCounters,
    stats: LifecycleStats,
}

#[cfg(feature = "parallel")]
#[allow(clippy::too_many_arguments)]
fn drive_parallel<K, R, C>(
    kernel: &K,
    params: &InputParameters,
    batch: &mut PhotonSourceBatch,
    output: &mut OutputAccumulator,
    context: &mut SimulationContext<C>,
    config: &SimulationConfig,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> Result<LifecycleStats, EngineError>
where
    K: TransportKernel + Sync,
    R: Rng + ?Sized,
    C: Clock,
{
    let total = params.num_photons;
    let indices = batch.claim_remaining();
    let base_seed: u64 = rng.r#gen();
    let chunk_size = usize::try_from(config.chunk_size)
        .map_err(|_| EngineError::Internal("chunk size exceeds the address space".to_string()))?;

    let chunks: Vec<(u64, usize, usize)> = indices
        .clone()
        .step_by(chunk_size)
        .enumerate()
        .map(|(k, start)| (k as u64, start, (start + chunk_size).min(indices.end)))
        .collect();
    let wave = rayon::current_num_threads().max(1);
    debug!(
        chunks = chunks.len(),
        chunk_size,
        threads = wave,
        base_seed,
        "Dispatching photon chunks."
    );

    let rsp = output.rsp;
    let shared_batch: &PhotonSourceBatch = batch;
    let mut stats = LifecycleStats::default();
    let mut schedule = EtaSchedule::new(config.eta_checkpoints);

    for round in chunks.chunks(wave) {
        let results = round
            .par_iter()
            .map(|&(k, start, end)| -> Result<ChunkResult, SourceError> {
                let mut chunk_rng = StdRng::seed_from_u64(base_seed.wrapping_add(k));
                let mut result = ChunkResult {
                    output: OutputAccumulator::new(&params.grid),
                    counters: EventCounters::default(),
                    stats: LifecycleStats::default(),
                };
                for index in start..end {
                    let launch = shared_batch
                        .launch_at(index)
                        .ok_or(SourceError::BatchExhausted {
                            len: shared_batch.len(),
                        })?;
                    let mut photon = kernel.launch(params, rsp, &launch);
                    while !photon.is_dead() {
                        kernel.step(
                            params,
                            &mut photon,
                            &mut result.output,
                            &mut result.counters,
                            &mut chunk_rng,
                        );
                        result.stats.steps += 1;
                    }
                    result.stats.photons += 1;
                }
                reporter.report(Progress::TaskIncrement {
                    amount: result.stats.photons,
                });
                Ok(result)
            })
            .collect::<Result<Vec<ChunkResult>, SourceError>>()?;

        for result in results {
            *output += &result.output;
            context.counters += result.counters;
            stats.photons += result.stats.photons;
            stats.steps += result.stats.steps;
        }
        if schedule.due(stats.photons) {
            publish_eta(context, stats.photons, total, reporter);
        }
    }
    Ok(stats)
}
