use super::context::SimulationContext;
use super::timing::{Clock, ElapsedReport, TimingError};
use crate::core::io::results::{self, ResultFileError, SummaryContext};
use crate::core::models::output::OutputAccumulator;
use crate::core::models::params::InputParameters;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

const TIME_REPORT_MESSAGE: &str = "Simulation time of this run.";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Timing(#[from] TimingError),
    #[error("Failed to write results: {0}")]
    Write(#[from] ResultFileError),
}

/// Destination of finished runs: scales the raw tallies and writes them out.
pub trait ResultSink {
    fn scale(&mut self, params: &InputParameters, output: &mut OutputAccumulator) -> Result<(), ReportError>;

    fn write_matrix(&mut self, params: &InputParameters, output: &OutputAccumulator) -> Result<(), ReportError>;

    fn write_summary(
        &mut self,
        params: &InputParameters,
        output: &OutputAccumulator,
        summary: &SummaryContext,
    ) -> Result<(), ReportError>;
}

/// Writes the summary to the run's output path and the matrix next to it.
#[derive(Debug, Default)]
pub struct FileResultSink {
    written: Vec<PathBuf>,
}

impl FileResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every file written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ResultSink for FileResultSink {
    fn scale(&mut self, params: &InputParameters, output: &mut OutputAccumulator) -> Result<(), ReportError> {
        output.sum_and_scale(params);
        Ok(())
    }

    fn write_matrix(&mut self, params: &InputParameters, output: &OutputAccumulator) -> Result<(), ReportError> {
        let path = params.matrix_path();
        results::write_matrix_to_path(&path, params, output)?;
        self.written.push(path);
        Ok(())
    }

    fn write_summary(
        &mut self,
        params: &InputParameters,
        output: &OutputAccumulator,
        summary: &SummaryContext,
    ) -> Result<(), ReportError> {
        results::write_summary_to_path(&params.output_path, params, output, summary)?;
        self.written.push(params.output_path.clone());
        Ok(())
    }
}

/// Finishes a run: elapsed-time label, scaling, optional matrix, summary.
/// The order is fixed.
#[instrument(skip_all, name = "report_result", fields(label = label))]
pub fn report_result<S, C>(
    sink: &mut S,
    params: &InputParameters,
    output: &mut OutputAccumulator,
    context: &SimulationContext<C>,
    label: &str,
    write_matrix: bool,
) -> Result<ElapsedReport, ReportError>
where
    S: ResultSink + ?Sized,
    C: Clock,
{
    let elapsed = context.timing().report_elapsed(TIME_REPORT_MESSAGE)?;
    info!("{}", elapsed.label);

    sink.scale(params, output)?;
    if write_matrix {
        sink.write_matrix(params, output)?;
    }
    let summary = SummaryContext {
        label,
        time_report: &elapsed.label,
        secondary_events_run: context.secondary_events_this_run(),
        secondary_events_total: context.counters.secondary_events,
    };
    sink.write_summary(params, output, &summary)?;
    Ok(elapsed)
}
