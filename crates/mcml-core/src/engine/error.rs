use thiserror::Error;

use super::config::ConfigError;
use super::report::ReportError;
use super::source::SourceError;
use super::timing::TimingError;
use crate::core::io::params::ParamError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Parameter source error: {source}")]
    Parameters {
        #[from]
        source: ParamError,
    },

    #[error("Photon source error: {source}")]
    Source {
        #[from]
        source: SourceError,
    },

    #[error("Result reporting failed: {source}")]
    Report {
        #[from]
        source: ReportError,
    },

    #[error("Invalid engine configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Timing failure: {source}")]
    Timing {
        #[from]
        source: TimingError,
    },

    #[error("Run setup for run {run} failed: {reason}")]
    RunSetup { run: usize, reason: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
