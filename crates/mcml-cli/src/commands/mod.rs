use crate::error::{CliError, Result};
use mcmlpp::core::io::params::{ParameterFile, ParameterSet};
use std::path::Path;
use tracing::info;

pub mod run;
pub mod validate;

/// Reads and validates a parameter file, attributing failures to its path.
pub(crate) fn load_parameters(path: &Path) -> Result<ParameterSet> {
    info!("Loading parameter file {:?}", path);
    ParameterFile::from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}
