use crate::cli::{RunArgs, SourceKind};
use crate::error::{CliError, Result};
use mcmlpp::core::models::source::SourceSelection;
use mcmlpp::engine::config::{self as core_config, CounterPolicy};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialCounterPolicy {
    AccumulateAcrossRuns,
    ResetPerRun,
}

impl From<PartialCounterPolicy> for CounterPolicy {
    fn from(p: PartialCounterPolicy) -> Self {
        match p {
            PartialCounterPolicy::AccumulateAcrossRuns => CounterPolicy::AccumulateAcrossRuns,
            PartialCounterPolicy::ResetPerRun => CounterPolicy::ResetPerRun,
        }
    }
}

/// Engine settings as they may appear in a `--config` file. Every field is
/// optional; command-line flags win over the file, the file over defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialSimulationConfig {
    counter_policy: Option<PartialCounterPolicy>,
    seed: Option<u64>,
    write_matrix: Option<bool>,
    eta_checkpoints: Option<bool>,
    chunk_size: Option<u64>,
}

impl PartialSimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading engine configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads the file named by `--config`, or starts empty.
    pub fn load(args: &RunArgs) -> Result<Self> {
        match &args.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Produces the engine configuration for pass `pass` (0-based) of the
    /// `--repeat` loop. A fixed seed is offset by the pass so repeated passes
    /// are independent but reproducible.
    pub fn merge_with_cli(&self, args: &RunArgs, pass: u32) -> Result<core_config::SimulationConfig> {
        let counter_policy = if args.reset_counters {
            CounterPolicy::ResetPerRun
        } else {
            self.counter_policy.map(Into::into).unwrap_or_default()
        };
        let write_matrix = !args.no_matrix && self.write_matrix.unwrap_or(true);
        let seed = args
            .seed
            .or(self.seed)
            .map(|seed| seed.wrapping_add(u64::from(pass)));

        let mut builder = core_config::SimulationConfigBuilder::new()
            .counter_policy(counter_policy)
            .write_matrix(write_matrix)
            .seed(seed)
            .eta_checkpoints(self.eta_checkpoints.unwrap_or(true));
        if let Some(size) = self.chunk_size {
            builder = builder.chunk_size(size);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }
}

/// Turns the `--source` family of flags into a source selection, if one was
/// requested.
pub fn source_override(args: &RunArgs) -> Result<Option<SourceSelection>> {
    let Some(kind) = args.source else {
        if args.radius_um.is_some()
            || args.coords.is_some()
            || args.depth.is_some()
            || args.direction_cosine.is_some()
        {
            return Err(CliError::Argument(
                "source parameters were given without --source".to_string(),
            ));
        }
        return Ok(None);
    };

    let allowed = accepted_flags(kind);
    let given = [
        ("--radius-um", args.radius_um.is_some()),
        ("--coords", args.coords.is_some()),
        ("--depth", args.depth.is_some()),
        ("--direction-cosine", args.direction_cosine.is_some()),
    ];
    let stray: Vec<&str> = given
        .into_iter()
        .filter(|(flag, present)| *present && !allowed.contains(flag))
        .map(|(flag, _)| flag)
        .collect();
    if !stray.is_empty() {
        return Err(CliError::Argument(format!(
            "--source {} does not take {}",
            kind_name(kind),
            stray.join(", ")
        )));
    }

    let require = |value: bool, flag: &str| -> Result<()> {
        if value {
            Ok(())
        } else {
            Err(CliError::Argument(format!(
                "--source {} requires {}",
                kind_name(kind),
                flag
            )))
        }
    };

    let selection = match kind {
        SourceKind::UniformDisk => {
            require(args.radius_um.is_some(), "--radius-um")?;
            SourceSelection::UniformDisk {
                radius_um: args.radius_um.unwrap_or_default(),
            }
        }
        SourceKind::DeferredGaussian => SourceSelection::DeferredGaussian,
        SourceKind::PlanarGaussianFile => {
            let path = args.coords.clone();
            require(path.is_some(), "--coords")?;
            SourceSelection::FileLoadedPlanarGaussian {
                path: path.unwrap_or_default(),
            }
        }
        SourceKind::RawOrigin => SourceSelection::RawOrigin,
        SourceKind::FixedLayer => match (&args.coords, args.depth, args.direction_cosine) {
            (Some(path), Some(depth), Some(direction_cosine)) => SourceSelection::FixedLayer {
                path: path.clone(),
                depth,
                direction_cosine,
            },
            _ => {
                return Err(CliError::Argument(
                    "--source fixed-layer requires --coords, --depth and --direction-cosine"
                        .to_string(),
                ));
            }
        },
    };
    debug!(source = %selection, "Source selected on the command line.");
    Ok(Some(selection))
}

/// The companion flags each source kind reads.
fn accepted_flags(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        SourceKind::UniformDisk => &["--radius-um"],
        SourceKind::PlanarGaussianFile => &["--coords"],
        SourceKind::FixedLayer => &["--coords", "--depth", "--direction-cosine"],
        SourceKind::DeferredGaussian | SourceKind::RawOrigin => &[],
    }
}

fn kind_name(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::UniformDisk => "uniform-disk",
        SourceKind::DeferredGaussian => "deferred-gaussian",
        SourceKind::PlanarGaussianFile => "planar-gaussian-file",
        SourceKind::RawOrigin => "raw-origin",
        SourceKind::FixedLayer => "fixed-layer",
    }
}
