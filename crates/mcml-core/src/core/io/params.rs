use crate::core::models::layer::{LayerProperties, LayerStack};
use crate::core::models::params::{
    DEFAULT_ROULETTE_CHANCE, DEFAULT_WEIGHT_THRESHOLD, GridSpec, InputParameters,
};
use crate::core::models::source::SourceSelection;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Parameter file defines no runs")]
    NoRuns,
    #[error("Invalid parameters in run {run}: {message}")]
    Invalid { run: usize, message: String },
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct FileParameters {
    #[serde(default)]
    runs: Vec<FileRun>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileRun {
    output: PathBuf,
    photons: u64,
    label: Option<String>,
    weight_threshold: Option<f64>,
    roulette_chance: Option<f64>,
    grid: FileGrid,
    ambient: Option<FileAmbient>,
    layers: Vec<FileLayer>,
    source: Option<FileSource>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct FileGrid {
    dz: f64,
    dr: f64,
    nz: usize,
    nr: usize,
    na: usize,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct FileAmbient {
    above: f64,
    below: f64,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileLayer {
    n: f64,
    mua: f64,
    mus: f64,
    g: f64,
    thickness: f64,
    #[serde(default)]
    raman_yield: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", tag = "type")]
enum FileSource {
    #[serde(rename_all = "kebab-case")]
    UniformDisk { radius_um: f64 },
    DeferredGaussian,
    PlanarGaussianFile { path: PathBuf },
    RawOrigin,
    #[serde(rename_all = "kebab-case")]
    FixedLayer {
        path: PathBuf,
        depth: f64,
        direction_cosine: f64,
    },
}

impl FileSource {
    fn resolve(self, base_dir: &Path) -> SourceSelection {
        match self {
            FileSource::UniformDisk { radius_um } => SourceSelection::UniformDisk { radius_um },
            FileSource::DeferredGaussian => SourceSelection::DeferredGaussian,
            FileSource::PlanarGaussianFile { path } => SourceSelection::FileLoadedPlanarGaussian {
                path: base_dir.join(path),
            },
            FileSource::RawOrigin => SourceSelection::RawOrigin,
            FileSource::FixedLayer {
                path,
                depth,
                direction_cosine,
            } => SourceSelection::FixedLayer {
                path: base_dir.join(path),
                depth,
                direction_cosine,
            },
        }
    }
}

/// One run as declared by a parameter file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub params: InputParameters,
    pub label: Option<String>,
    pub source: Option<SourceSelection>,
}

/// All runs of a parameter file, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub runs: Vec<RunSpec>,
}

impl ParameterSet {
    #[inline]
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }
}

/// TOML parameter file reader.
///
/// Relative `output` and coordinate-file paths are resolved against the
/// directory containing the parameter file.
pub struct ParameterFile;

impl ParameterFile {
    pub fn from_path(path: &Path) -> Result<ParameterSet, ParamError> {
        debug!("Loading parameters from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| ParamError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&content, &path.to_string_lossy(), base_dir)
    }

    pub fn parse(content: &str, origin: &str, base_dir: &Path) -> Result<ParameterSet, ParamError> {
        let file: FileParameters = toml::from_str(content).map_err(|e| ParamError::Toml {
            path: origin.to_string(),
            source: e,
        })?;

        if file.runs.is_empty() {
            return Err(ParamError::NoRuns);
        }

        let mut seen_outputs = HashSet::new();
        let mut runs = Vec::with_capacity(file.runs.len());
        for (i, file_run) in file.runs.into_iter().enumerate() {
            let run = i + 1;
            let spec = build_run(file_run, run, base_dir)?;
            if !seen_outputs.insert(spec.params.output_path.clone()) {
                return Err(ParamError::Invalid {
                    run,
                    message: format!(
                        "output file '{}' is already used by an earlier run",
                        spec.params.output_path.display()
                    ),
                });
            }
            runs.push(spec);
        }

        debug!(num_runs = runs.len(), "Parameter file parsed and validated.");
        Ok(ParameterSet { runs })
    }
}

fn build_run(file_run: FileRun, run: usize, base_dir: &Path) -> Result<RunSpec, ParamError> {
    let invalid = |message: String| ParamError::Invalid { run, message };

    if file_run.photons == 0 {
        return Err(invalid("`photons` must be at least 1".to_string()));
    }

    let weight_threshold = file_run
        .weight_threshold
        .unwrap_or(DEFAULT_WEIGHT_THRESHOLD);
    if !(weight_threshold > 0.0 && weight_threshold < 1.0) {
        return Err(invalid(format!(
            "`weight-threshold` must lie in (0, 1), got {}",
            weight_threshold
        )));
    }
    let roulette_chance = file_run.roulette_chance.unwrap_or(DEFAULT_ROULETTE_CHANCE);
    if !(roulette_chance > 0.0 && roulette_chance <= 1.0) {
        return Err(invalid(format!(
            "`roulette-chance` must lie in (0, 1], got {}",
            roulette_chance
        )));
    }

    let g = &file_run.grid;
    if !(g.dz > 0.0 && g.dr > 0.0) {
        return Err(invalid("grid steps `dz` and `dr` must be positive".to_string()));
    }
    if g.nz == 0 || g.nr == 0 || g.na == 0 {
        return Err(invalid(
            "grid bin counts `nz`, `nr` and `na` must be at least 1".to_string(),
        ));
    }
    let grid = GridSpec {
        dz: g.dz,
        dr: g.dr,
        nz: g.nz,
        nr: g.nr,
        na: g.na,
    };

    let (n_above, n_below) = file_run
        .ambient
        .map(|a| (a.above, a.below))
        .unwrap_or((1.0, 1.0));
    if !(n_above > 0.0 && n_below > 0.0) {
        return Err(invalid(
            "ambient refractive indices must be positive".to_string(),
        ));
    }

    if file_run.layers.is_empty() {
        return Err(invalid("at least one layer is required".to_string()));
    }
    let mut properties = Vec::with_capacity(file_run.layers.len());
    for (j, layer) in file_run.layers.iter().enumerate() {
        let layer_no = j + 1;
        if !(layer.n > 0.0) {
            return Err(invalid(format!("layer {}: `n` must be positive", layer_no)));
        }
        if !(layer.mua >= 0.0 && layer.mus >= 0.0) {
            return Err(invalid(format!(
                "layer {}: `mua` and `mus` must be non-negative",
                layer_no
            )));
        }
        if !(-1.0..=1.0).contains(&layer.g) {
            return Err(invalid(format!(
                "layer {}: `g` must lie in [-1, 1], got {}",
                layer_no, layer.g
            )));
        }
        if !(layer.thickness > 0.0) {
            return Err(invalid(format!(
                "layer {}: `thickness` must be positive",
                layer_no
            )));
        }
        if !(0.0..=1.0).contains(&layer.raman_yield) {
            return Err(invalid(format!(
                "layer {}: `raman-yield` must lie in [0, 1], got {}",
                layer_no, layer.raman_yield
            )));
        }
        properties.push(LayerProperties {
            n: layer.n,
            mua: layer.mua,
            mus: layer.mus,
            g: layer.g,
            thickness: layer.thickness,
            raman_yield: layer.raman_yield,
        });
    }

    let params = InputParameters {
        output_path: base_dir.join(&file_run.output),
        num_photons: file_run.photons,
        weight_threshold,
        roulette_chance,
        grid,
        layers: LayerStack::from_properties(n_above, n_below, &properties),
    };

    Ok(RunSpec {
        params,
        label: file_run.label,
        source: file_run.source.map(|s| s.resolve(base_dir)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const TWO_RUNS: &str = r#"
        [[runs]]
        output = "first.mco"
        photons = 1000
        label = "slab"

        [runs.grid]
        dz = 0.01
        dr = 0.02
        nz = 40
        nr = 50
        na = 30

        [runs.ambient]
        above = 1.0
        below = 1.33

        [[runs.layers]]
        n = 1.37
        mua = 1.0
        mus = 100.0
        g = 0.9
        thickness = 0.1
        raman-yield = 0.05

        [[runs.layers]]
        n = 1.4
        mua = 0.5
        mus = 50.0
        g = 0.8
        thickness = 0.4

        [runs.source]
        type = "fixed-layer"
        path = "xy.txt"
        depth = 0.2
        direction-cosine = -1.0

        [[runs]]
        output = "second.mco"
        photons = 10
        weight-threshold = 1e-3

        [runs.grid]
        dz = 0.1
        dr = 0.1
        nz = 1
        nr = 1
        na = 1

        [[runs.layers]]
        n = 1.0
        mua = 0.0
        mus = 0.0
        g = 0.0
        thickness = 1.0
    "#;

    #[test]
    fn parses_runs_in_declaration_order() {
        let set = ParameterFile::parse(TWO_RUNS, "inline", Path::new("/data")).unwrap();
        assert_eq!(set.num_runs(), 2);

        let first = &set.runs[0];
        assert_eq!(first.label.as_deref(), Some("slab"));
        assert_eq!(first.params.num_photons, 1000);
        assert_eq!(first.params.output_path, PathBuf::from("/data/first.mco"));
        assert_eq!(first.params.weight_threshold, DEFAULT_WEIGHT_THRESHOLD);
        assert_eq!(first.params.grid.nr, 50);
        assert_eq!(first.params.layers.len(), 2);
        assert_eq!(first.params.layers.n_below(), 1.33);
        let second_layer = first.params.layers.layer(2).unwrap();
        assert!((second_layer.z0 - 0.1).abs() < 1e-12);
        assert!((second_layer.z1 - 0.5).abs() < 1e-12);
        assert_eq!(first.params.layers.layer(1).unwrap().raman_yield, 0.05);
        assert_eq!(
            first.source,
            Some(SourceSelection::FixedLayer {
                path: PathBuf::from("/data/xy.txt"),
                depth: 0.2,
                direction_cosine: -1.0,
            })
        );

        let second = &set.runs[1];
        assert_eq!(second.label, None);
        assert_eq!(second.source, None);
        assert_eq!(second.params.weight_threshold, 1e-3);
        assert_eq!(second.params.layers.n_above(), 1.0);
        assert_eq!(second.params.layers.layer(1).unwrap().raman_yield, 0.0);
    }

    #[test]
    fn every_source_tag_is_recognized() {
        let cases = [
            ("type = \"uniform-disk\"\nradius-um = 2.0", "uniform-disk"),
            ("type = \"deferred-gaussian\"", "deferred-gaussian"),
            ("type = \"planar-gaussian-file\"\npath = \"a.txt\"", "planar-gaussian-file"),
            ("type = \"raw-origin\"", "raw-origin"),
        ];
        for (source, kind) in cases {
            let content = format!(
                "[[runs]]\noutput = \"o.mco\"\nphotons = 1\n[runs.grid]\ndz = 1.0\ndr = 1.0\nnz = 1\nnr = 1\nna = 1\n[[runs.layers]]\nn = 1.0\nmua = 1.0\nmus = 1.0\ng = 0.0\nthickness = 1.0\n[runs.source]\n{}\n",
                source
            );
            let set = ParameterFile::parse(&content, "inline", Path::new("")).unwrap();
            assert_eq!(set.runs[0].source.as_ref().unwrap().kind(), kind);
        }
    }

    #[test]
    fn empty_file_has_no_runs() {
        let err = ParameterFile::parse("", "inline", Path::new("")).unwrap_err();
        assert!(matches!(err, ParamError::NoRuns));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let content = TWO_RUNS.replace("label = \"slab\"", "lable = \"slab\"");
        let err = ParameterFile::parse(&content, "inline", Path::new("")).unwrap_err();
        assert!(matches!(err, ParamError::Toml { .. }));
    }

    #[test]
    fn invalid_values_name_the_run() {
        let cases = [
            ("photons = 10\n", "photons = 0\n"),
            ("g = 0.0", "g = 1.5"),
            ("thickness = 1.0", "thickness = 0.0"),
            ("weight-threshold = 1e-3", "weight-threshold = 2.0"),
            ("nz = 1", "nz = 0"),
        ];
        for (from, to) in cases {
            let content = TWO_RUNS.replace(from, to);
            let err = ParameterFile::parse(&content, "inline", Path::new("")).unwrap_err();
            assert!(
                matches!(err, ParamError::Invalid { run: 2, .. }),
                "replacing '{}' gave {:?}",
                from,
                err
            );
        }
    }

    #[test]
    fn duplicate_output_paths_are_rejected() {
        let content = TWO_RUNS.replace("second.mco", "first.mco");
        let err = ParameterFile::parse(&content, "inline", Path::new("")).unwrap_err();
        match err {
            ParamError::Invalid { run, message } => {
                assert_eq!(run, 2);
                assert!(message.contains("first.mco"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = ParameterFile::from_path(&dir.path().join("missing.toml")).unwrap_err();
        match err {
            ParamError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn from_path_resolves_relative_paths_against_file_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", TWO_RUNS).unwrap();

        let set = ParameterFile::from_path(&path).unwrap();
        assert_eq!(set.runs[1].params.output_path, dir.path().join("second.mco"));
    }
}
