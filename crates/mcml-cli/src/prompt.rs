use crate::error::{CliError, Result};
use mcmlpp::core::io::params::RunSpec;
use mcmlpp::core::models::source::SourceSelection;
use mcmlpp::engine::error::EngineError;
use mcmlpp::engine::source::SourceError;
use mcmlpp::workflows::simulate::{RunSetup, RunSetupProvider, default_label};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

const SOURCE_MENU: &str = "\
  1) uniform disk
  2) deferred gaussian (all photons at the origin)
  3) planar gaussian from a coordinate file
  4) raw origin
  5) fixed layer from a coordinate file
";

/// Resolves the label and photon source of each run from, in order, the
/// command line, the parameter file and finally the terminal.
pub struct InteractiveSetup<R, W> {
    input: R,
    output: W,
    label: Option<String>,
    source: Option<SourceSelection>,
    interactive: bool,
}

impl<R: BufRead, W: Write> InteractiveSetup<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        Self {
            input,
            output,
            label: None,
            source: None,
            interactive,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn with_source(mut self, source: Option<SourceSelection>) -> Self {
        self.source = source;
        self
    }

    /// Writes `prompt` and reads one trimmed line. `None` means end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks until the answer parses as `T`.
    fn ask_parsed<T: FromStr>(&mut self, prompt: &str) -> io::Result<Option<T>> {
        loop {
            let Some(answer) = self.ask(prompt)? else {
                return Ok(None);
            };
            match answer.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => writeln!(self.output, "'{}' is not a valid number.", answer)?,
            }
        }
    }

    fn ask_path(&mut self, prompt: &str) -> io::Result<Option<PathBuf>> {
        loop {
            let Some(answer) = self.ask(prompt)? else {
                return Ok(None);
            };
            if !answer.is_empty() {
                return Ok(Some(PathBuf::from(answer)));
            }
        }
    }

    fn prompt_label(&mut self, index: usize, run: &RunSpec) -> io::Result<String> {
        let fallback = default_label(index, run);
        let answer = self.ask(&format!("Label for run {} [{}]: ", index + 1, fallback))?;
        Ok(match answer {
            Some(label) if !label.is_empty() => label,
            _ => fallback,
        })
    }

    /// Shows the source menu and collects the parameters of the chosen
    /// source. `None` means the input ended before a choice was complete.
    fn prompt_source(&mut self, index: usize) -> io::Result<Option<SourceSelection>> {
        writeln!(self.output, "Photon source for run {}:", index + 1)?;
        write!(self.output, "{}", SOURCE_MENU)?;
        loop {
            let Some(choice) = self.ask("Choice [1-5]: ")? else {
                return Ok(None);
            };
            let selection = match choice.as_str() {
                "1" => self
                    .ask_parsed("Disk radius (um): ")?
                    .map(|radius_um| SourceSelection::UniformDisk { radius_um }),
                "2" => Some(SourceSelection::DeferredGaussian),
                "3" => self
                    .ask_path("Coordinate file: ")?
                    .map(|path| SourceSelection::FileLoadedPlanarGaussian { path }),
                "4" => Some(SourceSelection::RawOrigin),
                "5" => {
                    let Some(path) = self.ask_path("Coordinate file: ")? else {
                        return Ok(None);
                    };
                    let Some(depth) = self.ask_parsed("Launch depth (cm): ")? else {
                        return Ok(None);
                    };
                    self.ask_parsed("Direction cosine: ")?
                        .map(|direction_cosine| SourceSelection::FixedLayer {
                            path,
                            depth,
                            direction_cosine,
                        })
                }
                other => {
                    writeln!(self.output, "'{}' is not one of the listed sources.", other)?;
                    continue;
                }
            };
            return Ok(selection);
        }
    }
}

impl<R: BufRead, W: Write> RunSetupProvider for InteractiveSetup<R, W> {
    fn setup(&mut self, index: usize, run: &RunSpec) -> std::result::Result<RunSetup, EngineError> {
        let prompt_error = |e: io::Error| EngineError::RunSetup {
            run: index + 1,
            reason: format!("could not read from the terminal: {}", e),
        };

        let label = match self.label.clone().or_else(|| run.label.clone()) {
            Some(label) => label,
            None if self.interactive => self.prompt_label(index, run).map_err(prompt_error)?,
            None => default_label(index, run),
        };

        let selection = match self.source.clone().or_else(|| run.source.clone()) {
            Some(selection) => selection,
            None if self.interactive => self
                .prompt_source(index)
                .map_err(prompt_error)?
                .ok_or_else(|| EngineError::RunSetup {
                    run: index + 1,
                    reason: "input ended before a photon source was chosen".to_string(),
                })?,
            None => {
                return Err(EngineError::RunSetup {
                    run: index + 1,
                    reason: "no photon source is configured and prompting is disabled"
                        .to_string(),
                });
            }
        };

        debug!(run = index + 1, label = %label, source = %selection, "Run setup resolved.");
        Ok(RunSetup { label, selection })
    }

    fn source_failed(
        &mut self,
        index: usize,
        _run: &RunSpec,
        error: &SourceError,
    ) -> Option<SourceSelection> {
        if !self.interactive {
            return None;
        }
        let retry = writeln!(self.output, "The photon source could not be prepared: {}", error)
            .and_then(|_| self.prompt_source(index));
        match retry {
            Ok(selection) => selection,
            Err(e) => {
                warn!("Could not prompt for a replacement source: {}", e);
                None
            }
        }
    }
}

/// Asks for the parameter file when none was given on the command line.
pub fn prompt_input_path<R: BufRead, W: Write>(input: R, output: W) -> Result<PathBuf> {
    let mut setup = InteractiveSetup::new(input, output, true);
    setup
        .ask_path("Parameter file: ")
        .map_err(|e| CliError::Prompt(e.to_string()))?
        .ok_or_else(|| CliError::Prompt("no parameter file was given".to_string()))
}
