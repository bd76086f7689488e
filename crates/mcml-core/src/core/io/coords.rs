use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CoordinateError {
    #[error("Coordinate file not found: '{path}'", path = path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error while reading coordinates: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed coordinate line {line}: '{content}' (expected two floating-point fields)")]
    MalformedLine { line: usize, content: String },
    #[error("Coordinate source exhausted: {expected} photons requested but only {found} coordinate pairs available")]
    Exhausted { expected: usize, found: usize },
}

/// Transverse launch offsets read from a plain-text coordinate file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coordinates {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Reader for coordinate source files: one photon per line, two
/// whitespace-separated floats `x y`, no header. Blank lines are ignored.
pub struct CoordinateFile;

impl CoordinateFile {
    /// Reads exactly `expected` coordinate pairs in file order.
    pub fn read_from(reader: &mut impl BufRead, expected: usize) -> Result<Coordinates, CoordinateError> {
        let mut coords = Coordinates {
            x: Vec::with_capacity(expected),
            y: Vec::with_capacity(expected),
        };

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if coords.x.len() == expected {
                debug!(
                    line = line_num,
                    "Coordinate file has more entries than requested photons; ignoring the rest."
                );
                break;
            }

            let (x, y) = parse_pair(trimmed).ok_or_else(|| CoordinateError::MalformedLine {
                line: line_num,
                content: line.clone(),
            })?;
            coords.x.push(x);
            coords.y.push(y);
        }

        if coords.x.len() < expected {
            return Err(CoordinateError::Exhausted {
                expected,
                found: coords.x.len(),
            });
        }
        Ok(coords)
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P, expected: usize) -> Result<Coordinates, CoordinateError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CoordinateError::NotFound {
                path: path.to_path_buf(),
            },
            _ => CoordinateError::Io(e),
        })?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, expected)
    }
}

fn parse_pair(line: &str) -> Option<(f64, f64)> {
    let mut fields = line.split_whitespace();
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() || !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some((x, y))
}
