use crate::core::models::output::{OutputAccumulator, ScaledResults};
use crate::core::models::params::InputParameters;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultFileError {
    #[error("I/O error for '{path}': {source}")]
    Io { path: String, source: io::Error },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Results must be scaled before they are written")]
    NotScaled,
}

/// Extra facts about a run that end up in the summary file.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryContext<'a> {
    pub label: &'a str,
    pub time_report: &'a str,
    pub secondary_events_run: u64,
    pub secondary_events_total: u64,
}

/// Writes the human-readable summary of one scaled run.
pub fn write_summary(
    writer: &mut impl Write,
    params: &InputParameters,
    output: &OutputAccumulator,
    context: &SummaryContext,
) -> Result<(), io::Error> {
    let scaled = output
        .scaled()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "results are not scaled"))?;

    writeln!(writer, "A1 \t# MCML++ summary, format version 1.")?;
    writeln!(writer, "# Run: {}", context.label)?;
    writeln!(writer, "# {}", context.time_report.trim_end())?;
    writeln!(writer)?;

    write_input_section(writer, params)?;
    write_rat_section(writer, output.rsp, scaled)?;

    writeln!(writer, "Secondary events # Raman-tagged scattering events.")?;
    writeln!(writer, "{:<12}\t# This run", context.secondary_events_run)?;
    writeln!(writer, "{:<12}\t# Cumulative", context.secondary_events_total)?;
    writeln!(writer)?;

    writeln!(writer, "A_l #Absorption as a function of layer. [-]")?;
    for value in scaled.a_l.iter().skip(1).take(params.layers.len()) {
        writeln!(writer, "{:12.4E}", value)?;
    }
    writeln!(writer)?;

    write_profile(writer, "A_z #A[0], [1],..A[nz-1]. [1/cm]", &scaled.a_z)?;
    write_profile(writer, "Rd_r #Rd[0], [1],..Rd[nr-1]. [1/cm2]", &scaled.rd_r)?;
    write_profile(writer, "Rd_a #Rd[0], [1],..Rd[na-1]. [sr-1]", &scaled.rd_a)?;
    write_profile(writer, "Tt_r #Tt[0], [1],..Tt[nr-1]. [1/cm2]", &scaled.tt_r)?;
    write_profile(writer, "Tt_a #Tt[0], [1],..Tt[na-1]. [sr-1]", &scaled.tt_a)?;
    writer.flush()
}

fn write_input_section(writer: &mut impl Write, params: &InputParameters) -> io::Result<()> {
    let grid = &params.grid;
    writeln!(writer, "InParm \t\t\t# Input parameters. cm is used.")?;
    writeln!(writer, "{} \tA\t\t# output file name, ASCII.", params.output_path.display())?;
    writeln!(writer, "{} \t\t\t# No. of photons", params.num_photons)?;
    writeln!(writer, "{}\t{}\t\t# dz, dr [cm]", grid.dz, grid.dr)?;
    writeln!(writer, "{}\t{}\t{}\t# No. of dz, dr, da.", grid.nz, grid.nr, grid.na)?;
    writeln!(writer)?;
    writeln!(writer, "{}\t\t\t\t\t# Number of layers", params.layers.len())?;
    writeln!(writer, "#n\tmua\tmus\tg\td\t# One line for each layer")?;
    writeln!(writer, "{}\t\t\t\t\t# n for medium above", params.layers.n_above())?;
    for (i, layer) in params.layers.iter().enumerate() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t# layer {}",
            layer.n,
            layer.mua,
            layer.mus,
            layer.g,
            layer.z1 - layer.z0,
            i + 1
        )?;
    }
    writeln!(writer, "{}\t\t\t\t\t# n for medium below", params.layers.n_below())?;
    writeln!(writer)
}

fn write_rat_section(writer: &mut impl Write, rsp: f64, scaled: &ScaledResults) -> io::Result<()> {
    writeln!(writer, "RAT #Reflectance, absorption, transmission.")?;
    writeln!(writer, "{:<14.6}\t#Specular reflectance [-]", rsp)?;
    writeln!(writer, "{:<14.6}\t#Diffuse reflectance [-]", scaled.diffuse_reflectance)?;
    writeln!(writer, "{:<14.6}\t#Absorbed fraction [-]", scaled.absorbed)?;
    writeln!(writer, "{:<14.6}\t#Transmittance [-]", scaled.transmittance)?;
    writeln!(writer)
}

fn write_profile(writer: &mut impl Write, heading: &str, values: &[f64]) -> io::Result<()> {
    writeln!(writer, "{}", heading)?;
    for value in values {
        writeln!(writer, "{:12.4E}", value)?;
    }
    writeln!(writer)
}

/// Writes the scaled absorption grid as CSV: one row per radial bin, the bin
/// centre radius first, then one column per depth bin.
pub fn write_matrix(
    writer: impl Write,
    params: &InputParameters,
    output: &OutputAccumulator,
) -> Result<(), csv::Error> {
    let grid = &params.grid;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(grid.nz + 1);
    header.push("r_cm".to_string());
    header.extend((0..grid.nz).map(|iz| format!("z_{:.6}", (iz as f64 + 0.5) * grid.dz)));
    csv_writer.write_record(&header)?;

    for ir in 0..grid.nr {
        let mut record = Vec::with_capacity(grid.nz + 1);
        record.push(format!("{:.6}", (ir as f64 + 0.5) * grid.dr));
        record.extend(output.a_rz.row(ir).iter().map(|v| format!("{:.6E}", v)));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_summary_to_path(
    path: &Path,
    params: &InputParameters,
    output: &OutputAccumulator,
    context: &SummaryContext,
) -> Result<(), ResultFileError> {
    if !output.is_scaled() {
        return Err(ResultFileError::NotScaled);
    }
    let io_err = |source| ResultFileError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    write_summary(&mut writer, params, output, context).map_err(io_err)
}

pub fn write_matrix_to_path(
    path: &Path,
    params: &InputParameters,
    output: &OutputAccumulator,
) -> Result<(), ResultFileError> {
    if !output.is_scaled() {
        return Err(ResultFileError::NotScaled);
    }
    let file = File::create(path).map_err(|source| ResultFileError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    write_matrix(BufWriter::new(file), params, output).map_err(|source| ResultFileError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    })
}
