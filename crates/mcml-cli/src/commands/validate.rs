use super::load_parameters;
use crate::cli::ValidateArgs;
use crate::error::Result;
use mcmlpp::core::io::params::{ParameterSet, RunSpec};
use mcmlpp::workflows::simulate::default_label;
use tracing::info;

pub async fn run(args: ValidateArgs) -> Result<()> {
    let parameters = load_parameters(&args.input)?;
    info!(runs = parameters.num_runs(), "Parameter file is valid.");

    println!(
        "{} declares {} run(s):",
        args.input.display(),
        parameters.num_runs()
    );
    for line in describe_runs(&parameters) {
        println!("{}", line);
    }
    Ok(())
}

fn describe_runs(parameters: &ParameterSet) -> Vec<String> {
    parameters
        .runs
        .iter()
        .enumerate()
        .map(|(index, run)| describe_run(index, run))
        .collect()
}

fn describe_run(index: usize, run: &RunSpec) -> String {
    let params = &run.params;
    let source = run
        .source
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "prompted".to_string());
    format!(
        "  {:>3}. {:<16} {:>10} photons, {} layer(s) over {:.4} cm, source: {}, output: {}",
        index + 1,
        default_label(index, run),
        params.num_photons,
        params.layers.len(),
        params.layers.depth(),
        source,
        params.output_path.display()
    )
}
