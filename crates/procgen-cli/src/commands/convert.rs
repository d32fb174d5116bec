use crate::cli::ConvertArgs;
use crate::commands::load_core;
use crate::error::{CliError, Result};
use procgen::engine::serialise::{self, ProcedureFormat};
use tracing::info;

pub fn run(args: ConvertArgs) -> Result<()> {
    let from = ProcedureFormat::from_path(&args.input);
    let to = ProcedureFormat::from_path(&args.output);
    if from == to {
        return Err(CliError::Argument(format!(
            "'{}' and '{}' use the same format; give one '.toml' file",
            args.input.display(),
            args.output.display()
        )));
    }

    let core = load_core(args.system.as_deref())?;
    let procedure = serialise::load_procedure(&args.input, &core)?;
    serialise::save_procedure(&procedure, &args.output)?;

    info!(
        input = ?args.input,
        output = ?args.output,
        nodes = procedure.n_nodes(),
        "Converted procedure."
    );
    println!("✓ Procedure written to: {}", args.output.display());
    Ok(())
}
