use crate::cli::CheckArgs;
use crate::commands::load_core;
use crate::error::Result;
use procgen::engine::serialise;
use tracing::{info, warn};

pub fn run(args: CheckArgs) -> Result<()> {
    let core = load_core(args.system.as_deref())?;
    let procedure = serialise::load_procedure(&args.procedure, &core)?;
    procedure.check()?;

    let problems = procedure.validate_references();
    for problem in &problems {
        warn!("{}", problem);
    }
    if let Some(first) = problems.into_iter().next() {
        return Err(first.into());
    }

    info!(
        context = %procedure.context(),
        nodes = procedure.n_nodes(),
        "Procedure is valid."
    );
    println!(
        "{}: {} procedure with {} node(s) is valid.",
        args.procedure.display(),
        procedure.context(),
        procedure.n_nodes()
    );
    Ok(())
}
