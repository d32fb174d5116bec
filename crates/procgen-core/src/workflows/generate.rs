use crate::core::data::CoreData;
use crate::core::models::configuration::Configuration;
use crate::engine::config::GenerateConfig;
use crate::engine::context::{Engine, ProcedureContext};
use crate::engine::error::EngineError;
use crate::engine::pool::ProcessPool;
use crate::engine::procedure::Procedure;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::store::DataStore;
use std::cell::RefCell;
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub struct GenerationResult {
    pub configuration: Configuration,
    pub store: DataStore,
}

#[instrument(skip_all, name = "generation_workflow")]
pub fn run(
    procedure: &mut Procedure,
    core: CoreData,
    config: &GenerateConfig,
    reporter: &ProgressReporter,
) -> Result<GenerationResult, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    procedure.check()?;
    if let Some(err) = procedure.validate_references().into_iter().next() {
        return Err(err.into());
    }

    let configuration = match &config.starting_configuration {
        Some(name) => {
            let mut start = core.configuration(name).cloned().ok_or_else(|| {
                EngineError::Initialization(format!("unknown starting configuration '{}'", name))
            })?;
            start.set_name(name);
            info!(
                name = %name,
                molecules = start.n_molecules(),
                "Starting from reference configuration."
            );
            start
        }
        None => Configuration::new("Generated"),
    };

    let pool = ProcessPool::new(config.threads)
        .map_err(|e| EngineError::Initialization(e.to_string()))?;
    let engine = Engine::new(core, config.seed);
    let configuration = RefCell::new(configuration);
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Running Procedure",
    });
    info!(
        context = %procedure.context(),
        nodes = procedure.n_nodes(),
        threads = pool.n_threads(),
        "Running procedure."
    );
    {
        let mut ctx = ProcedureContext::new(&configuration, &pool, &engine, reporter);
        if let Some(prefix) = config.data_prefix.as_deref() {
            ctx = ctx.with_prefix(prefix);
        }
        procedure.run(ctx)?;
    }
    reporter.report(Progress::PhaseFinish);

    let configuration = configuration.into_inner();
    let store = engine.into_store();
    if configuration.n_molecules() == 0 && store.is_empty() {
        warn!("Procedure produced no molecules and published no data.");
    }
    info!(
        molecules = configuration.n_molecules(),
        atoms = configuration.n_atoms(),
        volume = configuration.simbox().volume(),
        density = configuration.atomic_density(),
        published = store.len(),
        "Workflow complete."
    );
    Ok(GenerationResult {
        configuration,
        store,
    })
}
