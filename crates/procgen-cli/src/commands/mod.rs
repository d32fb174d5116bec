pub mod check;
pub mod convert;
pub mod run;

use crate::error::Result;
use procgen::core::data::CoreData;
use std::path::Path;
use tracing::{info, warn};

/// Loads the system file, or an empty registry when none is given.
pub(crate) fn load_core(system: Option<&Path>) -> Result<CoreData> {
    match system {
        Some(path) => {
            info!("Loading system data from {:?}", path);
            let core = CoreData::load(path)?;
            info!(
                species = core.species_iter().count(),
                configurations = core.configurations_iter().count(),
                "System data loaded."
            );
            Ok(core)
        }
        None => {
            warn!("No system file given; procedures may not reference any species.");
            Ok(CoreData::new())
        }
    }
}
