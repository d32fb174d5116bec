use crate::cli::RunArgs;
use crate::commands::load_core;
use crate::config::{AppConfig, PartialRunConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use procgen::core::io::histogram::{write_data1d_csv_path, write_histogram_csv_path};
use procgen::core::io::traits::CoordinateFile;
use procgen::core::io::xyz::XyzFile;
use procgen::engine::error::EngineError;
use procgen::engine::progress::ProgressReporter;
use procgen::engine::serialise;
use procgen::engine::store::{DataStore, StoredData};
use procgen::workflows;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn run(args: RunArgs, threads: Option<usize>) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial.merge_with_cli(&args, threads)?;
    execute(&config)
}

fn execute(config: &AppConfig) -> Result<()> {
    let core = load_core(config.system_path.as_deref())?;
    info!("Reading procedure from {:?}", &config.procedure_path);
    let mut procedure = serialise::load_procedure(&config.procedure_path, &core)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Running {} procedure...", procedure.context());
    let result = workflows::generate::run(&mut procedure, core, &config.core_config, &reporter)?;

    let configuration = &result.configuration;
    println!(
        "Workflow complete: {} molecule(s), {} atom(s), box volume {:.3} Å³.",
        configuration.n_molecules(),
        configuration.n_atoms(),
        configuration.simbox().volume()
    );

    if let Some(path) = &config.output_path {
        info!("Writing final configuration to {:?}", path);
        XyzFile::write_to_path(configuration, path).map_err(|e| CliError::FileParsing {
            path: path.clone(),
            source: e.into(),
        })?;
        println!("✓ Configuration written to: {}", path.display());
    } else if configuration.n_molecules() > 0 {
        warn!("No output file given; the generated configuration is discarded.");
    }

    if !result.store.is_empty() {
        let dir = config.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        for path in write_store(&result.store, &dir)? {
            println!("✓ Data written to: {}", path.display());
        }
    }
    Ok(())
}

/// File name for a data-store key: prefix separators become underscores.
fn file_name_for(key: &str) -> String {
    let stem: String = key
        .replace("//", "_")
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!("{}.csv", stem)
}

fn write_store(store: &DataStore, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(store.len());
    for (key, data) in store.iter() {
        let path = dir.join(file_name_for(key));
        match data {
            StoredData::Histogram(histogram) => {
                info!(key, path = ?path, "Writing histogram");
                write_histogram_csv_path(histogram, &path).map_err(EngineError::from)?;
            }
            StoredData::Data1D(data) => {
                info!(key, path = ?path, "Writing processed data");
                write_data1d_csv_path(data, &path).map_err(EngineError::from)?;
            }
        }
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SYSTEM: &str = r#"
[[species]]
name = "Argon"
atoms = [{ element = "Ar", position = [0.0, 0.0, 0.0] }]
sites = [{ name = "Ar", atoms = [0] }]
"#;

    const GENERATOR: &str = "\
Generator
  Add
    Species Argon
    Population 20
    Density 0.02 atoms/A3
  EndAdd
  Select 'A'
    Site Argon Ar
    ForEach
      Select 'B'
        Site Argon Ar
        ExcludeSameMolecule A
      EndSelect
    EndForEach
  EndSelect
EndGenerator
";

    #[test]
    fn key_separators_become_safe_file_names() {
        assert_eq!(file_name_for("Analysis//RDF"), "Analysis_RDF.csv");
        assert_eq!(file_name_for("a b/c"), "a_b_c.csv");
    }

    #[test]
    fn run_writes_xyz_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), SYSTEM).unwrap();
        fs::write(dir.path().join("gen.txt"), GENERATOR).unwrap();
        let output = dir.path().join("out.xyz");

        let args = RunArgs {
            procedure: Some(dir.path().join("gen.txt")),
            system: Some(dir.path().join("system.toml")),
            output: Some(output.clone()),
            seed: Some(3),
            ..Default::default()
        };
        run(args, None).unwrap();

        let frame = XyzFile::read_from_path(&output).unwrap();
        assert_eq!(frame.n_atoms(), 20);
        assert!(frame.elements.iter().all(|e| e == "Ar"));
    }

    #[test]
    fn config_file_supplies_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), SYSTEM).unwrap();
        fs::write(dir.path().join("gen.txt"), GENERATOR).unwrap();
        fs::write(
            dir.path().join("run.toml"),
            "[run]\nprocedure = 'gen.txt'\nsystem = 'system.toml'\noutput = 'final.xyz'\nseed = 1\n",
        )
        .unwrap();

        let args = RunArgs {
            config: Some(dir.path().join("run.toml")),
            ..Default::default()
        };
        run(args, Some(2)).unwrap();
        assert!(dir.path().join("final.xyz").exists());
    }
}
