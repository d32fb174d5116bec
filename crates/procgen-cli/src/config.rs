use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use procgen::engine::config::{GenerateConfig, GenerateConfigBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRunSection {
    procedure: Option<PathBuf>,
    system: Option<PathBuf>,
    output: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    data_prefix: Option<String>,
    starting_configuration: Option<String>,
    seed: Option<u64>,
    threads: Option<usize>,
}

/// The contents of a run-configuration file. Every field may be overridden on the
/// command line.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    #[serde(default)]
    run: PartialRunSection,
}

/// A fully resolved `run` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub procedure_path: PathBuf,
    pub system_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub core_config: GenerateConfig,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.resolve_relative_to(path.parent().unwrap_or(Path::new(".")));
        Ok(config)
    }

    /// Makes file paths in the configuration relative to the file's own directory.
    fn resolve_relative_to(&mut self, base: &Path) {
        let run = &mut self.run;
        for path in [
            &mut run.procedure,
            &mut run.system,
            &mut run.output,
            &mut run.data_dir,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Merges command-line arguments over the file values and validates the result.
    pub fn merge_with_cli(self, args: &RunArgs, threads: Option<usize>) -> Result<AppConfig> {
        let run = self.run;
        let procedure_path = args
            .procedure
            .clone()
            .or(run.procedure)
            .ok_or_else(|| CliError::Argument("no procedure file given".to_string()))?;

        let mut builder = GenerateConfigBuilder::new();
        if let Some(name) = args.starting_configuration.clone().or(run.starting_configuration) {
            builder = builder.starting_configuration(name);
        }
        if let Some(prefix) = args.data_prefix.clone().or(run.data_prefix) {
            builder = builder.data_prefix(prefix);
        }
        if let Some(seed) = args.seed.or(run.seed) {
            builder = builder.seed(seed);
        }
        if let Some(threads) = threads.or(run.threads) {
            builder = builder.threads(threads);
        }
        let core_config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(AppConfig {
            procedure_path,
            system_path: args.system.clone().or(run.system),
            output_path: args.output.clone().or(run.output),
            data_dir: args.data_dir.clone().or(run.data_dir),
            core_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn cli_values_override_file_values() {
        let file = write_config(
            "[run]\nprocedure = 'gen.txt'\nsystem = '/data/system.toml'\nseed = 1\nthreads = 2\n",
        );
        let partial = PartialRunConfig::from_file(file.path()).unwrap();
        let args = RunArgs {
            seed: Some(42),
            ..Default::default()
        };
        let config = partial.merge_with_cli(&args, Some(8)).unwrap();

        assert_eq!(config.core_config.seed, Some(42));
        assert_eq!(config.core_config.threads, 8);
        assert_eq!(config.system_path, Some(PathBuf::from("/data/system.toml")));
        assert_eq!(
            config.procedure_path,
            file.path().parent().unwrap().join("gen.txt")
        );
    }

    #[test]
    fn missing_procedure_is_an_argument_error() {
        let result = PartialRunConfig::default().merge_with_cli(&RunArgs::default(), None);
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let args = RunArgs {
            procedure: Some(PathBuf::from("gen.txt")),
            data_prefix: Some("a//b".to_string()),
            ..Default::default()
        };
        let result = PartialRunConfig::default().merge_with_cli(&args, None);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[run]\nprocedures = 'x'\n");
        assert!(matches!(
            PartialRunConfig::from_file(file.path()),
            Err(CliError::FileParsing { .. })
        ));
    }
}
