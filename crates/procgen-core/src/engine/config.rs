use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Settings for one run of a generation procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateConfig {
    /// Name of a `CoreData` configuration to start from; empty if `None`.
    pub starting_configuration: Option<String>,
    pub data_prefix: Option<String>,
    pub seed: Option<u64>,
    pub threads: usize,
}

#[derive(Default)]
pub struct GenerateConfigBuilder {
    starting_configuration: Option<String>,
    data_prefix: Option<String>,
    seed: Option<u64>,
    threads: Option<usize>,
}

impl GenerateConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_configuration(mut self, name: impl Into<String>) -> Self {
        self.starting_configuration = Some(name.into());
        self
    }
    pub fn data_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.data_prefix = Some(prefix.into());
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn build(self) -> Result<GenerateConfig, ConfigError> {
        if let Some(prefix) = &self.data_prefix {
            if prefix.is_empty() || prefix.contains("//") {
                return Err(ConfigError::InvalidParameter {
                    name: "data_prefix",
                    reason: "must be non-empty and must not contain '//'".to_string(),
                });
            }
        }
        let threads = self.threads.unwrap_or(1);
        if threads == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "threads",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(GenerateConfig {
            starting_configuration: self.starting_configuration,
            data_prefix: self.data_prefix,
            seed: self.seed,
            threads,
        })
    }
}
