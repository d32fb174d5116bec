use crate::core::models::configuration::{Configuration, Molecule};
use crate::core::models::simbox::SimBox;
use crate::core::models::species::Species;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMolecule {
    species: String,
    #[serde(default)]
    centre: Option<[f64; 3]>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfiguration {
    name: String,
    #[serde(rename = "box")]
    lengths: [f64; 3],
    #[serde(default)]
    angles: Option<[f64; 3]>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    molecules: Vec<RawMolecule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCoreData {
    #[serde(default)]
    species: Vec<Species>,
    #[serde(default)]
    configurations: Vec<RawConfiguration>,
}

/// Species and reference configurations available to a procedure.
///
/// Deserialisers resolve species and configuration names against this registry;
/// it is passed explicitly wherever names must be checked.
#[derive(Debug, Clone, Default)]
pub struct CoreData {
    species: Vec<Species>,
    configurations: Vec<Configuration>,
}

impl CoreData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, DataLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| DataLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let raw: RawCoreData = toml::from_str(&content).map_err(|e| DataLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DataLoadError> {
        let raw: RawCoreData = toml::from_str(content).map_err(|e| DataLoadError::Toml {
            path: "<string>".to_string(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCoreData) -> Result<Self, DataLoadError> {
        let mut data = Self::new();
        for species in raw.species {
            data.add_species(species)?;
        }
        for raw_cfg in raw.configurations {
            let cfg = data.build_configuration(raw_cfg)?;
            data.add_configuration(cfg)?;
        }
        Ok(data)
    }

    fn build_configuration(&self, raw: RawConfiguration) -> Result<Configuration, DataLoadError> {
        let mut cfg = Configuration::new(&raw.name);
        let mut simbox = SimBox::new(Vector3::from(raw.lengths));
        if let Some(angles) = raw.angles {
            simbox = simbox.with_angles(Vector3::from(angles));
        }
        cfg.set_simbox(simbox);
        if let Some(t) = raw.temperature {
            cfg.set_temperature(t);
        }

        for molecule in raw.molecules {
            let species = self.species(&molecule.species).ok_or_else(|| {
                DataLoadError::Invalid(format!(
                    "Configuration '{}' references unknown species '{}'",
                    raw.name, molecule.species
                ))
            })?;
            let mut m = Molecule::from_species(species, species.positions());
            if let Some(c) = molecule.centre {
                m.set_centre(&Point3::new(c[0], c[1], c[2]));
            }
            cfg.add_molecule(m);
        }
        Ok(cfg)
    }

    pub fn add_species(&mut self, species: Species) -> Result<(), DataLoadError> {
        if self.species(&species.name).is_some() {
            return Err(DataLoadError::Invalid(format!(
                "Species '{}' is defined more than once",
                species.name
            )));
        }
        species.validate().map_err(DataLoadError::Invalid)?;
        self.species.push(species);
        Ok(())
    }

    pub fn add_configuration(&mut self, configuration: Configuration) -> Result<(), DataLoadError> {
        if self.configuration(configuration.name()).is_some() {
            return Err(DataLoadError::Invalid(format!(
                "Configuration '{}' is defined more than once",
                configuration.name()
            )));
        }
        self.configurations.push(configuration);
        Ok(())
    }

    pub fn species(&self, name: &str) -> Option<&Species> {
        self.species
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn species_iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn configurations_iter(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.iter()
    }
}

#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid system data: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SYSTEM: &str = r#"
[[species]]
name = "Argon"
atoms = [{ element = "Ar", position = [0.0, 0.0, 0.0] }]
sites = [{ name = "Ar", atoms = [0] }]

[[species]]
name = "Water"
atoms = [
    { element = "O", position = [0.0, 0.0, 0.0] },
    { element = "H", position = [0.9572, 0.0, 0.0] },
    { element = "H", position = [-0.24, 0.9266, 0.0] },
]
sites = [{ name = "O", atoms = [0] }]

[[configurations]]
name = "Seed"
box = [10.0, 10.0, 10.0]
temperature = 250.0
molecules = [
    { species = "Argon", centre = [1.0, 2.0, 3.0] },
    { species = "Water" },
]
"#;

    #[test]
    fn loads_species_and_configurations_from_toml() {
        let data = CoreData::from_toml_str(SYSTEM).unwrap();
        assert_eq!(data.species_iter().count(), 2);
        assert_eq!(data.species("water").unwrap().n_atoms(), 3);

        let cfg = data.configuration("seed").unwrap();
        assert_eq!(cfg.n_molecules(), 2);
        assert_eq!(cfg.temperature(), 250.0);
        let (_, argon) = cfg.molecules_iter().next().unwrap();
        assert!((argon.centre() - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn load_reads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SYSTEM.as_bytes()).unwrap();
        let data = CoreData::load(file.path()).unwrap();
        assert!(data.species("Argon").is_some());
    }

    #[test]
    fn load_reports_missing_file() {
        let result = CoreData::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(DataLoadError::Io { .. })));
    }

    #[test]
    fn unknown_species_in_configuration_is_rejected() {
        let content = r#"
[[configurations]]
name = "Bad"
box = [1.0, 1.0, 1.0]
molecules = [{ species = "Ghost" }]
"#;
        let err = CoreData::from_toml_str(content).unwrap_err();
        assert!(matches!(err, DataLoadError::Invalid(msg) if msg.contains("Ghost")));
    }

    #[test]
    fn duplicate_species_names_are_rejected() {
        let mut data = CoreData::from_toml_str(SYSTEM).unwrap();
        let duplicate = data.species("ARGON").unwrap().clone();
        assert!(data.add_species(duplicate).is_err());
    }

    #[test]
    fn unknown_fields_are_a_toml_error() {
        let err = CoreData::from_toml_str("[[species]]\nname = \"X\"\natoms = []\ncolour = 1\n")
            .unwrap_err();
        assert!(matches!(err, DataLoadError::Toml { .. }));
    }
}
