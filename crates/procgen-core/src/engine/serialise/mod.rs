//! Reading and writing procedures.
//!
//! Two persistent forms are supported: the line-oriented text format, where each
//! node block is closed by its own `End<Type>` marker, and a structured TOML form
//! in which every node is a table and branches are nested arrays. Both readers
//! validate through [`Procedure::set_keyword`], so a graph that reads successfully
//! has every name and reference resolved.

pub mod structured;
pub mod text;

use super::error::ProcedureError;
use super::procedure::Procedure;
use crate::core::data::CoreData;
use std::path::Path;

pub use structured::{from_table, from_toml_str, to_table, to_toml_string};
pub use text::{read_procedure, write_procedure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureFormat {
    Text,
    Toml,
}

impl ProcedureFormat {
    /// `.toml` files use the structured form; anything else is text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ProcedureFormat::Toml,
            _ => ProcedureFormat::Text,
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ProcedureError {
    ProcedureError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

pub fn load_procedure(path: &Path, core: &CoreData) -> Result<Procedure, ProcedureError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    match ProcedureFormat::from_path(path) {
        ProcedureFormat::Text => read_procedure(&content, core),
        ProcedureFormat::Toml => from_toml_str(&content, core),
    }
}

pub fn save_procedure(procedure: &Procedure, path: &Path) -> Result<(), ProcedureError> {
    let content = match ProcedureFormat::from_path(path) {
        ProcedureFormat::Text => write_procedure(procedure),
        ProcedureFormat::Toml => to_toml_string(procedure)?,
    };
    std::fs::write(path, content).map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::nodes::test_support::core;
    use std::path::PathBuf;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ProcedureFormat::from_path(&PathBuf::from("a.TOML")), ProcedureFormat::Toml);
        assert_eq!(ProcedureFormat::from_path(&PathBuf::from("a.txt")), ProcedureFormat::Text);
        assert_eq!(ProcedureFormat::from_path(&PathBuf::from("generator")), ProcedureFormat::Text);
    }

    #[test]
    fn saved_toml_loads_back() {
        let text = "Generator\n  Temperature\n    Temperature 250.0\n  EndTemperature\nEndGenerator\n";
        let procedure = read_procedure(text, &core()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.toml");
        save_procedure(&procedure, &path).unwrap();
        let loaded = load_procedure(&path, &core()).unwrap();
        assert_eq!(write_procedure(&loaded), text);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_procedure(Path::new("/nonexistent/proc.txt"), &core()).unwrap_err();
        assert!(matches!(err, ProcedureError::Io { path, .. } if path.contains("proc.txt")));
    }
}
