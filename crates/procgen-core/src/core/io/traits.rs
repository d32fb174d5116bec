use crate::core::models::configuration::Configuration;
use nalgebra::Point3;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Atomic coordinates read from a coordinate file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateFrame {
    pub title: String,
    pub elements: Vec<String>,
    pub positions: Vec<Point3<f64>>,
}

impl CoordinateFrame {
    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }
}

/// Defines the interface for reading and writing coordinate file formats.
///
/// Implementors handle format-specific parsing; the path helpers wrap the
/// reader/writer methods with buffered file handles.
pub trait CoordinateFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a single coordinate frame from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<CoordinateFrame, Self::Error>;

    /// Writes every atom of a configuration, in molecule insertion order.
    ///
    /// # Arguments
    ///
    /// * `configuration` - The configuration to write.
    /// * `writer` - The writer to output to.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(configuration: &Configuration, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<CoordinateFrame, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(
        configuration: &Configuration,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(configuration, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
