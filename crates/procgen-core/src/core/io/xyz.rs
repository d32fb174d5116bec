use super::traits::{CoordinateFile, CoordinateFrame};
use crate::core::models::configuration::Configuration;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("File ended after {found} of {expected} atoms")]
    Truncated { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Atom line requires an element and three coordinates")]
    MissingField,
    #[error("Invalid coordinate '{0}'")]
    InvalidFloat(String),
}

/// The plain XYZ format: atom count, a title line, then `Element x y z` per atom.
pub struct XyzFile;

impl CoordinateFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<CoordinateFrame, Self::Error> {
        let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));

        let expected = match lines.next() {
            Some((line, text)) => {
                let text = text?;
                text.trim().parse::<usize>().map_err(|_| XyzError::Parse {
                    line,
                    kind: XyzParseErrorKind::InvalidCount(text.trim().to_string()),
                })?
            }
            None => {
                return Err(XyzError::Truncated {
                    expected: 0,
                    found: 0,
                });
            }
        };

        let title = match lines.next() {
            Some((_, text)) => text?.trim().to_string(),
            None => String::new(),
        };

        let mut frame = CoordinateFrame {
            title,
            elements: Vec::with_capacity(expected),
            positions: Vec::with_capacity(expected),
        };

        while frame.n_atoms() < expected {
            let Some((line, text)) = lines.next() else {
                return Err(XyzError::Truncated {
                    expected,
                    found: frame.n_atoms(),
                });
            };
            let text = text?;
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(XyzError::Parse {
                    line,
                    kind: XyzParseErrorKind::MissingField,
                });
            }
            let mut coords = [0.0; 3];
            for (c, field) in coords.iter_mut().zip(&fields[1..4]) {
                *c = field.parse().map_err(|_| XyzError::Parse {
                    line,
                    kind: XyzParseErrorKind::InvalidFloat(field.to_string()),
                })?;
            }
            frame.elements.push(fields[0].to_string());
            frame.positions.push(Point3::from(coords));
        }

        Ok(frame)
    }

    fn write_to(configuration: &Configuration, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", configuration.n_atoms())?;
        writeln!(writer, "{}", configuration.name())?;
        for (_, molecule) in configuration.molecules_iter() {
            for (element, p) in molecule.elements.iter().zip(&molecule.positions) {
                writeln!(writer, "{:<3} {:>14.6} {:>14.6} {:>14.6}", element, p.x, p.y, p.z)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::configuration::Molecule;
    use crate::core::models::species::test_species::water;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn reads_elements_and_positions() {
        let text = "2\ntitle here\nO 0.0 1.0 2.0\nH 1.5 -0.5 3.25\n";
        let frame = XyzFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(frame.title, "title here");
        assert_eq!(frame.elements, vec!["O", "H"]);
        assert_eq!(frame.positions[1], Point3::new(1.5, -0.5, 3.25));
    }

    #[test]
    fn short_file_is_truncated_error() {
        let text = "3\n\nO 0 0 0\n";
        let result = XyzFile::read_from(&mut Cursor::new(text));
        assert!(matches!(
            result,
            Err(XyzError::Truncated {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn bad_coordinate_reports_line_number() {
        let text = "1\n\nO 0 zero 0\n";
        let result = XyzFile::read_from(&mut Cursor::new(text));
        assert!(matches!(result, Err(XyzError::Parse { line: 3, .. })));
    }

    #[test]
    fn written_configuration_can_be_read_back_from_path() {
        let mut cfg = Configuration::new("Box");
        let w = water();
        cfg.add_molecule(Molecule::from_species(&w, w.positions()));

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xyz");
        XyzFile::write_to_path(&cfg, &path).unwrap();

        let frame = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(frame.title, "Box");
        assert_eq!(frame.n_atoms(), 3);
        assert!((frame.positions[1] - Point3::new(0.9572, 0.0, 0.0)).norm() < 1e-6);
    }
}
