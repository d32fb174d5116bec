use super::elements::atomic_mass;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesAtom {
    pub element: String,
    pub position: [f64; 3],
}

impl SpeciesAtom {
    pub fn point(&self) -> Point3<f64> {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }
}

/// A named site on a species, located at the geometric centre of its atoms.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesSite {
    pub name: String,
    pub atoms: Vec<usize>,
}

/// A molecular template: element list, reference geometry and named sites.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Species {
    pub name: String,
    pub atoms: Vec<SpeciesAtom>,
    #[serde(default)]
    pub sites: Vec<SpeciesSite>,
}

impl Species {
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Looks up a site by name (case-insensitive).
    pub fn site(&self, name: &str) -> Option<&SpeciesSite> {
        self.sites.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Reference coordinates of every atom.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(SpeciesAtom::point).collect()
    }

    /// Reference coordinates translated so that their geometric centre is at the origin.
    pub fn centred_positions(&self) -> Vec<Point3<f64>> {
        let centre = geometric_centre(&self.positions());
        self.positions()
            .into_iter()
            .map(|p| Point3::from(p - centre))
            .collect()
    }

    /// Molecular mass in g/mol. Elements with unknown mass contribute nothing.
    pub fn mass(&self) -> f64 {
        self.atoms
            .iter()
            .filter_map(|a| atomic_mass(&a.element))
            .sum()
    }

    /// Checks that every site refers to existing atoms.
    pub fn validate(&self) -> Result<(), String> {
        if self.atoms.is_empty() {
            return Err(format!("Species '{}' contains no atoms", self.name));
        }
        for site in &self.sites {
            if site.atoms.is_empty() {
                return Err(format!(
                    "Site '{}' on species '{}' references no atoms",
                    site.name, self.name
                ));
            }
            if let Some(bad) = site.atoms.iter().find(|&&i| i >= self.atoms.len()) {
                return Err(format!(
                    "Site '{}' on species '{}' references atom index {} but the species has {} atoms",
                    site.name,
                    self.name,
                    bad,
                    self.atoms.len()
                ));
            }
        }
        Ok(())
    }
}

/// Geometric centre of a set of points. An empty set has its centre at the origin.
pub fn geometric_centre(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

#[cfg(test)]
pub(crate) mod test_species {
    use super::*;

    pub fn water() -> Species {
        Species {
            name: "Water".into(),
            atoms: vec![
                SpeciesAtom {
                    element: "O".into(),
                    position: [0.0, 0.0, 0.0],
                },
                SpeciesAtom {
                    element: "H".into(),
                    position: [0.9572, 0.0, 0.0],
                },
                SpeciesAtom {
                    element: "H".into(),
                    position: [-0.2400, 0.9266, 0.0],
                },
            ],
            sites: vec![
                SpeciesSite {
                    name: "O".into(),
                    atoms: vec![0],
                },
                SpeciesSite {
                    name: "COG".into(),
                    atoms: vec![0, 1, 2],
                },
            ],
        }
    }

    pub fn argon() -> Species {
        Species {
            name: "Argon".into(),
            atoms: vec![SpeciesAtom {
                element: "Ar".into(),
                position: [0.0, 0.0, 0.0],
            }],
            sites: vec![SpeciesSite {
                name: "Ar".into(),
                atoms: vec![0],
            }],
        }
    }
}
