use super::ids::MoleculeId;
use super::simbox::SimBox;
use nalgebra::{Point3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotentialForm {
    /// `k (d - r)^2` once the boundary is crossed.
    Harmonic,
    /// `k / d^2` inside the excluded volume.
    Repulsive,
}

impl PotentialForm {
    pub const KEYWORDS: &'static [&'static str] = &["Harmonic", "Repulsive"];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "harmonic" => Some(PotentialForm::Harmonic),
            "repulsive" => Some(PotentialForm::Repulsive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PotentialGeometry {
    Spherical {
        origin: Point3<f64>,
        radius: f64,
    },
    Cylindrical {
        origin: Point3<f64>,
        vector: Vector3<f64>,
        radius: f64,
    },
    /// A region described by a formula over `x`, `y` and `z`; points whose value
    /// falls within `[minimum, maximum]` are inside.
    Regional {
        expression: String,
        minimum: f64,
        maximum: f64,
    },
    /// Tethers each atom of the listed molecules to its position at the time the
    /// restraint was created.
    Restraint {
        molecules: Vec<MoleculeId>,
        anchors: Vec<Point3<f64>>,
    },
}

/// A potential applied to atoms of a configuration from outside the pair interactions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalPotential {
    pub geometry: PotentialGeometry,
    pub form: PotentialForm,
    pub force_constant: f64,
}

impl ExternalPotential {
    /// Energy felt by an atom at `r` from a geometric potential.
    ///
    /// Atoms outside a spherical or cylindrical boundary are pulled back
    /// (`Harmonic`) or atoms inside are pushed out (`Repulsive`). Regional and
    /// restraint potentials depend on data not available here and contribute zero.
    pub fn energy_at(&self, simbox: &SimBox, r: &Point3<f64>) -> f64 {
        let (distance, radius) = match &self.geometry {
            PotentialGeometry::Spherical { origin, radius } => {
                (simbox.minimum_distance(origin, r), *radius)
            }
            PotentialGeometry::Cylindrical {
                origin,
                vector,
                radius,
            } => {
                let v = simbox.minimum_vector(origin, r);
                let axis = vector.try_normalize(1e-12).unwrap_or_else(Vector3::z);
                ((v - axis * v.dot(&axis)).norm(), *radius)
            }
            PotentialGeometry::Regional { .. } | PotentialGeometry::Restraint { .. } => {
                return 0.0;
            }
        };

        match self.form {
            PotentialForm::Harmonic if distance > radius => {
                self.force_constant * (distance - radius).powi(2)
            }
            PotentialForm::Repulsive if distance < radius => {
                self.force_constant / distance.max(1e-6).powi(2)
            }
            _ => 0.0,
        }
    }
}
