use nalgebra::{Point3, Vector3};
use rand::Rng;

/// The periodic simulation cell.
///
/// Cell angles are recorded for output but minimum-image operations treat the
/// cell as orthorhombic.
#[derive(Debug, Clone, PartialEq)]
pub struct SimBox {
    lengths: Vector3<f64>,
    angles: Vector3<f64>,
    periodic: bool,
}

impl Default for SimBox {
    fn default() -> Self {
        Self::cubic(1.0)
    }
}

impl SimBox {
    pub fn new(lengths: Vector3<f64>) -> Self {
        Self {
            lengths,
            angles: Vector3::new(90.0, 90.0, 90.0),
            periodic: true,
        }
    }

    pub fn cubic(length: f64) -> Self {
        Self::new(Vector3::new(length, length, length))
    }

    pub fn with_angles(mut self, angles: Vector3<f64>) -> Self {
        self.angles = angles;
        self
    }

    pub fn with_periodic(mut self, periodic: bool) -> Self {
        self.periodic = periodic;
        self
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.lengths
    }

    pub fn angles(&self) -> Vector3<f64> {
        self.angles
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }

    pub fn centre(&self) -> Point3<f64> {
        Point3::from(self.lengths * 0.5)
    }

    /// Scales each cell axis independently.
    pub fn scale(&mut self, factors: Vector3<f64>) {
        self.lengths.component_mul_assign(&factors);
    }

    pub fn fractional_to_real(&self, fractional: &Vector3<f64>) -> Point3<f64> {
        Point3::from(fractional.component_mul(&self.lengths))
    }

    pub fn real_to_fractional(&self, real: &Point3<f64>) -> Vector3<f64> {
        real.coords.component_div(&self.lengths)
    }

    /// Shortest vector from `a` to `b` under the minimum-image convention.
    pub fn minimum_vector(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        let mut d = b - a;
        if self.periodic {
            for i in 0..3 {
                let l = self.lengths[i];
                if l > 0.0 {
                    d[i] -= l * (d[i] / l).round();
                }
            }
        }
        d
    }

    pub fn minimum_distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_vector(a, b).norm()
    }

    /// Maps a point back into the primary cell.
    pub fn fold(&self, p: &Point3<f64>) -> Point3<f64> {
        if !self.periodic {
            return *p;
        }
        let mut folded = *p;
        for i in 0..3 {
            let l = self.lengths[i];
            if l > 0.0 {
                folded[i] = p[i].rem_euclid(l);
            }
        }
        folded
    }

    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Point3<f64> {
        let fractional = Vector3::new(rng.r#gen::<f64>(), rng.r#gen::<f64>(), rng.r#gen::<f64>());
        self.fractional_to_real(&fractional)
    }
}
