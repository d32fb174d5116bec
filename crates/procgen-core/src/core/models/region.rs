use super::simbox::SimBox;
use nalgebra::{Point3, Vector3};
use rand::Rng;

/// A voxelised subset of the simulation box.
///
/// The box is divided into roughly cubic voxels of the requested size; each
/// voxel is either inside or outside the region, decided at its centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    simbox: SimBox,
    dims: [usize; 3],
    voxel_lengths: Vector3<f64>,
    inside: Vec<bool>,
    free: Vec<usize>,
}

/// Voxel grid dimensions and centres for `simbox` at the given voxel size.
pub fn voxel_grid(simbox: &SimBox, voxel_size: f64) -> ([usize; 3], Vec<Point3<f64>>) {
    let lengths = simbox.lengths();
    let dims = [0, 1, 2].map(|i| ((lengths[i] / voxel_size).floor() as usize).max(1));
    let voxel_lengths = Vector3::new(
        lengths.x / dims[0] as f64,
        lengths.y / dims[1] as f64,
        lengths.z / dims[2] as f64,
    );

    let mut centres = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
    for x in 0..dims[0] {
        for y in 0..dims[1] {
            for z in 0..dims[2] {
                centres.push(Point3::new(
                    (x as f64 + 0.5) * voxel_lengths.x,
                    (y as f64 + 0.5) * voxel_lengths.y,
                    (z as f64 + 0.5) * voxel_lengths.z,
                ));
            }
        }
    }
    (dims, centres)
}

impl Region {
    /// Builds a region from per-voxel flags laid out as returned by [`voxel_grid`].
    ///
    /// Returns `None` if `inside` does not match the grid size.
    pub fn from_flags(simbox: &SimBox, voxel_size: f64, inside: Vec<bool>) -> Option<Self> {
        let (dims, _) = voxel_grid(simbox, voxel_size);
        if inside.len() != dims[0] * dims[1] * dims[2] {
            return None;
        }
        Some(Self::assemble(simbox, dims, inside))
    }

    /// Builds a region by testing each voxel centre with `predicate`.
    pub fn build(simbox: &SimBox, voxel_size: f64, predicate: impl Fn(&Point3<f64>) -> bool) -> Self {
        let (dims, centres) = voxel_grid(simbox, voxel_size);
        let inside = centres.iter().map(&predicate).collect();
        Self::assemble(simbox, dims, inside)
    }

    fn assemble(simbox: &SimBox, dims: [usize; 3], inside: Vec<bool>) -> Self {
        let lengths = simbox.lengths();
        let voxel_lengths = Vector3::new(
            lengths.x / dims[0] as f64,
            lengths.y / dims[1] as f64,
            lengths.z / dims[2] as f64,
        );
        let free = inside
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| f.then_some(i))
            .collect();
        Self {
            simbox: simbox.clone(),
            dims,
            voxel_lengths,
            inside,
            free,
        }
    }

    pub fn n_voxels(&self) -> usize {
        self.inside.len()
    }

    pub fn n_free_voxels(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Fraction of the box volume inside the region.
    pub fn free_fraction(&self) -> f64 {
        if self.inside.is_empty() {
            0.0
        } else {
            self.free.len() as f64 / self.inside.len() as f64
        }
    }

    fn voxel_index(&self, p: &Point3<f64>) -> usize {
        let folded = self.simbox.fold(p);
        let idx = [0, 1, 2].map(|i| {
            let v = (folded[i] / self.voxel_lengths[i]).floor();
            (v.max(0.0) as usize).min(self.dims[i] - 1)
        });
        (idx[0] * self.dims[1] + idx[1]) * self.dims[2] + idx[2]
    }

    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.inside
            .get(self.voxel_index(p))
            .copied()
            .unwrap_or(false)
    }

    /// A uniformly random point within a random free voxel, or `None` if the region is empty.
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Point3<f64>> {
        if self.free.is_empty() {
            return None;
        }
        let index = self.free[rng.gen_range(0..self.free.len())];
        let z = index % self.dims[2];
        let y = (index / self.dims[2]) % self.dims[1];
        let x = index / (self.dims[1] * self.dims[2]);
        Some(Point3::new(
            (x as f64 + rng.r#gen::<f64>()) * self.voxel_lengths.x,
            (y as f64 + rng.r#gen::<f64>()) * self.voxel_lengths.y,
            (z as f64 + rng.r#gen::<f64>()) * self.voxel_lengths.z,
        ))
    }
}
