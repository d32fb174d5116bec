use super::histogram::Histogram1D;

/// Values over a one-dimensional axis, produced by processing collected histograms.
#[derive(Debug, Clone, PartialEq)]
pub struct Data1D {
    x: Vec<f64>,
    values: Vec<f64>,
    bin_width: f64,
}

impl Data1D {
    /// Run-averaged counts of `histogram` against its bin centres.
    pub fn from_histogram(histogram: &Histogram1D) -> Self {
        Self {
            x: histogram.bin_centres(),
            values: histogram.averaged_counts(),
            bin_width: histogram.bin_width(),
        }
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// Divides each value by the volume of the spherical shell spanned by its bin.
    pub fn divide_by_shell_volumes(&mut self) {
        let half = self.bin_width * 0.5;
        for (value, &x) in self.values.iter_mut().zip(&self.x) {
            let (inner, outer) = ((x - half).max(0.0), x + half);
            let volume = 4.0 / 3.0 * std::f64::consts::PI * (outer.powi(3) - inner.powi(3));
            *value /= volume;
        }
    }

    /// Pairs of `(x, value)` in axis order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_from_run_averaged_histogram() {
        let mut a = Histogram1D::new(0.0, 2.0, 1.0).unwrap();
        a.bin(0.5);
        a.bin(0.5);
        let mut b = Histogram1D::new(0.0, 2.0, 1.0).unwrap();
        b.bin(1.5);
        b.bin(1.5);
        assert!(a.accumulate(&b));

        let data = Data1D::from_histogram(&a);
        assert_eq!(data.x(), &[0.5, 1.5]);
        assert_eq!(data.values(), &[1.0, 1.0]);
    }

    #[test]
    fn shell_volumes_grow_with_radius() {
        let mut h = Histogram1D::new(0.0, 2.0, 1.0).unwrap();
        h.bin(0.5);
        h.bin(1.5);
        let mut data = Data1D::from_histogram(&h);
        data.divide_by_shell_volumes();
        let inner = 4.0 / 3.0 * std::f64::consts::PI;
        let outer = 4.0 / 3.0 * std::f64::consts::PI * 7.0;
        assert!((data.values()[0] - 1.0 / inner).abs() < 1e-12);
        assert!((data.values()[1] - 1.0 / outer).abs() < 1e-12);
    }
}
