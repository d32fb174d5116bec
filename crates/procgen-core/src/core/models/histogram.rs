/// A one-dimensional histogram with fixed-width bins over `[minimum, maximum)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    minimum: f64,
    maximum: f64,
    bin_width: f64,
    counts: Vec<u64>,
    n_binned: u64,
    n_missed: u64,
    runs: u64,
}

impl Histogram1D {
    /// Creates an empty histogram. The range is extended, if necessary, so that it
    /// spans a whole number of bins.
    pub fn new(minimum: f64, maximum: f64, bin_width: f64) -> Option<Self> {
        if !(bin_width > 0.0) || !(maximum > minimum) {
            return None;
        }
        let n_bins = ((maximum - minimum) / bin_width).ceil() as usize;
        Some(Self {
            minimum,
            maximum: minimum + n_bins as f64 * bin_width,
            bin_width,
            counts: vec![0; n_bins],
            n_binned: 0,
            n_missed: 0,
            runs: 1,
        })
    }

    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    pub fn maximum(&self) -> f64 {
        self.maximum
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn n_binned(&self) -> u64 {
        self.n_binned
    }

    pub fn n_missed(&self) -> u64 {
        self.n_missed
    }

    /// Number of runs whose counts this histogram holds.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Counts divided by the number of accumulated runs.
    pub fn averaged_counts(&self) -> Vec<f64> {
        let runs = self.runs.max(1) as f64;
        self.counts.iter().map(|&c| c as f64 / runs).collect()
    }

    /// Adds `value` to its bin. Returns `false` if it lies outside the range.
    pub fn bin(&mut self, value: f64) -> bool {
        if value < self.minimum || value >= self.maximum || value.is_nan() {
            self.n_missed += 1;
            return false;
        }
        let index = ((value - self.minimum) / self.bin_width) as usize;
        match self.counts.get_mut(index) {
            Some(count) => {
                *count += 1;
                self.n_binned += 1;
                true
            }
            None => {
                self.n_missed += 1;
                false
            }
        }
    }

    pub fn bin_centres(&self) -> Vec<f64> {
        (0..self.counts.len())
            .map(|i| self.minimum + (i as f64 + 0.5) * self.bin_width)
            .collect()
    }

    /// Adds the counts of `other` into this histogram. Returns `false`, leaving
    /// this histogram unchanged, if the binning differs.
    pub fn accumulate(&mut self, other: &Histogram1D) -> bool {
        if self.minimum != other.minimum
            || self.bin_width != other.bin_width
            || self.counts.len() != other.counts.len()
        {
            return false;
        }
        for (c, o) in self.counts.iter_mut().zip(&other.counts) {
            *c += o;
        }
        self.n_binned += other.n_binned;
        self.n_missed += other.n_missed;
        self.runs += other.runs;
        true
    }

    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.n_binned = 0;
        self.n_missed = 0;
        self.runs = 1;
    }
}
