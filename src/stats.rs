use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Equal-width histogram over `[0, max_val]`.
///
/// Values above `max_val` are counted in the last bin.
#[derive(Debug, Clone)]
pub struct Histogram {
    max_val: usize,
    counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramReport {
    pub bin_edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(max_val: usize, n_bins: usize) -> Self {
        Self {
            max_val: max_val.max(1),
            counts: vec![0; n_bins.max(1)],
        }
    }

    pub fn add(&mut self, val: usize) {
        let n_bins = self.counts.len();
        let i_bin = (val as u128 * n_bins as u128 / self.max_val as u128) as usize;
        let i_bin = i_bin.min(n_bins - 1);
        self.counts[i_bin] += 1;
    }

    pub fn report(&self) -> HistogramReport {
        let n_bins = self.counts.len();
        let bin_edges = (0..=n_bins)
            .map(|i_edge| i_edge as f64 * self.max_val as f64 / n_bins as f64)
            .collect();
        HistogramReport {
            bin_edges,
            counts: self.counts.clone(),
        }
    }
}
