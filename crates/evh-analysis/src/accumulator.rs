//! Per-cell streaming mean and standard error (Welford's online algorithm).

use evh_core::{Error, Histogram, Result};

/// Running mean and sum of squared deviations, one cell per histogram cell.
#[derive(Debug, Clone)]
struct RunningMoments {
    mean: Histogram,
    m2: Histogram,
}

/// Turns a sequence of single-record histograms into a histogram of per-cell
/// means with the standard error of the mean as error.
///
/// Every cell is visited, under/overflow included. After [`finalize`] the
/// running buffers are released and further samples are rejected.
///
/// [`finalize`]: Accumulator::finalize
#[derive(Debug, Clone)]
pub struct Accumulator {
    moments: Option<RunningMoments>,
    result: Histogram,
    count: u64,
}

impl Accumulator {
    /// Accumulator whose result has the name and binning of `template`.
    pub fn new(template: &Histogram) -> Self {
        let mut result = template.clone();
        result.reset();
        let moments = RunningMoments {
            mean: result.clone_named(format!("{}_mean", template.name)),
            m2: result.clone_named(format!("{}_variance", template.name)),
        };
        Self { moments: Some(moments), result, count: 0 }
    }

    /// Number of samples accumulated, empty ones included.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_finalized(&self) -> bool {
        self.moments.is_none()
    }

    /// Add one sample.
    pub fn accumulate(&mut self, sample: &Histogram) -> Result<()> {
        let Some(moments) = self.moments.as_mut() else {
            return Err(Error::Runtime(format!(
                "accumulator '{}' is finalized and cannot take more samples",
                self.result.name
            )));
        };
        if !sample.same_binning(&self.result) {
            return Err(Error::Runtime(format!(
                "histogram '{}' does not match the binning of '{}'",
                sample.name, self.result.name
            )));
        }

        self.count += 1;
        let n = self.count as f64;
        let mean = &mut moments.mean.content;
        let m2 = &mut moments.m2.content;
        for (cell, &x) in sample.content.iter().enumerate() {
            let delta = x - mean[cell];
            mean[cell] += delta / n;
            m2[cell] += delta * (x - mean[cell]);
        }
        Ok(())
    }

    /// Add `k` all-zero samples.
    ///
    /// Used to account for records processed before this accumulator existed.
    pub fn add_empty_entries(&mut self, k: u64) -> Result<()> {
        let Some(moments) = self.moments.as_mut() else {
            return Err(Error::Runtime(format!(
                "accumulator '{}' is finalized and cannot take more samples",
                self.result.name
            )));
        };
        if k == 0 {
            return Ok(());
        }
        let n_a = self.count as f64;
        let n_b = k as f64;
        let n = n_a + n_b;
        // merge with k zero samples: mean 0, M2 0
        for (mean, m2) in moments.mean.content.iter_mut().zip(moments.m2.content.iter_mut()) {
            let delta = -*mean;
            *mean += delta * n_b / n;
            *m2 += delta * delta * n_a * n_b / n;
        }
        self.count += k;
        Ok(())
    }

    /// Running mean of one cell, while samples are still accepted.
    pub fn mean(&self, cell: usize) -> Option<f64> {
        self.moments.as_ref().and_then(|m| m.mean.content.get(cell).copied())
    }

    /// Running sum of squared deviations of one cell, while samples are still
    /// accepted.
    pub fn m2(&self, cell: usize) -> Option<f64> {
        self.moments.as_ref().and_then(|m| m.m2.content.get(cell).copied())
    }

    /// Sum of the mean over content cells.
    pub fn integral(&self) -> f64 {
        match &self.moments {
            Some(m) => m.mean.integral(),
            None => self.result.integral(),
        }
    }

    /// Write means and standard errors into the result and release the
    /// running buffers. Calling it again returns the same result.
    pub fn finalize(&mut self) -> &Histogram {
        if let Some(moments) = self.moments.take() {
            let n = self.count as f64;
            for cell in 0..self.result.n_cells() {
                self.result.set_bin_content(cell, moments.mean.content[cell]);
                let error =
                    if self.count > 1 { (moments.m2.content[cell] / (n * (n - 1.0))).sqrt() } else { 0.0 };
                self.result.set_bin_error(cell, error);
            }
            self.result.entries = n;
        }
        &self.result
    }

    /// The finalized result, if [`finalize`](Accumulator::finalize) ran.
    pub fn result(&self) -> Option<&Histogram> {
        if self.is_finalized() { Some(&self.result) } else { None }
    }

    /// Finalize and hand over the result.
    pub fn into_result(mut self) -> Histogram {
        self.finalize();
        self.result
    }
}
