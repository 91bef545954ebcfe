//! N-dimensional histogram buffer (1 to 4 axes) with explicit under/overflow cells.
//!
//! Cells are addressed by a single global index. Along every axis bin `0` is
//! the underflow, bins `1..=n_bins` are content bins and `n_bins + 1` is the
//! overflow, so an axis with `n` bins spans `n + 2` cells. The first axis
//! varies fastest.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest supported dimensionality.
pub const MAX_DIMENSIONS: usize = 4;

/// One histogram axis described by its bin edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Bin edges (length = n_bins + 1, strictly increasing).
    pub edges: Vec<f64>,
}

impl Axis {
    /// Create an axis from explicit edges.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Range(format!("axis needs >= 2 edges, got {}", edges.len())));
        }
        if let Some(w) = edges.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(Error::Range(format!(
                "axis edges must be strictly increasing ({} followed by {})",
                w[0], w[1]
            )));
        }
        Ok(Self { edges })
    }

    /// Create an axis of `n_bins` equal-width bins over `[low, high)`.
    pub fn uniform(n_bins: usize, low: f64, high: f64) -> Result<Self> {
        if n_bins == 0 || !(high > low) {
            return Err(Error::Range(format!(
                "invalid uniform axis (n_bins={n_bins}, low={low}, high={high})"
            )));
        }
        let step = (high - low) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| low + i as f64 * step).collect();
        edges.push(high);
        Self::new(edges)
    }

    /// Number of content bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lower edge of the first content bin.
    pub fn low(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last content bin.
    pub fn high(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin holding `val`: `0` for underflow, `n_bins + 1` for overflow (and NaN).
    pub fn find_bin(&self, val: f64) -> usize {
        let n = self.n_bins();
        if val.is_nan() || val >= self.edges[n] {
            return n + 1;
        }
        if val < self.edges[0] {
            return 0;
        }
        self.edges.partition_point(|&e| e <= val)
    }
}

/// Histogram with 1 to 4 axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    pub title: String,
    /// Axes in x, y, z, t order.
    pub axes: Vec<Axis>,
    /// Content of every cell, under/overflow included.
    pub content: Vec<f64>,
    /// Sum of weights squared of every cell.
    pub sumw2: Vec<f64>,
    /// Total number of entries.
    pub entries: f64,
}

impl Histogram {
    /// Create an empty histogram.
    pub fn new(name: impl Into<String>, title: impl Into<String>, axes: Vec<Axis>) -> Result<Self> {
        if axes.is_empty() || axes.len() > MAX_DIMENSIONS {
            return Err(Error::Range(format!(
                "histograms support 1 to {MAX_DIMENSIONS} dimensions, got {}",
                axes.len()
            )));
        }
        let n_cells = axes.iter().map(|a| a.n_bins() + 2).product();
        Ok(Self {
            name: name.into(),
            title: title.into(),
            axes,
            content: vec![0.0; n_cells],
            sumw2: vec![0.0; n_cells],
            entries: 0.0,
        })
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Number of cells including under/overflow.
    pub fn n_cells(&self) -> usize {
        self.content.len()
    }

    /// Global cell index for per-axis bin numbers.
    pub fn cell_index(&self, bins: &[usize]) -> Option<usize> {
        if bins.len() != self.axes.len() {
            return None;
        }
        let mut cell = 0usize;
        let mut stride = 1usize;
        for (axis, &b) in self.axes.iter().zip(bins) {
            let span = axis.n_bins() + 2;
            if b >= span {
                return None;
            }
            cell += b * stride;
            stride *= span;
        }
        Some(cell)
    }

    /// Per-axis bin numbers of a global cell index.
    pub fn cell_bins(&self, mut cell: usize) -> Vec<usize> {
        self.axes
            .iter()
            .map(|axis| {
                let span = axis.n_bins() + 2;
                let b = cell % span;
                cell /= span;
                b
            })
            .collect()
    }

    /// Whether any coordinate of the cell is an under/overflow bin.
    pub fn is_flow_cell(&self, cell: usize) -> bool {
        self.cell_bins(cell)
            .iter()
            .zip(&self.axes)
            .any(|(&b, axis)| b == 0 || b == axis.n_bins() + 1)
    }

    /// Cell holding the point `coords` (one coordinate per axis).
    pub fn find_cell(&self, coords: &[f64]) -> Option<usize> {
        if coords.len() != self.axes.len() {
            return None;
        }
        let bins: Vec<usize> =
            self.axes.iter().zip(coords).map(|(axis, &v)| axis.find_bin(v)).collect();
        self.cell_index(&bins)
    }

    /// Add `weight` at the point `coords`. Returns the cell that was filled.
    pub fn fill(&mut self, coords: &[f64], weight: f64) -> Result<usize> {
        let cell = self.find_cell(coords).ok_or_else(|| {
            Error::Runtime(format!(
                "histogram '{}' has {} axes, got {} coordinates",
                self.name,
                self.axes.len(),
                coords.len()
            ))
        })?;
        self.content[cell] += weight;
        self.sumw2[cell] += weight * weight;
        self.entries += 1.0;
        Ok(cell)
    }

    /// Content of a cell (0 for an out-of-range index).
    pub fn bin_content(&self, cell: usize) -> f64 {
        self.content.get(cell).copied().unwrap_or(0.0)
    }

    /// Overwrite the content of a cell. Out-of-range indices are ignored.
    pub fn set_bin_content(&mut self, cell: usize, value: f64) {
        if let Some(c) = self.content.get_mut(cell) {
            *c = value;
        }
    }

    /// Statistical error of a cell, `sqrt(sumw2)`.
    pub fn bin_error(&self, cell: usize) -> f64 {
        self.sumw2.get(cell).map(|w2| w2.sqrt()).unwrap_or(0.0)
    }

    /// Overwrite the error of a cell. Out-of-range indices are ignored.
    pub fn set_bin_error(&mut self, cell: usize, error: f64) {
        if let Some(w2) = self.sumw2.get_mut(cell) {
            *w2 = error * error;
        }
    }

    /// Zero every cell and the entry count; binning is kept.
    pub fn reset(&mut self) {
        self.content.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|w| *w = 0.0);
        self.entries = 0.0;
    }

    /// Deep copy under a new name.
    pub fn clone_named(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }

    /// Sum of content over content bins (under/overflow excluded).
    pub fn integral(&self) -> f64 {
        (0..self.n_cells()).filter(|&c| !self.is_flow_cell(c)).map(|c| self.content[c]).sum()
    }

    /// Whether `other` has identical axes.
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.axes == other.axes
    }
}
