//! Histogram specifications: a tagged variant over 1 to 4 dimensions sharing
//! one header.

use evh_core::{Error, Histogram, Result};
use serde::Serialize;

use crate::binning::BinSpecification;

/// Scale of the fourth axis of a 4D histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisScale {
    /// Equal-width bins.
    Linear,
    /// Log10-spaced bins.
    Log,
    /// Edges read from a file.
    Explicit,
}

impl AxisScale {
    /// Scale implied by an axis binning.
    pub fn of(bins: &BinSpecification) -> Self {
        if bins.edges_source_file.is_some() {
            AxisScale::Explicit
        } else if bins.is_log_spaced() {
            AxisScale::Log
        } else {
            AxisScale::Linear
        }
    }
}

/// Fields shared by every histogram specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramHeader {
    /// Source tree, e.g. `"Event."`.
    pub tree: String,
    /// Histogram name, unique across a configuration.
    pub name: String,
    /// Variable expression, one `:`-separated part per axis.
    pub variable: String,
    /// Selection (weight) expression.
    pub selection: String,
    /// Accumulated per entry (true) or filled in one pass (false).
    pub per_entry: bool,
}

/// What to histogram and how to bin it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HistogramSpec {
    /// One axis.
    D1 { header: HistogramHeader, x: BinSpecification },
    /// Two axes.
    D2 { header: HistogramHeader, x: BinSpecification, y: BinSpecification },
    /// Three axes.
    D3 {
        header: HistogramHeader,
        x: BinSpecification,
        y: BinSpecification,
        z: BinSpecification,
    },
    /// Four axes; the fourth carries an explicit scale tag.
    D4 {
        header: HistogramHeader,
        x: BinSpecification,
        y: BinSpecification,
        z: BinSpecification,
        t: BinSpecification,
        t_scale: AxisScale,
    },
}

impl HistogramSpec {
    /// Build the variant matching the number of axes (1 to 4).
    pub fn from_axes(header: HistogramHeader, axes: Vec<BinSpecification>) -> Result<Self> {
        let n = axes.len();
        let mut it = axes.into_iter();
        let spec = match (n, it.next(), it.next(), it.next(), it.next()) {
            (1, Some(x), None, None, None) => HistogramSpec::D1 { header, x },
            (2, Some(x), Some(y), None, None) => HistogramSpec::D2 { header, x, y },
            (3, Some(x), Some(y), Some(z), None) => HistogramSpec::D3 { header, x, y, z },
            (4, Some(x), Some(y), Some(z), Some(t)) => {
                let t_scale = AxisScale::of(&t);
                HistogramSpec::D4 { header, x, y, z, t, t_scale }
            }
            _ => {
                return Err(Error::Config(format!(
                    "histogram '{}': 1 to 4 axes are supported, got {n}",
                    header.name
                )));
            }
        };
        Ok(spec)
    }

    /// Shared header.
    pub fn header(&self) -> &HistogramHeader {
        match self {
            HistogramSpec::D1 { header, .. }
            | HistogramSpec::D2 { header, .. }
            | HistogramSpec::D3 { header, .. }
            | HistogramSpec::D4 { header, .. } => header,
        }
    }

    fn header_mut(&mut self) -> &mut HistogramHeader {
        match self {
            HistogramSpec::D1 { header, .. }
            | HistogramSpec::D2 { header, .. }
            | HistogramSpec::D3 { header, .. }
            | HistogramSpec::D4 { header, .. } => header,
        }
    }

    /// Deep copy under a new name and selection.
    pub fn specialize(&self, name: impl Into<String>, selection: impl Into<String>) -> Self {
        let mut spec = self.clone();
        let header = spec.header_mut();
        header.name = name.into();
        header.selection = selection.into();
        spec
    }

    /// Histogram name.
    pub fn name(&self) -> &str {
        &self.header().name
    }

    /// Source tree.
    pub fn tree(&self) -> &str {
        &self.header().tree
    }

    /// Variable expression.
    pub fn variable(&self) -> &str {
        &self.header().variable
    }

    /// Selection expression.
    pub fn selection(&self) -> &str {
        &self.header().selection
    }

    /// Whether this is a per-entry histogram.
    pub fn per_entry(&self) -> bool {
        self.header().per_entry
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        match self {
            HistogramSpec::D1 { .. } => 1,
            HistogramSpec::D2 { .. } => 2,
            HistogramSpec::D3 { .. } => 3,
            HistogramSpec::D4 { .. } => 4,
        }
    }

    /// Axis binnings in x, y, z, t order.
    pub fn axes(&self) -> Vec<&BinSpecification> {
        match self {
            HistogramSpec::D1 { x, .. } => vec![x],
            HistogramSpec::D2 { x, y, .. } => vec![x, y],
            HistogramSpec::D3 { x, y, z, .. } => vec![x, y, z],
            HistogramSpec::D4 { x, y, z, t, .. } => vec![x, y, z, t],
        }
    }

    /// Declaration-style binning, e.g. `{100} {0:10}` or `{10,20} {0:1,-5:5}`.
    pub fn to_binning_string(&self) -> String {
        let axes = self.axes();
        let bins: Vec<String> = axes.iter().map(|a| a.n.to_string()).collect();
        let ranges: Vec<String> = axes.iter().map(|a| a.binning_field()).collect();
        format!("{{{}}} {{{}}}", bins.join(","), ranges.join(","))
    }

    /// Declaration keyword, e.g. `Histogram2D` or `SimpleHistogram1DLog`.
    ///
    /// Per-axis `Lin`/`Log` flags are listed up to the last log axis.
    pub fn to_kind_string(&self) -> String {
        let axes = self.axes();
        let mut kind = String::new();
        if !self.per_entry() {
            kind.push_str("Simple");
        }
        kind.push_str(&format!("Histogram{}D", axes.len()));
        if let Some(last_log) = axes.iter().rposition(|a| a.is_log_spaced()) {
            for a in &axes[..=last_log] {
                kind.push_str(if a.is_log_spaced() { "Log" } else { "Lin" });
            }
        }
        kind
    }

    /// Empty histogram buffer with this binning.
    pub fn create_histogram(&self) -> Result<Histogram> {
        let axes = self.axes().into_iter().map(|a| a.to_axis()).collect::<Result<Vec<_>>>()?;
        Histogram::new(self.name(), self.variable(), axes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, per_entry: bool) -> HistogramHeader {
        HistogramHeader {
            tree: "Event.".into(),
            name: name.into(),
            variable: "Primary.x".into(),
            selection: "1".into(),
            per_entry,
        }
    }

    #[test]
    fn kind_and_binning_strings() {
        let x = BinSpecification::uniform(0.0, 10.0, 100).unwrap();
        let h = HistogramSpec::from_axes(header("h", true), vec![x.clone()]).unwrap();
        assert_eq!(h.to_kind_string(), "Histogram1D");
        assert_eq!(h.to_binning_string(), "{100} {0:10}");

        let l = BinSpecification::log10(0.0, 2.0, 4).unwrap();
        let h = HistogramSpec::from_axes(header("s", false), vec![l.clone()]).unwrap();
        assert_eq!(h.to_kind_string(), "SimpleHistogram1DLog");

        let h = HistogramSpec::from_axes(header("h2", true), vec![x.clone(), l]).unwrap();
        assert_eq!(h.to_kind_string(), "Histogram2DLinLog");
        assert_eq!(h.dimension(), 2);

        let f = BinSpecification::from_edges(vec![0.0, 1.0, 3.0], Some("e.txt".into())).unwrap();
        let h = HistogramSpec::from_axes(header("h3", true), vec![f, x.clone(), x]).unwrap();
        assert_eq!(h.to_binning_string(), "{2,100,100} {e.txt,0:10,0:10}");
    }

    #[test]
    fn four_axes_carry_scale_tag() {
        let x = BinSpecification::uniform(0.0, 1.0, 2).unwrap();
        let t = BinSpecification::log10(-1.0, 1.0, 2).unwrap();
        let h = HistogramSpec::from_axes(header("h4", true), vec![x.clone(), x.clone(), x, t])
            .unwrap();
        assert!(matches!(h, HistogramSpec::D4 { t_scale: AxisScale::Log, .. }));
        assert_eq!(h.create_histogram().unwrap().n_cells(), 4 * 4 * 4 * 4);
        assert!(HistogramSpec::from_axes(header("h0", true), vec![]).is_err());
    }

    #[test]
    fn specialize_is_a_deep_copy() {
        let x = BinSpecification::from_edges(vec![0.0, 1.0, 2.0], None).unwrap();
        let base = HistogramSpec::from_axes(header("base", true), vec![x]).unwrap();
        let s = base.specialize("Spectra_base_11", "S.speciesId==11");
        assert_eq!(s.name(), "Spectra_base_11");
        assert_eq!(s.selection(), "S.speciesId==11");
        assert_eq!(base.name(), "base");
        assert_eq!(s.axes(), base.axes());
    }
}
