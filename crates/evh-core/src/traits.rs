//! Collaborator traits for evh
//!
//! The analysis layer (`evh-analysis`) only talks to record data and output
//! storage through these traits, so it does not depend on any concrete
//! file format.

use std::ops::Range;

use crate::Result;
use crate::histogram::Histogram;

/// One record stream ("tree") read in index order.
pub trait EventSource {
    /// Tree name, e.g. `"Event."`.
    fn name(&self) -> &str;

    /// Number of records.
    fn entry_count(&self) -> u64;

    /// Make `index` the current record.
    fn load_record(&mut self, index: u64) -> Result<()>;

    /// Index of the current record, if one is loaded.
    fn current_record(&self) -> Option<u64>;

    /// Whether the tree carries a branch (or column) with this name.
    fn has_branch(&self, branch: &str) -> bool;

    /// Fill `hist` from every record in `range`.
    ///
    /// `variable` holds one expression per axis separated by `:`, and
    /// `selection` is evaluated as the fill weight. Returns the number of
    /// fills performed.
    fn query_fill(
        &self,
        hist: &mut Histogram,
        variable: &str,
        selection: &str,
        range: Range<u64>,
    ) -> Result<u64>;

    /// Species ids present in `branch` at the current record.
    fn species_ids_at_current_record(&self, branch: &str) -> Result<Vec<i64>>;

    /// Histograms stored in `branch` at the current record.
    fn stored_histograms_at_current_record(&self, branch: &str) -> Result<Vec<Histogram>>;
}

/// A set of named trees, e.g. one input file.
pub trait TreeProvider {
    /// Whether a tree with this name exists.
    fn has_tree(&self, name: &str) -> bool;

    /// Mutable access to one tree.
    fn tree_mut(&mut self, name: &str) -> Result<&mut dyn EventSource>;
}

/// Destination for finished histograms.
pub trait HistogramSink {
    /// Take ownership of `histogram` and store it under `group`.
    fn persist(&mut self, group: &str, histogram: Histogram) -> Result<()>;
}
