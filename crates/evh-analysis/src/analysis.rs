//! The analysis driver: walks every tree once and writes the configured
//! histograms.

use std::ops::Range;

use evh_config::{Config, EVENT_TREE, HistogramSpec, RUN_TREE, STORED_HISTOGRAMS_BRANCH, TREE_NAMES};
use evh_core::{Error, EventSource, HistogramSink, Result, TreeProvider};

use crate::merge::StoredHistogramMerger;
use crate::per_entry::PerEntryHistogram;
use crate::per_entry_set::PerEntryHistogramSet;

/// Group of per-entry (mean per record) histograms.
pub const PER_ENTRY_GROUP: &str = "PerEntryHistograms";
/// Group of histograms filled in one pass.
pub const SIMPLE_GROUP: &str = "SimpleHistograms";
/// Group of merged stored histograms.
pub const MERGED_GROUP: &str = "MergedHistograms";
/// Group of per-entry histogram set members.
pub const PER_ENTRY_SET_GROUP: &str = "PerEntryHistogramSets";
/// Group of simple histogram set members.
pub const SIMPLE_SET_GROUP: &str = "SimpleHistogramSets";

/// Output group path of `group` for `tree`, e.g. `Event/PerEntryHistograms`.
pub fn group_path(tree: &str, group: &str) -> String {
    format!("{}/{group}", tree.trim_end_matches('.'))
}

/// What was written for one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub tree: String,
    /// Records read by the per-entry loop.
    pub records: u64,
    pub per_entry: usize,
    pub simple: usize,
    pub merged: usize,
    pub set_members: usize,
}

/// What an analysis run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub trees: Vec<TreeSummary>,
}

impl RunSummary {
    /// Histograms written across all trees.
    pub fn histograms(&self) -> usize {
        self.trees.iter().map(|t| t.per_entry + t.simple + t.merged + t.set_members).sum()
    }
}

/// Runs a parsed [`Config`] over the trees of one input.
#[derive(Debug, Clone, Copy)]
pub struct Analysis<'c> {
    config: &'c Config,
}

impl<'c> Analysis<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// Process every known tree of `input`, persisting results into `sink`.
    ///
    /// A tree that is absent from the input is an error only if something is
    /// declared on it.
    pub fn run(&self, input: &mut dyn TreeProvider, sink: &mut dyn HistogramSink) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for tree in TREE_NAMES {
            if !input.has_tree(tree) {
                if self.has_work(tree) {
                    return Err(Error::Runtime(format!("tree '{tree}' not found in input")));
                }
                tracing::debug!(tree, "tree absent, skipping");
                continue;
            }
            let source = input.tree_mut(tree)?;
            summary.trees.push(self.process_tree(tree, source, sink)?);
        }
        tracing::info!(histograms = summary.histograms(), "analysis finished");
        Ok(summary)
    }

    fn has_work(&self, tree: &str) -> bool {
        let declared = self.config.histograms(tree).is_some_and(|h| !h.is_empty());
        let sets = tree == EVENT_TREE
            && !(self.config.per_entry_sets().is_empty() && self.config.simple_sets().is_empty());
        declared || sets
    }

    fn record_range(&self, tree: &str, entries: u64) -> Range<u64> {
        if tree == EVENT_TREE { self.config.options.event_range(entries) } else { 0..entries }
    }

    fn check_branches(&self, tree: &str, source: &dyn EventSource) -> Result<()> {
        let Some(branches) = self.config.branches(tree) else {
            return Ok(());
        };
        for branch in branches.iter().filter(|b| b.as_str() != STORED_HISTOGRAMS_BRANCH) {
            if !source.has_branch(branch) {
                return Err(Error::Runtime(format!("branch '{branch}' not found in tree '{tree}'")));
            }
        }
        Ok(())
    }

    fn process_tree(
        &self,
        tree: &str,
        source: &mut dyn EventSource,
        sink: &mut dyn HistogramSink,
    ) -> Result<TreeSummary> {
        self.check_branches(tree, source)?;
        let range = self.record_range(tree, source.entry_count());
        let mut summary = TreeSummary { tree: tree.to_string(), ..Default::default() };
        tracing::info!(tree, entries = source.entry_count(), start = range.start, end = range.end, "processing tree");

        let declared = self.config.histograms(tree);
        let is_event = tree == EVENT_TREE;

        for spec in declared.into_iter().flat_map(|h| h.simple()) {
            summary.simple += fill_simple(spec, &*source, range.clone(), sink, &group_path(tree, SIMPLE_GROUP))?;
        }
        if is_event {
            let group = group_path(tree, SIMPLE_SET_GROUP);
            for set in self.config.simple_sets() {
                for spec in set.materialized().values() {
                    summary.set_members += fill_simple(spec, &*source, range.clone(), sink, &group)?;
                }
            }
        }

        let per_entry = self.config.options.per_entry(tree);
        let mut histograms = match declared {
            Some(h) if per_entry => h.per_entry().map(PerEntryHistogram::new).collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };
        let mut sets = if is_event && per_entry {
            self.config.per_entry_sets().iter().map(PerEntryHistogramSet::new).collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let mut merger = None;
        if self.config.options.merge_histograms && (is_event || tree == RUN_TREE) {
            if source.has_branch(STORED_HISTOGRAMS_BRANCH) {
                merger = Some(StoredHistogramMerger::new(STORED_HISTOGRAMS_BRANCH));
            } else {
                tracing::warn!(tree, branch = STORED_HISTOGRAMS_BRANCH, "no stored histograms to merge");
            }
        }

        if histograms.is_empty() && sets.is_empty() && merger.is_none() {
            return Ok(summary);
        }

        let total = range.end - range.start;
        let every = progress_interval(total, self.config.options.print_modulo_fraction);
        for (i, index) in range.enumerate() {
            source.load_record(index)?;
            if i as u64 % every == 0 {
                tracing::info!(tree, record = index, done = i, total, "processing records");
            }
            let record: &dyn EventSource = &*source;
            for h in histograms.iter_mut() {
                h.ingest(record)?;
            }
            for set in sets.iter_mut() {
                set.ingest(record)?;
            }
            if let Some(m) = merger.as_mut() {
                m.ingest(record)?;
            }
            summary.records += 1;
        }

        let group = group_path(tree, PER_ENTRY_GROUP);
        for h in histograms {
            sink.persist(&group, h.into_result())?;
            summary.per_entry += 1;
        }
        let group = group_path(tree, PER_ENTRY_SET_GROUP);
        for set in sets {
            summary.set_members += set.write(sink, &group)?;
        }
        if let Some(m) = merger {
            summary.merged += m.write(sink, &group_path(tree, MERGED_GROUP))?;
        }
        tracing::info!(
            tree,
            records = summary.records,
            per_entry = summary.per_entry,
            simple = summary.simple,
            merged = summary.merged,
            set_members = summary.set_members,
            "tree done"
        );
        Ok(summary)
    }
}

/// Fill one histogram over `range` in a single query and persist it.
fn fill_simple(
    spec: &HistogramSpec,
    source: &dyn EventSource,
    range: Range<u64>,
    sink: &mut dyn HistogramSink,
    group: &str,
) -> Result<usize> {
    let mut h = spec.create_histogram()?;
    let fills = source.query_fill(&mut h, spec.variable(), spec.selection(), range)?;
    tracing::debug!(name = spec.name(), fills, "simple histogram filled");
    sink.persist(group, h)?;
    Ok(1)
}

/// Records between progress messages; at least 1.
fn progress_interval(total: u64, fraction: f64) -> u64 {
    let every = (total as f64 * fraction).floor();
    if every.is_finite() && every >= 1.0 { every as u64 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_paths_drop_the_tree_dot() {
        assert_eq!(group_path("Event.", PER_ENTRY_GROUP), "Event/PerEntryHistograms");
        assert_eq!(group_path("Run.", MERGED_GROUP), "Run/MergedHistograms");
    }

    #[test]
    fn progress_interval_is_at_least_one() {
        assert_eq!(progress_interval(1000, 0.01), 10);
        assert_eq!(progress_interval(10, 0.01), 1);
        assert_eq!(progress_interval(0, 0.5), 1);
        assert_eq!(progress_interval(100, f64::NAN), 1);
    }
}
