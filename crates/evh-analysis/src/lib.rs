//! # evh-analysis
//!
//! Runs a parsed configuration over record trees:
//!
//! - simple histograms are filled with one query per tree;
//! - per-entry histograms hold the per-record mean of every bin, with the
//!   standard error of that mean as bin error ([`Accumulator`]);
//! - spectra sets split a histogram per particle species, discovering species
//!   while reading when no explicit list is given;
//! - stored per-record histograms are merged, and finished result files can
//!   be combined with [`combine_documents`].

#![warn(clippy::all)]
#![allow(missing_docs)]

pub mod accumulator;
pub mod analysis;
pub mod merge;
pub mod per_entry;
pub mod per_entry_set;

pub use accumulator::Accumulator;
pub use analysis::{
    Analysis, MERGED_GROUP, PER_ENTRY_GROUP, PER_ENTRY_SET_GROUP, RunSummary, SIMPLE_GROUP,
    SIMPLE_SET_GROUP, TreeSummary, group_path,
};
pub use merge::{StoredHistogramMerger, combine_documents, merge_results, sum_results};
pub use per_entry::PerEntryHistogram;
pub use per_entry_set::{PerEntryHistogramSet, SpeciesSubset};
