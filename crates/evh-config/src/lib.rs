//! # evh-config
//!
//! The analysis configuration language: options, histogram declarations on
//! record trees, and species-indexed spectra. Parsing produces a [`Config`]
//! holding typed [`HistogramSpec`] and [`HistogramSetSpec`] values.
//!
//! ```no_run
//! let config = evh_config::Config::load("analysis.txt").unwrap();
//! for (tree, hists) in config.trees() {
//!     for h in hists.all() {
//!         println!("{tree} {} {} {}", h.to_kind_string(), h.name(), h.to_binning_string());
//!     }
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod binning;
pub mod config;
pub mod options;
pub mod parser;
pub mod selection;
pub mod set_spec;
pub mod spec;
pub mod species;

pub use binning::{BinSpecification, lin_space, load_edges_from_file, log_space};
pub use config::{Config, EVENT_TREE, RUN_TREE, STORED_HISTOGRAMS_BRANCH, TREE_NAMES, TreeHistograms};
pub use options::Options;
pub use selection::add_species_filter;
pub use set_spec::HistogramSetSpec;
pub use spec::{AxisScale, HistogramHeader, HistogramSpec};
pub use species::{ExpansionPolicy, Role, SpeciesKey, SpeciesSpecifier, is_ion, parse_species_specifier};
