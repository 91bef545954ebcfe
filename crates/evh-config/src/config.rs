//! The parsed analysis configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use evh_core::{Error, Result};

use crate::options::Options;
use crate::set_spec::HistogramSetSpec;
use crate::spec::HistogramSpec;

/// Trees a histogram may be declared on.
pub const TREE_NAMES: [&str; 5] = ["Beam.", "Event.", "Model.", "Options.", "Run."];
/// Tree holding one record per simulated event.
pub const EVENT_TREE: &str = "Event.";
/// Tree holding one record per run.
pub const RUN_TREE: &str = "Run.";
/// Branch of `Event.`/`Run.` records carrying stored histograms.
pub const STORED_HISTOGRAMS_BRANCH: &str = "Histos";

/// Histograms declared on one tree, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TreeHistograms {
    all: Vec<HistogramSpec>,
    per_entry: Vec<usize>,
    simple: Vec<usize>,
}

impl TreeHistograms {
    fn push(&mut self, spec: HistogramSpec) {
        let idx = self.all.len();
        if spec.per_entry() {
            self.per_entry.push(idx);
        } else {
            self.simple.push(idx);
        }
        self.all.push(spec);
    }

    /// Every histogram of the tree.
    pub fn all(&self) -> &[HistogramSpec] {
        &self.all
    }

    /// Per-entry histograms.
    pub fn per_entry(&self) -> impl Iterator<Item = &HistogramSpec> {
        self.per_entry.iter().map(|&i| &self.all[i])
    }

    /// Simple histograms.
    pub fn simple(&self) -> impl Iterator<Item = &HistogramSpec> {
        self.simple.iter().map(|&i| &self.all[i])
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Everything a configuration file declares.
#[derive(Debug, Clone)]
pub struct Config {
    pub options: Options,
    path: PathBuf,
    trees: BTreeMap<String, TreeHistograms>,
    per_entry_sets: Vec<HistogramSetSpec>,
    simple_sets: Vec<HistogramSetSpec>,
    branches: BTreeMap<String, BTreeSet<String>>,
    particle_sets_per_entry: BTreeSet<String>,
    particle_sets_simple: BTreeSet<String>,
    names: HashSet<String>,
    spectra_counters: HashMap<String, usize>,
}

impl Config {
    /// Empty configuration read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            options: Options::default(),
            path: path.into(),
            trees: TREE_NAMES.iter().map(|t| (t.to_string(), TreeHistograms::default())).collect(),
            per_entry_sets: Vec::new(),
            simple_sets: Vec::new(),
            branches: BTreeMap::new(),
            particle_sets_per_entry: BTreeSet::new(),
            particle_sets_simple: BTreeSet::new(),
            names: HashSet::new(),
            spectra_counters: HashMap::new(),
        }
    }

    /// Parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read configuration file '{}': {e}", path.display()))
        })?;
        crate::parser::parse_str(&text, path)
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative edge-file paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Histograms of one tree.
    pub fn histograms(&self, tree: &str) -> Option<&TreeHistograms> {
        self.trees.get(tree)
    }

    /// Every tree with its histograms, in name order.
    pub fn trees(&self) -> impl Iterator<Item = (&str, &TreeHistograms)> {
        self.trees.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn per_entry_sets(&self) -> &[HistogramSetSpec] {
        &self.per_entry_sets
    }

    pub fn simple_sets(&self) -> &[HistogramSetSpec] {
        &self.simple_sets
    }

    /// Branches that must be loaded for `tree`.
    pub fn branches(&self, tree: &str) -> Option<&BTreeSet<String>> {
        self.branches.get(tree)
    }

    /// Branches registered by per-entry particle-set declarations.
    pub fn particle_sets_per_entry(&self) -> &BTreeSet<String> {
        &self.particle_sets_per_entry
    }

    /// Branches registered by simple particle-set declarations.
    pub fn particle_sets_simple(&self) -> &BTreeSet<String> {
        &self.particle_sets_simple
    }

    /// Number of histogram declarations across all trees.
    pub fn n_histograms(&self) -> usize {
        self.trees.values().map(|t| t.all.len()).sum()
    }

    pub(crate) fn register_name(&mut self, name: &str) -> Result<()> {
        if !self.names.insert(name.to_string()) {
            return Err(Error::Config(format!("Duplicate histogram name: {name}")));
        }
        Ok(())
    }

    pub(crate) fn activate_branch(&mut self, tree: &str, branch: &str) {
        self.branches.entry(tree.to_string()).or_default().insert(branch.to_string());
    }

    pub(crate) fn add_histogram(&mut self, spec: HistogramSpec) -> Result<()> {
        self.register_name(spec.name())?;
        let tree = spec.tree().to_string();
        if spec.per_entry() {
            self.options.enable_per_entry(&tree);
        }
        self.trees.entry(tree).or_default().push(spec);
        Ok(())
    }

    pub(crate) fn add_set(&mut self, set: HistogramSetSpec) -> Result<()> {
        for spec in set.materialized().values() {
            self.register_name(spec.name())?;
        }
        let tree = set.base.tree().to_string();
        self.activate_branch(&tree, &set.branch);
        if set.per_entry() {
            self.options.enable_per_entry(&tree);
            self.per_entry_sets.push(set);
        } else {
            self.simple_sets.push(set);
        }
        Ok(())
    }

    pub(crate) fn add_particle_set(&mut self, branch: &str, per_entry: bool) {
        if per_entry {
            self.particle_sets_per_entry.insert(branch.to_string());
        } else {
            self.particle_sets_simple.insert(branch.to_string());
        }
        self.activate_branch(EVENT_TREE, branch);
    }

    /// Next suffix for a spectra declaration on `branch`.
    pub(crate) fn next_spectra_index(&mut self, branch: &str) -> usize {
        let counter = self.spectra_counters.entry(branch.to_string()).or_insert(0);
        let n = *counter;
        *counter += 1;
        n
    }

    /// Enforce the option-driven invariants once every line is read.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if self.options.calculate_optical_functions {
            self.options.process_samplers = true;
            self.options.per_entry_event = true;
        }
        if self.options.merge_histograms {
            self.activate_branch(EVENT_TREE, STORED_HISTOGRAMS_BRANCH);
            self.activate_branch(RUN_TREE, STORED_HISTOGRAMS_BRANCH);
            self.options.per_entry_event = true;
        }
        self.options.validate()
    }
}
