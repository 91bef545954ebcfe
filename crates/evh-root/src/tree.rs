//! In-memory columnar tree implementing [`EventSource`].

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::rc::Rc;

use evh_core::{EventSource, Histogram};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RootError};
use crate::expr::CompiledExpr;
use crate::filler::{Column, fill_range};

/// Leaf holding the species id of every particle of a sampler-like branch.
pub const SPECIES_ID_LEAF: &str = "speciesId";

/// A record stream held in memory.
///
/// Scalar columns carry one value per record, jagged columns one array per
/// record (e.g. per-particle sampler data) and histogram branches one list of
/// stored histograms per record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTree {
    #[serde(skip)]
    name: String,
    /// Number of records.
    pub entries: u64,
    /// Scalar columns keyed by branch name.
    #[serde(default)]
    pub scalars: BTreeMap<String, Vec<f64>>,
    /// Jagged columns keyed by branch name.
    #[serde(default)]
    pub jagged: BTreeMap<String, Vec<Vec<f64>>>,
    /// Per-record stored histograms keyed by branch name.
    #[serde(default)]
    pub histograms: BTreeMap<String, Vec<Vec<Histogram>>>,
    #[serde(skip)]
    current: Option<u64>,
    #[serde(skip)]
    compiled: RefCell<HashMap<String, Rc<CompiledExpr>>>,
}

impl MemoryTree {
    /// Create an empty tree with `entries` records.
    pub fn new(name: impl Into<String>, entries: u64) -> Self {
        Self { name: name.into(), entries, ..Default::default() }
    }

    /// Add a scalar column.
    pub fn with_scalar(mut self, branch: impl Into<String>, values: Vec<f64>) -> Self {
        self.scalars.insert(branch.into(), values);
        self
    }

    /// Add a jagged column.
    pub fn with_jagged(mut self, branch: impl Into<String>, values: Vec<Vec<f64>>) -> Self {
        self.jagged.insert(branch.into(), values);
        self
    }

    /// Add a branch of per-record stored histograms.
    pub fn with_histograms(mut self, branch: impl Into<String>, values: Vec<Vec<Histogram>>) -> Self {
        self.histograms.insert(branch.into(), values);
        self
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Check every column has exactly `entries` records.
    pub fn validate(&self) -> Result<()> {
        let n = self.entries as usize;
        let lens = self
            .scalars
            .iter()
            .map(|(k, v)| (k, v.len()))
            .chain(self.jagged.iter().map(|(k, v)| (k, v.len())))
            .chain(self.histograms.iter().map(|(k, v)| (k, v.len())));
        for (branch, len) in lens {
            if len != n {
                return Err(RootError::Deserialization(format!(
                    "tree '{}': branch '{branch}' has {len} records, expected {n}",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn column(&self, branch: &str) -> Option<Column<'_>> {
        if let Some(v) = self.scalars.get(branch) {
            return Some(Column::Scalar(v));
        }
        self.jagged.get(branch).map(|v| Column::Jagged(v.as_slice()))
    }

    fn compile(&self, expr: &str) -> Result<Rc<CompiledExpr>> {
        if let Some(c) = self.compiled.borrow().get(expr) {
            return Ok(Rc::clone(c));
        }
        let c = Rc::new(CompiledExpr::compile(expr)?);
        self.compiled.borrow_mut().insert(expr.to_string(), Rc::clone(&c));
        Ok(c)
    }

    fn current(&self) -> Result<usize> {
        self.current.map(|i| i as usize).ok_or_else(|| {
            RootError::HistogramFill(format!("tree '{}': no record loaded", self.name))
        })
    }

    fn fill(
        &self,
        hist: &mut Histogram,
        variable: &str,
        selection: &str,
        range: Range<u64>,
    ) -> Result<u64> {
        // "y:x" and "z:y:x" list axes last-to-first
        let axes = variable
            .split(':')
            .rev()
            .map(|part| self.compile(part.trim()))
            .collect::<Result<Vec<_>>>()?;
        let axes: Vec<&CompiledExpr> = axes.iter().map(|e| e.as_ref()).collect();

        let selection = selection.trim();
        let sel = if selection.is_empty() { None } else { Some(self.compile(selection)?) };

        let range = range.start.min(self.entries)..range.end.min(self.entries);
        fill_range(hist, &axes, sel.as_deref(), |b| self.column(b), range)
    }
}

impl EventSource for MemoryTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_count(&self) -> u64 {
        self.entries
    }

    fn load_record(&mut self, index: u64) -> evh_core::Result<()> {
        if index >= self.entries {
            return Err(evh_core::Error::Runtime(format!(
                "tree '{}': record {index} out of range (entries={})",
                self.name, self.entries
            )));
        }
        self.current = Some(index);
        Ok(())
    }

    fn current_record(&self) -> Option<u64> {
        self.current
    }

    fn has_branch(&self, branch: &str) -> bool {
        let prefix = format!("{branch}.");
        self.histograms.contains_key(branch)
            || self
                .scalars
                .keys()
                .chain(self.jagged.keys())
                .any(|k| k == branch || k.starts_with(&prefix))
    }

    fn query_fill(
        &self,
        hist: &mut Histogram,
        variable: &str,
        selection: &str,
        range: Range<u64>,
    ) -> evh_core::Result<u64> {
        Ok(self.fill(hist, variable, selection, range)?)
    }

    fn species_ids_at_current_record(&self, branch: &str) -> evh_core::Result<Vec<i64>> {
        let entry = self.current()?;
        let leaf = format!("{branch}.{SPECIES_ID_LEAF}");
        let ids = match self.column(&leaf) {
            Some(Column::Jagged(v)) => v[entry].iter().map(|&id| id as i64).collect(),
            Some(Column::Scalar(v)) => vec![v[entry] as i64],
            None => return Err(RootError::BranchNotFound(leaf).into()),
        };
        Ok(ids)
    }

    fn stored_histograms_at_current_record(
        &self,
        branch: &str,
    ) -> evh_core::Result<Vec<Histogram>> {
        let entry = self.current()?;
        let per_record = self
            .histograms
            .get(branch)
            .ok_or_else(|| RootError::BranchNotFound(branch.to_string()))?;
        Ok(per_record[entry].clone())
    }
}
