//! Species-indexed sets of per-entry histograms.

use std::collections::{BTreeMap, BTreeSet};

use evh_config::{ExpansionPolicy, HistogramSetSpec, SpeciesKey, is_ion};
use evh_core::{Error, EventSource, HistogramSink, Result};

use crate::per_entry::PerEntryHistogram;

/// Which discovered ids a ranking or write considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesSubset {
    All,
    Ions,
    NonIons,
}

/// Runtime of one [`HistogramSetSpec`].
///
/// Sets with explicit species hold one member per listed key from the start.
/// Dynamic sets grow a member for every new species id accepted by their
/// policy; a member created at the k-th record is pre-advanced by the k-1
/// records it missed.
#[derive(Debug)]
pub struct PerEntryHistogramSet<'c> {
    spec: &'c HistogramSetSpec,
    members: BTreeMap<SpeciesKey, PerEntryHistogram<'c>>,
    ids: BTreeSet<i64>,
    ion_ids: BTreeSet<i64>,
    non_ion_ids: BTreeSet<i64>,
    records: u64,
}

impl<'c> PerEntryHistogramSet<'c> {
    pub fn new(spec: &'c HistogramSetSpec) -> Result<Self> {
        let mut set = Self {
            spec,
            members: BTreeMap::new(),
            ids: BTreeSet::new(),
            ion_ids: BTreeSet::new(),
            non_ion_ids: BTreeSet::new(),
            records: 0,
        };
        for (key, member) in spec.materialized() {
            set.members.insert(*key, PerEntryHistogram::new(member)?);
            set.note_id(key.id);
        }
        Ok(set)
    }

    pub fn spec(&self) -> &HistogramSetSpec {
        self.spec
    }

    /// Members keyed by species.
    pub fn members(&self) -> &BTreeMap<SpeciesKey, PerEntryHistogram<'c>> {
        &self.members
    }

    /// Member for a bare species id (role "any").
    pub fn member_by_id(&self, id: i64) -> Option<&PerEntryHistogram<'c>> {
        self.members.get(&SpeciesKey::any(id))
    }

    /// Known species ids in `subset`.
    pub fn ids(&self, subset: SpeciesSubset) -> &BTreeSet<i64> {
        match subset {
            SpeciesSubset::All => &self.ids,
            SpeciesSubset::Ions => &self.ion_ids,
            SpeciesSubset::NonIons => &self.non_ion_ids,
        }
    }

    fn note_id(&mut self, id: i64) {
        if id == 0 {
            return;
        }
        self.ids.insert(id);
        if is_ion(id) {
            self.ion_ids.insert(id);
        } else {
            self.non_ion_ids.insert(id);
        }
    }

    /// Accumulate the current record of `source` into every member, first
    /// creating members for newly seen species of a dynamic set.
    pub fn ingest(&mut self, source: &dyn EventSource) -> Result<()> {
        if self.spec.is_dynamic() {
            self.discover(source)?;
        }
        for member in self.members.values_mut() {
            member.ingest(source)?;
        }
        self.records += 1;
        Ok(())
    }

    fn discover(&mut self, source: &dyn EventSource) -> Result<()> {
        let spec = self.spec;
        let seen: BTreeSet<i64> = source
            .species_ids_at_current_record(&spec.branch)
            .map_err(|e| {
                Error::Runtime(format!(
                    "histogram set '{}': species of branch '{}' unavailable: {e}",
                    spec.name(),
                    spec.branch
                ))
            })?
            .into_iter()
            .collect();

        let new_ids: Vec<i64> =
            seen.difference(&self.ids).copied().filter(|&id| spec.policy.accepts(id)).collect();
        for id in new_ids {
            let key = SpeciesKey::any(id);
            let mut member = PerEntryHistogram::from_owned(spec.species_spec(&key))?;
            member.add_empty_entries(self.records)?;
            tracing::debug!(set = spec.name(), id, skipped = self.records, "new species");
            self.members.insert(key, member);
            self.note_id(id);
        }
        Ok(())
    }

    /// At most `n` ids of `subset`, by descending integral then ascending id.
    pub fn top_n(&self, n: usize, subset: SpeciesSubset) -> Vec<i64> {
        let mut ranked: Vec<(i64, f64)> = self
            .ids(subset)
            .iter()
            .filter_map(|&id| self.member_by_id(id).map(|m| (id, m.integral())))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().take(n).map(|(id, _)| id).collect()
    }

    /// Members the set's policy writes out.
    pub fn selected(&self) -> Vec<SpeciesKey> {
        if !self.spec.is_dynamic() {
            return self.members.keys().copied().collect();
        }
        let n = self.spec.top_n;
        let ids: Vec<i64> = match self.spec.policy {
            ExpansionPolicy::All => self.ids.iter().copied().collect(),
            ExpansionPolicy::ParticlesOnly => self.non_ion_ids.iter().copied().collect(),
            ExpansionPolicy::IonsOnly => self.ion_ids.iter().copied().collect(),
            ExpansionPolicy::TopN => self.top_n(n, SpeciesSubset::All),
            ExpansionPolicy::TopNParticles => self.top_n(n, SpeciesSubset::NonIons),
            ExpansionPolicy::TopNIons => self.top_n(n, SpeciesSubset::Ions),
        };
        ids.into_iter().map(SpeciesKey::any).collect()
    }

    /// Finalize every member.
    pub fn terminate(&mut self) {
        for member in self.members.values_mut() {
            member.terminate();
        }
    }

    /// Terminate and persist the selected members under `group`. Returns the
    /// number of histograms written.
    pub fn write(mut self, sink: &mut dyn HistogramSink, group: &str) -> Result<usize> {
        self.terminate();
        let selected = self.selected();
        let mut written = 0;
        for key in selected {
            if let Some(member) = self.members.remove(&key) {
                sink.persist(group, member.into_result())?;
                written += 1;
            }
        }
        tracing::debug!(set = self.spec.name(), written, known = self.ids.len(), "histogram set written");
        Ok(written)
    }
}
