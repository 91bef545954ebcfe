//! Species-indexed histogram set declarations.

use std::collections::{BTreeMap, BTreeSet};

use crate::selection::add_species_filter;
use crate::spec::HistogramSpec;
use crate::species::{ExpansionPolicy, SpeciesKey, SpeciesSpecifier};

/// A base 1D histogram replicated once per species of one branch.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSetSpec {
    /// Branch holding the particles, e.g. `"Sampler1"`.
    pub branch: String,
    /// Template histogram; its name is the set's base name.
    pub base: HistogramSpec,
    /// Explicit species; empty when species are discovered at run time.
    pub explicit_species: BTreeSet<SpeciesKey>,
    pub policy: ExpansionPolicy,
    pub top_n: usize,
    materialized: BTreeMap<SpeciesKey, HistogramSpec>,
}

impl HistogramSetSpec {
    /// Build the set, materializing one histogram per explicit species.
    pub fn new(branch: impl Into<String>, base: HistogramSpec, species: SpeciesSpecifier) -> Self {
        let mut set = Self {
            branch: branch.into(),
            base,
            explicit_species: species.explicit,
            policy: species.policy,
            top_n: species.top_n,
            materialized: BTreeMap::new(),
        };
        set.materialized =
            set.explicit_species.iter().map(|key| (*key, set.species_spec(key))).collect();
        set
    }

    /// Output name of the member histogram for `key`.
    pub fn histogram_name(base_name: &str, key: &SpeciesKey) -> String {
        format!("Spectra_{base_name}_{key}")
    }

    /// Base name, e.g. `Sampler1_0`.
    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn per_entry(&self) -> bool {
        self.base.per_entry()
    }

    /// Whether species are discovered while reading data.
    pub fn is_dynamic(&self) -> bool {
        self.explicit_species.is_empty()
    }

    /// Member specifications for the explicit species.
    pub fn materialized(&self) -> &BTreeMap<SpeciesKey, HistogramSpec> {
        &self.materialized
    }

    /// Member specification for `key`: the base renamed and restricted to that
    /// species.
    pub fn species_spec(&self, key: &SpeciesKey) -> HistogramSpec {
        self.base.specialize(
            Self::histogram_name(self.name(), key),
            add_species_filter(key, self.base.selection(), &self.branch),
        )
    }
}
