//! Merging histograms that were accumulated elsewhere: stored per-record
//! histograms, and finalized results of several input files.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use evh_core::{Error, EventSource, Histogram, HistogramSink, Result};
use evh_root::ResultDocument;

use crate::accumulator::Accumulator;
use crate::analysis::{SIMPLE_GROUP, SIMPLE_SET_GROUP};

/// Unweighted merge of already finalized results: each one counts as a single
/// sample, however many records it was built from.
pub fn merge_results<'a, I>(results: I) -> Result<Histogram>
where
    I: IntoIterator<Item = &'a Histogram>,
{
    let mut it = results.into_iter();
    let first = it
        .next()
        .ok_or_else(|| Error::Runtime("no histograms to merge".to_string()))?;
    let mut acc = Accumulator::new(first);
    acc.accumulate(first)?;
    for h in it {
        acc.accumulate(h)?;
    }
    Ok(acc.into_result())
}

/// Sum of one-pass fills: contents, squared weights and entries add up.
pub fn sum_results<'a, I>(results: I) -> Result<Histogram>
where
    I: IntoIterator<Item = &'a Histogram>,
{
    let mut it = results.into_iter();
    let first = it
        .next()
        .ok_or_else(|| Error::Runtime("no histograms to sum".to_string()))?;
    let mut total = first.clone();
    for h in it {
        if !h.same_binning(&total) {
            return Err(Error::Runtime(format!(
                "histogram '{}' does not match the binning of '{}'",
                h.name, total.name
            )));
        }
        for (c, v) in total.content.iter_mut().zip(&h.content) {
            *c += v;
        }
        for (w, v) in total.sumw2.iter_mut().zip(&h.sumw2) {
            *w += v;
        }
        total.entries += h.entries;
    }
    Ok(total)
}

/// Whether `group` holds one-pass fills rather than per-entry means.
fn is_simple_group(group: &str) -> bool {
    matches!(group.rsplit('/').next(), Some(SIMPLE_GROUP | SIMPLE_SET_GROUP))
}

/// Combine result documents group by group and name by name.
///
/// Simple groups are summed. Per-entry and merged groups hold finalized
/// means and go through the unweighted [`merge_results`]. A histogram missing
/// from some documents is combined over the documents that have it.
pub fn combine_documents(documents: &[ResultDocument]) -> Result<ResultDocument> {
    let mut by_name: BTreeMap<(&str, &str), Vec<&Histogram>> = BTreeMap::new();
    for doc in documents {
        for (group, hists) in &doc.groups {
            for (name, h) in hists {
                by_name.entry((group.as_str(), name.as_str())).or_default().push(h);
            }
        }
    }

    let mut combined = ResultDocument::default();
    for ((group, name), hists) in by_name {
        if hists.len() < documents.len() {
            tracing::warn!(
                group,
                name,
                found = hists.len(),
                documents = documents.len(),
                "histogram missing from some inputs"
            );
        }
        let result = if is_simple_group(group) {
            sum_results(hists.iter().copied())
        } else {
            merge_results(hists.iter().copied())
        };
        let merged = result
            .map_err(|e| Error::Runtime(format!("merging '{group}/{name}': {e}")))?;
        combined.persist(group, merged)?;
    }
    tracing::info!(inputs = documents.len(), histograms = combined.len(), "results combined");
    Ok(combined)
}

/// Per-name accumulation of the histograms stored in a branch of every
/// record (the `Histos` branch of `Event.` and `Run.`).
///
/// A name absent from a record counts as an all-zero sample for that record.
#[derive(Debug)]
pub struct StoredHistogramMerger {
    branch: String,
    accumulators: BTreeMap<String, Accumulator>,
    records: u64,
}

impl StoredHistogramMerger {
    pub fn new(branch: impl Into<String>) -> Self {
        Self { branch: branch.into(), accumulators: BTreeMap::new(), records: 0 }
    }

    /// Records ingested so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Accumulate the stored histograms of the current record. Histograms
    /// sharing a name within one record are summed into a single sample.
    pub fn ingest(&mut self, source: &dyn EventSource) -> Result<()> {
        let stored = source.stored_histograms_at_current_record(&self.branch)?;
        let mut by_name: BTreeMap<&str, Histogram> = BTreeMap::new();
        for h in &stored {
            match by_name.entry(h.name.as_str()) {
                Entry::Vacant(e) => {
                    e.insert(h.clone());
                }
                Entry::Occupied(mut e) => {
                    tracing::debug!(branch = %self.branch, name = %h.name, "summing repeated stored histogram");
                    let total = sum_results([e.get(), h])?;
                    e.insert(total);
                }
            }
        }

        for (name, h) in &by_name {
            let acc = match self.accumulators.entry((*name).to_string()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    let mut acc = Accumulator::new(h);
                    acc.add_empty_entries(self.records)?;
                    e.insert(acc)
                }
            };
            acc.accumulate(h)?;
        }
        for (name, acc) in self.accumulators.iter_mut() {
            if !by_name.contains_key(name.as_str()) {
                acc.add_empty_entries(1)?;
            }
        }
        self.records += 1;
        Ok(())
    }

    /// Finalize and persist every merged histogram under `group`.
    pub fn write(self, sink: &mut dyn HistogramSink, group: &str) -> Result<usize> {
        let n = self.accumulators.len();
        for acc in self.accumulators.into_values() {
            sink.persist(group, acc.into_result())?;
        }
        tracing::debug!(branch = %self.branch, group, histograms = n, records = self.records, "stored histograms merged");
        Ok(n)
    }
}
