//! A histogram accumulated one record at a time.

use std::borrow::Cow;

use evh_config::HistogramSpec;
use evh_core::{Error, EventSource, Histogram, Result};

use crate::accumulator::Accumulator;

/// Binds a per-entry [`HistogramSpec`] to an [`Accumulator`].
///
/// Each [`ingest`](PerEntryHistogram::ingest) fills a scratch histogram from
/// the current record only and adds it as one sample.
#[derive(Debug)]
pub struct PerEntryHistogram<'c> {
    spec: Cow<'c, HistogramSpec>,
    accumulator: Accumulator,
    scratch: Option<Histogram>,
}

impl<'c> PerEntryHistogram<'c> {
    /// Runtime for a specification owned by the configuration.
    pub fn new(spec: &'c HistogramSpec) -> Result<Self> {
        Self::with_spec(Cow::Borrowed(spec))
    }

    /// Runtime owning its specification (species discovered at run time).
    pub fn from_owned(spec: HistogramSpec) -> Result<Self> {
        Self::with_spec(Cow::Owned(spec))
    }

    fn with_spec(spec: Cow<'c, HistogramSpec>) -> Result<Self> {
        let scratch = spec.create_histogram()?;
        let accumulator = Accumulator::new(&scratch);
        Ok(Self { spec, accumulator, scratch: Some(scratch) })
    }

    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Records accumulated so far.
    pub fn count(&self) -> u64 {
        self.accumulator.count()
    }

    /// Sum of the per-record mean over content bins.
    pub fn integral(&self) -> f64 {
        self.accumulator.integral()
    }

    /// Account for `k` earlier records that contributed nothing.
    pub fn add_empty_entries(&mut self, k: u64) -> Result<()> {
        self.accumulator.add_empty_entries(k)
    }

    /// Accumulate the record currently loaded in `source`.
    pub fn ingest(&mut self, source: &dyn EventSource) -> Result<()> {
        let scratch = self.scratch.as_mut().ok_or_else(|| {
            Error::Runtime(format!("histogram '{}' is already terminated", self.spec.name()))
        })?;
        let record = source.current_record().ok_or_else(|| {
            Error::Runtime(format!("tree '{}': no record loaded", source.name()))
        })?;
        scratch.reset();
        source.query_fill(scratch, self.spec.variable(), self.spec.selection(), record..record + 1)?;
        self.accumulator.accumulate(scratch)
    }

    /// Finalize the accumulator and drop the scratch buffer.
    pub fn terminate(&mut self) -> &Histogram {
        self.scratch = None;
        self.accumulator.finalize()
    }

    /// Terminate and hand over the result.
    pub fn into_result(self) -> Histogram {
        self.accumulator.into_result()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use evh_config::{BinSpecification, HistogramHeader};
    use evh_root::MemoryTree;

    use super::*;

    fn spec() -> HistogramSpec {
        let header = HistogramHeader {
            tree: "Event.".into(),
            name: "energy".into(),
            variable: "Primary.energy".into(),
            selection: "1".into(),
            per_entry: true,
        };
        HistogramSpec::from_axes(header, vec![BinSpecification::uniform(0.0, 4.0, 4).unwrap()])
            .unwrap()
    }

    #[test]
    fn ingest_accumulates_one_record_at_a_time() {
        let mut tree = MemoryTree::new("Event.", 2).with_jagged(
            "Primary.energy",
            vec![vec![0.5, 0.5, 2.5], vec![0.5]],
        );
        let spec = spec();
        let mut h = PerEntryHistogram::new(&spec).unwrap();
        for i in 0..2 {
            tree.load_record(i).unwrap();
            h.ingest(&tree).unwrap();
        }
        assert_eq!(h.count(), 2);
        let r = h.terminate().clone();
        // bin [0,1): 2 then 1; bin [2,3): 1 then 0
        assert_relative_eq!(r.bin_content(1), 1.5);
        assert_relative_eq!(r.bin_error(1), 0.5);
        assert_relative_eq!(r.bin_content(3), 0.5);
        assert_eq!(r.entries, 2.0);
        assert!(h.ingest(&tree).is_err());
    }

    #[test]
    fn ingest_needs_a_loaded_record() {
        let tree = MemoryTree::new("Event.", 1).with_jagged("Primary.energy", vec![vec![1.0]]);
        let mut h = PerEntryHistogram::from_owned(spec()).unwrap();
        assert!(matches!(h.ingest(&tree), Err(Error::Runtime(_))));
    }
}
