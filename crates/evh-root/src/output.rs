//! JSON result documents: the histogram sink used by the analysis and the
//! reader used when combining several results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use evh_core::{Histogram, HistogramSink};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Finished histograms keyed by group path (e.g. `"Event/PerEntryHistograms"`)
/// and then by histogram name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Groups of histograms.
    pub groups: BTreeMap<String, BTreeMap<String, Histogram>>,
}

impl ResultDocument {
    /// Read a result document.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write this document as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), histograms = self.len(), "results written");
        Ok(())
    }

    /// Look up one histogram.
    pub fn histogram(&self, group: &str, name: &str) -> Option<&Histogram> {
        self.groups.get(group)?.get(name)
    }

    /// Total number of histograms.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Whether the document holds no histogram.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistogramSink for ResultDocument {
    fn persist(&mut self, group: &str, histogram: Histogram) -> evh_core::Result<()> {
        let slot = self.groups.entry(group.to_string()).or_default();
        if slot.contains_key(&histogram.name) {
            return Err(evh_core::Error::Runtime(format!(
                "histogram '{}' written twice to group '{group}'",
                histogram.name
            )));
        }
        slot.insert(histogram.name.clone(), histogram);
        Ok(())
    }
}

/// Sink collecting histograms in memory and writing them to one JSON file.
#[derive(Debug)]
pub struct JsonSink {
    path: PathBuf,
    document: ResultDocument,
}

impl JsonSink {
    /// Create a sink that will write to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), document: ResultDocument::default() }
    }

    /// Histograms collected so far.
    pub fn document(&self) -> &ResultDocument {
        &self.document
    }

    /// Write the file and hand back the collected document.
    pub fn finish(self) -> Result<ResultDocument> {
        self.document.save(&self.path)?;
        Ok(self.document)
    }
}

impl HistogramSink for JsonSink {
    fn persist(&mut self, group: &str, histogram: Histogram) -> evh_core::Result<()> {
        tracing::debug!(group, name = %histogram.name, "persisting histogram");
        self.document.persist(group, histogram)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use evh_core::Axis;

    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("evh_output_{}_{}_{}", std::process::id(), nanos, name))
    }

    #[test]
    fn sink_round_trips_through_file() {
        let path = tmp_path("doc.json");
        let mut h = Histogram::new("h1", "", vec![Axis::uniform(2, 0.0, 2.0).unwrap()]).unwrap();
        h.fill(&[0.5], 1.0).unwrap();

        let mut sink = JsonSink::new(&path);
        sink.persist("Event/SimpleHistograms", h.clone()).unwrap();
        let written = sink.finish().unwrap();

        let read = ResultDocument::open(&path).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.histogram("Event/SimpleHistograms", "h1"), Some(&h));
        assert_eq!(read.len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn duplicate_names_in_a_group_are_rejected() {
        let h = Histogram::new("h1", "", vec![Axis::uniform(1, 0.0, 1.0).unwrap()]).unwrap();
        let mut doc = ResultDocument::default();
        doc.persist("g", h.clone()).unwrap();
        doc.persist("other", h.clone()).unwrap();
        assert!(doc.persist("g", h).is_err());
    }
}
