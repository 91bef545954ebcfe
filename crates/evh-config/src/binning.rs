//! Binning model: linear/log edge generation, edge files and the per-axis
//! binning descriptor.

use std::path::Path;

use evh_core::{Axis, Error, Result};
use serde::Serialize;

/// `n` (or `n + 1` with `include_last`) evenly spaced points starting at `low`
/// with step `(high - low) / n`.
pub fn lin_space(low: f64, high: f64, n: usize, include_last: bool) -> Vec<f64> {
    if n == 0 {
        return if include_last { vec![low] } else { Vec::new() };
    }
    let step = (high - low) / n as f64;
    let count = if include_last { n + 1 } else { n };
    (0..count).map(|i| if i == n { high } else { low + i as f64 * step }).collect()
}

/// Points geometrically spaced between `base^low` and `base^high`.
///
/// Fails with [`Error::Range`] if an exponent lies outside what `f64` can
/// represent for this base.
pub fn log_space(low: f64, high: f64, n: usize, base: f64, include_last: bool) -> Result<Vec<f64>> {
    if !(base > 0.0) || base == 1.0 {
        return Err(Error::Range(format!("invalid logarithm base {base}")));
    }
    let max_exp = f64::MAX.log(base);
    let min_exp = f64::MIN_POSITIVE.log(base);
    let (lo_lim, hi_lim) = if max_exp > min_exp { (min_exp, max_exp) } else { (max_exp, min_exp) };
    for (what, v) in [("low", low), ("high", high)] {
        if !v.is_finite() || v < lo_lim || v > hi_lim {
            return Err(Error::Range(format!(
                "log binning {what} exponent {v} outside representable range [{lo_lim:.1}, {hi_lim:.1}]"
            )));
        }
    }
    Ok(lin_space(low, high, n, include_last).into_iter().map(|e| base.powf(e)).collect())
}

/// Read bin edges from a text file with one value per non-blank line.
pub fn load_edges_from_file(path: impl AsRef<Path>) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Parse(format!("cannot read bin edges file '{}': {e}", path.display()))
    })?;

    let mut edges = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let Some(first) = fields.next() else {
            continue;
        };
        if let Some(extra) = fields.next() {
            return Err(Error::Parse(format!(
                "bin edges file '{}' line {}: unexpected token '{extra}'",
                path.display(),
                i + 1
            )));
        }
        let value: f64 = first.parse().map_err(|_| {
            Error::Parse(format!(
                "bin edges file '{}' line {}: '{first}' is not a number",
                path.display(),
                i + 1
            ))
        })?;
        edges.push(value);
    }

    if edges.len() < 2 {
        return Err(Error::Parse(format!(
            "bin edges file '{}' has {} edge(s); at least 2 are required",
            path.display(),
            edges.len()
        )));
    }
    Ok(edges)
}

/// Binning of one histogram axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSpecification {
    /// Lower edge of the first bin.
    pub low: f64,
    /// Upper edge of the last bin.
    pub high: f64,
    /// Number of bins.
    pub n: usize,
    /// Explicit edges (length `n + 1`), for log and edge-file binnings.
    pub edges: Option<Vec<f64>>,
    /// Declared log10 exponents `(low, high)` when the edges were generated
    /// with [`log_space`].
    pub log_exponents: Option<(f64, f64)>,
    /// File the edges were read from.
    pub edges_source_file: Option<String>,
}

impl BinSpecification {
    /// `n` equal-width bins over `[low, high)`.
    pub fn uniform(low: f64, high: f64, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::Config(format!("number of bins must be >= 1 (range {low}:{high})")));
        }
        if !(high > low) {
            return Err(Error::Config(format!("binning upper bound {high} must exceed lower bound {low}")));
        }
        Ok(Self { low, high, n, edges: None, log_exponents: None, edges_source_file: None })
    }

    /// `n` bins evenly spaced in log10 between `10^low_exp` and `10^high_exp`.
    pub fn log10(low_exp: f64, high_exp: f64, n: usize) -> Result<Self> {
        if n == 0 || !(high_exp > low_exp) {
            return Err(Error::Config(format!(
                "invalid log binning {low_exp}:{high_exp} with {n} bin(s)"
            )));
        }
        let edges = log_space(low_exp, high_exp, n, 10.0, true)?;
        let mut spec = Self::from_edges(edges, None)?;
        spec.log_exponents = Some((low_exp, high_exp));
        Ok(spec)
    }

    /// Explicit edges, optionally remembering the file they came from.
    pub fn from_edges(edges: Vec<f64>, source_file: Option<String>) -> Result<Self> {
        let axis = Axis::new(edges)?;
        let edges = axis.edges;
        Ok(Self {
            low: edges[0],
            high: edges[edges.len() - 1],
            n: edges.len() - 1,
            edges: Some(edges),
            log_exponents: None,
            edges_source_file: source_file,
        })
    }

    /// Whether the edges are log10-spaced.
    pub fn is_log_spaced(&self) -> bool {
        self.log_exponents.is_some()
    }

    /// Edges of every bin, generated for uniform binnings.
    pub fn bin_edges(&self) -> Vec<f64> {
        match &self.edges {
            Some(e) => e.clone(),
            None => lin_space(self.low, self.high, self.n, true),
        }
    }

    /// Histogram axis for this binning.
    pub fn to_axis(&self) -> Result<Axis> {
        match &self.edges {
            Some(e) => Axis::new(e.clone()),
            None => Axis::uniform(self.n, self.low, self.high),
        }
    }

    /// This axis' field in a binning string, e.g. `0:10`, `-3:2` for log10
    /// binning, or the edge file name.
    pub fn binning_field(&self) -> String {
        if let Some(file) = &self.edges_source_file {
            return file.clone();
        }
        if let Some((low_exp, high_exp)) = self.log_exponents {
            return format!("{low_exp}:{high_exp}");
        }
        format!("{}:{}", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use approx::assert_relative_eq;

    use super::*;

    fn write_tmp(name: &str, content: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let p = std::env::temp_dir()
            .join(format!("evh_binning_{}_{}_{}", std::process::id(), nanos, name));
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn lin_space_with_and_without_last_point() {
        assert_eq!(lin_space(0.0, 10.0, 5, true), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(lin_space(0.0, 10.0, 5, false), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn log_space_decades() {
        let v = log_space(0.0, 2.0, 2, 10.0, true).unwrap();
        assert_eq!(v.len(), 3);
        assert_relative_eq!(v[0], 1.0);
        assert_relative_eq!(v[1], 10.0);
        assert_relative_eq!(v[2], 100.0, max_relative = 1e-12);
    }

    #[test]
    fn log_space_rejects_unrepresentable_exponents() {
        assert!(matches!(log_space(0.0, 400.0, 4, 10.0, true), Err(Error::Range(_))));
        assert!(matches!(log_space(-400.0, 0.0, 4, 10.0, true), Err(Error::Range(_))));
        assert!(log_space(-300.0, 300.0, 4, 10.0, true).is_ok());
    }

    #[test]
    fn edges_file_skips_blank_lines() {
        let p = write_tmp("edges.txt", "0\n\n1.5\n  4e1  \n");
        assert_eq!(load_edges_from_file(&p).unwrap(), vec![0.0, 1.5, 40.0]);
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn edges_file_errors_name_the_line() {
        let p = write_tmp("bad_token.txt", "0\n1 2\n");
        let msg = load_edges_from_file(&p).unwrap_err().to_string();
        assert!(msg.contains("line 2"), "{msg}");
        let _ = std::fs::remove_file(p);

        let p = write_tmp("bad_value.txt", "0\nten\n");
        let err = load_edges_from_file(&p).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("line 2"));
        let _ = std::fs::remove_file(p);

        let p = write_tmp("one_edge.txt", "3\n");
        assert!(matches!(load_edges_from_file(&p), Err(Error::Parse(_))));
        let _ = std::fs::remove_file(p);
    }

    #[test]
    fn bin_specification_invariants() {
        let u = BinSpecification::uniform(0.0, 10.0, 10).unwrap();
        assert_eq!(u.bin_edges().len(), 11);
        assert_eq!(u.binning_field(), "0:10");
        assert!(BinSpecification::uniform(1.0, 1.0, 3).is_err());
        assert!(BinSpecification::uniform(0.0, 1.0, 0).is_err());

        let l = BinSpecification::log10(-3.0, 3.0, 6).unwrap();
        assert_eq!(l.n, 6);
        assert_relative_eq!(l.low, 1e-3);
        assert_relative_eq!(l.high, 1e3, max_relative = 1e-12);
        assert!(l.is_log_spaced());
        assert_eq!(l.binning_field(), "-3:3");

        let odd = BinSpecification::log10(0.1, 2.7, 10).unwrap();
        assert_eq!(odd.binning_field(), "0.1:2.7");

        let e = BinSpecification::from_edges(vec![0.0, 1.0, 5.0], Some("edges.txt".into())).unwrap();
        assert_eq!((e.n, e.low, e.high), (2, 0.0, 5.0));
        assert_eq!(e.binning_field(), "edges.txt");
        assert!(matches!(
            BinSpecification::from_edges(vec![0.0, 2.0, 1.0], None),
            Err(Error::Range(_))
        ));
    }
}
