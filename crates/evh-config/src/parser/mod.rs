//! Line-oriented configuration parser.
//!
//! Every non-blank line that does not start with `#` is classified, in this
//! order, as:
//!
//! 1. a particle-set declaration: `(Simple)?ParticleSet <branch>`
//! 2. an option: `<Key> <value>` where `Key` is one of [`OPTION_KEYS`]
//! 3. a histogram declaration:
//!    `(Simple)?Histogram{1..4}D[Lin|Log]* <tree> <name> {bins} {binning} <variable> <selection>`
//! 4. a spectra declaration:
//!    `(Simple)?Spectra[TE|Rigidity|Momentum][Log] <branch> {bins} {binning} <species> <selection>`
//!
//! Anything else is ignored. An error on any line aborts the parse and names
//! the line and file.
//!
//! [`OPTION_KEYS`]: crate::options::OPTION_KEYS

use std::path::Path;
use std::sync::LazyLock;

use evh_core::{Error, Result};
use regex::Regex;

use crate::binning::{BinSpecification, load_edges_from_file};
use crate::config::{Config, EVENT_TREE, TREE_NAMES};
use crate::options::is_option_key;
use crate::set_spec::HistogramSetSpec;
use crate::spec::{HistogramHeader, HistogramSpec};
use crate::species::parse_species_specifier;

#[cfg(test)]
mod tests;

const HISTOGRAM_TOKENS: usize = 7;
const SPECTRA_TOKENS: usize = 6;

static PARTICLE_SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(simple)?particleset$").expect("valid regex"));
static HISTOGRAM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(simple)?histogram[1-4]d").expect("valid regex"));
static HISTOGRAM_KIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(simple)?histogram([1-4])d((?:lin|log)*)$").expect("valid regex")
});
static AXIS_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)lin|log").expect("valid regex"));
static SPECTRA_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(simple)?spectra").expect("valid regex"));
static SPECTRA_KIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(simple)?spectra(te|rigidity|momentum)?(log)?$").expect("valid regex")
});
static BRANCH_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\.[A-Za-z_]\w*").expect("valid regex"));

/// Parse configuration text read from `path`.
pub fn parse_str(text: &str, path: impl AsRef<Path>) -> Result<Config> {
    parse_lines(text.lines(), path)
}

/// Parse configuration lines read from `path`.
pub fn parse_lines<I, S>(lines: I, path: impl AsRef<Path>) -> Result<Config>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let mut parser = LineParser { config: Config::new(path) };

    for (i, line) in lines.into_iter().enumerate() {
        parser.parse_line(line.as_ref()).map_err(|e| e.at_line(path, i + 1))?;
    }

    let mut config = parser.config;
    config.finish()?;

    tracing::info!(
        path = %path.display(),
        histograms = config.n_histograms(),
        per_entry_sets = config.per_entry_sets().len(),
        simple_sets = config.simple_sets().len(),
        "configuration loaded"
    );
    for (tree, hists) in config.trees().filter(|(_, h)| !h.is_empty()) {
        tracing::debug!(
            tree,
            per_entry = hists.per_entry().count(),
            simple = hists.simple().count(),
            "histograms declared"
        );
    }
    Ok(config)
}

struct LineParser {
    config: Config,
}

impl LineParser {
    fn parse_line(&mut self, line: &str) -> Result<()> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        if tokens.len() == 2 && PARTICLE_SET.is_match(tokens[0]) {
            let per_entry = !tokens[0].to_ascii_lowercase().contains("simple");
            self.config.add_particle_set(tokens[1], per_entry);
            return Ok(());
        }
        if tokens.len() == 2 && is_option_key(tokens[0]) {
            return self.config.options.set(tokens[0], tokens[1]);
        }
        if HISTOGRAM_PREFIX.is_match(tokens[0]) {
            // `<prefix> MergeHistograms <value>` is an option line
            if tokens.len() != HISTOGRAM_TOKENS
                && tokens.get(1).is_some_and(|t| t.eq_ignore_ascii_case("mergehistograms"))
                && let Some(value) = tokens.get(2)
            {
                return self.config.options.set(tokens[1], value);
            }
            return self.parse_histogram(&tokens);
        }
        if SPECTRA_PREFIX.is_match(tokens[0]) {
            return self.parse_spectra(&tokens);
        }
        tracing::debug!(line = trimmed, "ignoring unrecognised line");
        Ok(())
    }

    fn parse_histogram(&mut self, tokens: &[&str]) -> Result<()> {
        check_token_count("histogram", tokens.len(), HISTOGRAM_TOKENS)?;

        let caps = HISTOGRAM_KIND
            .captures(tokens[0])
            .ok_or_else(|| Error::Config(format!("invalid histogram type '{}'", tokens[0])))?;
        let per_entry = caps.get(1).is_none();
        let dims: usize = caps[2].parse().map_err(|_| {
            Error::Config(format!("invalid histogram dimension in '{}'", tokens[0]))
        })?;
        let mut log_axes = vec![false; dims];
        let flags: Vec<bool> = AXIS_FLAG
            .find_iter(&caps[3])
            .map(|m| m.as_str().eq_ignore_ascii_case("log"))
            .collect();
        if flags.len() > dims {
            return Err(Error::Config(format!(
                "'{}' lists {} axis flags for a {dims}D histogram",
                tokens[0],
                flags.len()
            )));
        }
        log_axes[..flags.len()].copy_from_slice(&flags);

        let tree = normalize_tree(tokens[1])?;
        let name = tokens[2];
        let bins = parse_bins(tokens[3], dims)?;
        let axes = self.parse_binning(tokens[4], &bins, &log_axes)?;

        let variable = tokens[5];
        let colons = variable.matches(':').count();
        if colons > dims - 1 {
            return Err(Error::Config(format!(
                "variable '{variable}' has {} sub-variables but histogram '{name}' has {dims} dimension(s)",
                colons + 1
            )));
        }
        let selection = tokens[6];

        let header = HistogramHeader {
            tree: tree.clone(),
            name: name.to_string(),
            variable: variable.to_string(),
            selection: selection.to_string(),
            per_entry,
        };
        let spec = HistogramSpec::from_axes(header, axes)?;
        self.config.add_histogram(spec)?;
        for branch in referenced_branches(variable).chain(referenced_branches(selection)) {
            self.config.activate_branch(&tree, branch);
        }
        Ok(())
    }

    fn parse_spectra(&mut self, tokens: &[&str]) -> Result<()> {
        check_token_count("spectra", tokens.len(), SPECTRA_TOKENS)?;

        let caps = SPECTRA_KIND
            .captures(tokens[0])
            .ok_or_else(|| Error::Config(format!("invalid spectra type '{}'", tokens[0])))?;
        let per_entry = caps.get(1).is_none();
        let (leaf, tag) = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("te") => ("energy", Some("TE")),
            Some("rigidity") => ("rigidity", Some("Rigidity")),
            Some("momentum") => ("p", Some("Momentum")),
            _ => ("kineticEnergy", None),
        };
        let log = caps.get(3).is_some();

        let branch = tokens[1].trim_end_matches('.');
        if branch.is_empty() {
            return Err(Error::Config(format!("invalid spectra branch name '{}'", tokens[1])));
        }
        let bins = parse_bins(tokens[2], 1)?;
        let axes = self.parse_binning(tokens[3], &bins, &[log])?;

        let species = parse_species_specifier(tokens[4])?;
        if !per_entry && species.is_dynamic() {
            return Err(Error::Config(format!(
                "dynamic species '{}' require per-entry spectra, not '{}'",
                tokens[4], tokens[0]
            )));
        }

        let n = self.config.next_spectra_index(branch);
        let name = match tag {
            Some(tag) => format!("{branch}_{tag}_{n}"),
            None => format!("{branch}_{n}"),
        };
        let header = HistogramHeader {
            tree: EVENT_TREE.to_string(),
            name,
            variable: format!("{branch}.{leaf}"),
            selection: tokens[5].to_string(),
            per_entry,
        };
        let base = HistogramSpec::from_axes(header, axes)?;
        let set = HistogramSetSpec::new(branch, base, species);
        for extra in referenced_branches(tokens[5]) {
            self.config.activate_branch(EVENT_TREE, extra);
        }
        self.config.add_set(set)
    }

    /// Per-axis binnings from `{f1,f2,...}`, one `low:high` or `.txt` field per axis.
    fn parse_binning(&self, text: &str, bins: &[usize], log_axes: &[bool]) -> Result<Vec<BinSpecification>> {
        let fields: Vec<&str> = strip_braces(text).split(',').map(str::trim).collect();
        if fields.len() != bins.len() {
            return Err(Error::Config(format!(
                "binning '{text}' has {} field(s) but the histogram has {} dimension(s)",
                fields.len(),
                bins.len()
            )));
        }
        fields
            .iter()
            .zip(bins)
            .zip(log_axes)
            .map(|((field, &n), &log)| self.parse_axis_binning(field, n, log))
            .collect()
    }

    fn parse_axis_binning(&self, field: &str, n: usize, log: bool) -> Result<BinSpecification> {
        if field.to_ascii_lowercase().ends_with(".txt") {
            let path = self.config.base_dir().join(field);
            let edges = load_edges_from_file(&path)?;
            return BinSpecification::from_edges(edges, Some(field.to_string()));
        }
        let (low, high) = field.split_once(':').ok_or_else(|| {
            Error::Config(format!("binning field '{field}' must be low:high or an edges .txt file"))
        })?;
        let low = parse_number(low, field)?;
        let high = parse_number(high, field)?;
        if log { BinSpecification::log10(low, high, n) } else { BinSpecification::uniform(low, high, n) }
    }
}

fn check_token_count(kind: &str, found: usize, expected: usize) -> Result<()> {
    if found == expected {
        return Ok(());
    }
    let what = if found < expected { "too few" } else { "too many" };
    Err(Error::Config(format!(
        "{what} tokens in {kind} declaration: found {found}, expected {expected}"
    )))
}

fn normalize_tree(token: &str) -> Result<String> {
    let tree = if token.ends_with('.') { token.to_string() } else { format!("{token}.") };
    if TREE_NAMES.contains(&tree.as_str()) {
        Ok(tree)
    } else {
        Err(Error::Config(format!(
            "Invalid tree name '{token}'; valid trees are: {}",
            TREE_NAMES.join(", ")
        )))
    }
}

fn strip_braces(text: &str) -> &str {
    text.trim().trim_start_matches('{').trim_end_matches('}')
}

/// Bins per axis from `{n1,n2,...}`; `1e2` style values are accepted.
fn parse_bins(text: &str, dims: usize) -> Result<Vec<usize>> {
    let bins = strip_braces(text)
        .split(',')
        .map(|field| {
            let field = field.trim();
            match field.parse::<f64>() {
                Ok(v) if v >= 1.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as usize),
                _ => Err(Error::Config(format!("invalid number of bins '{field}' in '{text}'"))),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    if bins.len() != dims {
        return Err(Error::Config(format!(
            "'{text}' gives bins for {} axis(es) but the histogram has {dims} dimension(s)",
            bins.len()
        )));
    }
    Ok(bins)
}

fn parse_number(text: &str, field: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("invalid number '{text}' in binning field '{field}'")))
}

/// Branch names referenced as `Branch.leaf` in an expression.
fn referenced_branches(expr: &str) -> impl Iterator<Item = &str> {
    BRANCH_REF.captures_iter(expr).filter_map(|c| c.get(1).map(|m| m.as_str()))
}
