//! Species keys, expansion policies and the species specifier syntax.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use evh_core::{Error, Result};
use regex::Regex;
use serde::Serialize;

/// Ids above this value are ions.
pub const ION_THRESHOLD: i64 = 100_000_000;

/// Whether a species id denotes an ion.
pub fn is_ion(id: i64) -> bool {
    id > ION_THRESHOLD
}

/// Which particles of a species are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Role {
    /// Primaries and secondaries.
    Any,
    /// Primaries only (`parentId == 0`).
    Primary,
    /// Secondaries only (`parentId > 0`).
    Secondary,
}

impl Role {
    /// Role for a single-letter prefix (`p`, `s`).
    pub fn from_letter(c: char) -> Option<Role> {
        match c.to_ascii_lowercase() {
            'p' => Some(Role::Primary),
            's' => Some(Role::Secondary),
            _ => None,
        }
    }
}

/// A species id plus role, ordered by id then role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SpeciesKey {
    pub id: i64,
    pub role: Role,
}

impl SpeciesKey {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    /// Key matching both primaries and secondaries.
    pub fn any(id: i64) -> Self {
        Self { id, role: Role::Any }
    }

    /// The `total` sentinel: no species filter at all.
    pub fn total() -> Self {
        Self::any(0)
    }

    pub fn is_ion(&self) -> bool {
        is_ion(self.id)
    }
}

impl fmt::Display for SpeciesKey {
    /// `11`, `-11_Primary`, `2212_Secondary`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Any => write!(f, "{}", self.id),
            Role::Primary => write!(f, "{}_Primary", self.id),
            Role::Secondary => write!(f, "{}_Secondary", self.id),
        }
    }
}

/// How a histogram set without explicit species grows at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpansionPolicy {
    All,
    ParticlesOnly,
    IonsOnly,
    TopN,
    TopNParticles,
    TopNIons,
}

impl ExpansionPolicy {
    /// Whether a newly discovered id gets its own histogram.
    pub fn accepts(&self, id: i64) -> bool {
        match self {
            ExpansionPolicy::All | ExpansionPolicy::TopN => true,
            ExpansionPolicy::ParticlesOnly | ExpansionPolicy::TopNParticles => !is_ion(id),
            ExpansionPolicy::IonsOnly | ExpansionPolicy::TopNIons => is_ion(id),
        }
    }

    /// Whether output is restricted to the N largest histograms.
    pub fn is_top_n(&self) -> bool {
        matches!(
            self,
            ExpansionPolicy::TopN | ExpansionPolicy::TopNParticles | ExpansionPolicy::TopNIons
        )
    }
}

/// Parsed species specifier of a spectra declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesSpecifier {
    /// Explicit species; empty for a dynamic policy.
    pub explicit: BTreeSet<SpeciesKey>,
    /// Dynamic expansion policy (unused when `explicit` is non-empty).
    pub policy: ExpansionPolicy,
    /// N of the top-N policies.
    pub top_n: usize,
}

impl SpeciesSpecifier {
    /// Whether species are discovered at run time.
    pub fn is_dynamic(&self) -> bool {
        self.explicit.is_empty()
    }
}

static RESERVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)top|particles|all|ions").expect("valid regex"));
static TOP_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^top(\d*)(particles|ions)?$").expect("valid regex"));
static ROLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z])(-?\d+)$").expect("valid regex"));

/// Parse `all`, `particles`, `ions`, `topN[particles|ions]` or `{v1,v2,...}`
/// where each `v` is `total`, a bare integer id, or a role letter plus id
/// (`p2212`, `s11`).
pub fn parse_species_specifier(text: &str) -> Result<SpeciesSpecifier> {
    let text = text.trim();

    if RESERVED.is_match(text) {
        let lower = text.to_ascii_lowercase();
        let (policy, top_n) = match lower.as_str() {
            "all" => (ExpansionPolicy::All, 0),
            "particles" => (ExpansionPolicy::ParticlesOnly, 0),
            "ions" => (ExpansionPolicy::IonsOnly, 0),
            _ => {
                let caps = TOP_N.captures(&lower).ok_or_else(|| {
                    Error::Config(format!("invalid species specifier '{text}'"))
                })?;
                let n = caps[1].parse::<usize>().unwrap_or(1);
                let policy = match caps.get(2).map(|m| m.as_str()) {
                    Some("particles") => ExpansionPolicy::TopNParticles,
                    Some("ions") => ExpansionPolicy::TopNIons,
                    _ => ExpansionPolicy::TopN,
                };
                (policy, n)
            }
        };
        return Ok(SpeciesSpecifier { explicit: BTreeSet::new(), policy, top_n });
    }

    let inner = text
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| {
            Error::Config(format!("species specifier '{text}' must be of the form {{id1,id2,...}}"))
        })?;

    let mut explicit = BTreeSet::new();
    for field in inner.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        explicit.insert(parse_species_key(field)?);
    }
    if explicit.is_empty() {
        return Err(Error::Config(format!("species specifier '{text}' lists no species")));
    }
    Ok(SpeciesSpecifier { explicit, policy: ExpansionPolicy::All, top_n: 0 })
}

fn parse_species_key(field: &str) -> Result<SpeciesKey> {
    if field.eq_ignore_ascii_case("total") {
        return Ok(SpeciesKey::total());
    }
    if let Some(caps) = ROLE_ID.captures(field) {
        let letter = caps[1].chars().next().unwrap_or_default();
        let role = Role::from_letter(letter).ok_or_else(|| {
            Error::Config(format!("invalid species role '{letter}' in '{field}' (expected p or s)"))
        })?;
        let id = parse_id(&caps[2], field)?;
        return Ok(SpeciesKey::new(id, role));
    }
    Ok(SpeciesKey::any(parse_id(field, field)?))
}

fn parse_id(digits: &str, field: &str) -> Result<i64> {
    digits
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("invalid species id '{field}'")))
}
