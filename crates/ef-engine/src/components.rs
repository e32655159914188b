//! Component ordering and phase (composition-set) name handling.

use std::fmt;

/// Canonical component order: upper-cased, trimmed, alphabetical, deduplicated.
///
/// Engines address components by their position in this list, so the order a
/// caller requested components in never leaks into indices.
pub fn sorted_components<S: AsRef<str>>(requested: &[S]) -> Vec<String> {
    let mut names: Vec<String> = requested
        .iter()
        .map(|s| s.as_ref().trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Engine-side record name: upper-case with spaces replaced by underscores.
pub fn engine_record_name(name: &str) -> String {
    name.trim().to_ascii_uppercase().replace(' ', "_")
}

/// A phase name as returned by an engine, possibly a composition set.
///
/// `FCC_A1#1` and `FCC_A1_AUTO#2` are both sub-instances of `FCC_A1`; the
/// `_AUTO` marker flags sets the engine created on its own during a solve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseName(String);

impl PhaseName {
    const AUTO_MARKER: &'static str = "_AUTO";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Composition-set number after `#`, if any.
    pub fn set_number(&self) -> Option<u32> {
        let (_, suffix) = self.0.rsplit_once('#')?;
        suffix.parse().ok()
    }

    /// True for sets created automatically by the engine.
    pub fn is_auto(&self) -> bool {
        self.0.contains(Self::AUTO_MARKER)
    }

    /// Name of the phase this instance belongs to.
    pub fn base(&self) -> &str {
        let without_set = match self.0.rsplit_once('#') {
            Some((head, suffix)) if suffix.parse::<u32>().is_ok() => head,
            _ => self.0.as_str(),
        };
        without_set
            .strip_suffix(Self::AUTO_MARKER)
            .unwrap_or(without_set)
    }

    /// True when `other` is an instance of the same base phase.
    pub fn same_base(&self, other: &PhaseName) -> bool {
        self.base() == other.base()
    }

    /// Name of composition set `n` of `base`, as engines create them.
    pub fn composition_set(base: &str, n: u32, auto: bool) -> Self {
        if auto {
            Self(format!("{base}{}#{n}", Self::AUTO_MARKER))
        } else {
            Self(format!("{base}#{n}"))
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhaseName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for PhaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
