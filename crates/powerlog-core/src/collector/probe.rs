//! Ordered fallback probing across vendor-specific data sources.
//!
//! Devices expose the same metric under different sysfs layouts. A probe
//! walks an ordered candidate list and stops at the first candidate that
//! yields a value, reporting which one it was.

/// A data source that can be tried by [`probe`].
pub trait ProbeCandidate {
    /// Short stable name of the source, reported on success.
    fn tag(&self) -> &'static str;
}

/// Outcome of a probe. Never partially populated.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult<T> {
    Found { value: T, source: &'static str },
    NotFound,
}

impl<T> ProbeResult<T> {
    /// Discards the source tag.
    pub fn value(self) -> Option<T> {
        match self {
            ProbeResult::Found { value, .. } => Some(value),
            ProbeResult::NotFound => None,
        }
    }

    pub fn source(&self) -> Option<&'static str> {
        match self {
            ProbeResult::Found { source, .. } => Some(*source),
            ProbeResult::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ProbeResult::Found { .. })
    }
}

/// Tries `candidates` in order with `attempt`.
///
/// Candidates after the first success are never attempted.
pub fn probe<C, T>(candidates: &[C], mut attempt: impl FnMut(&C) -> Option<T>) -> ProbeResult<T>
where
    C: ProbeCandidate,
{
    candidates
        .iter()
        .find_map(|candidate| {
            attempt(candidate).map(|value| ProbeResult::Found {
                value,
                source: candidate.tag(),
            })
        })
        .unwrap_or(ProbeResult::NotFound)
}
