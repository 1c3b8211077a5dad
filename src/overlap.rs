//! Overlap matching policy.
//!
//! Positional overlap is a pure half-open intersection test. In strict mode a
//! variant query only matches a variant candidate that has the same REF and
//! shares at least one ALT allele (exact string comparison, no indel
//! normalization).

use crate::interval::{Interval, Payload};

/// Half-open range intersection: touching ranges do not overlap.
#[inline(always)]
pub fn ranges_overlap(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    a_start < b_end && b_start < a_end
}

/// Decide whether `candidate` counts as a match for `query`.
#[inline]
pub fn matches(query: &Interval, candidate: &Interval, strict: bool) -> bool {
    if query.chrom != candidate.chrom
        || !ranges_overlap(query.start, query.end, candidate.start, candidate.end)
    {
        return false;
    }
    if !strict {
        return true;
    }
    match (&query.payload, &candidate.payload) {
        (Payload::Variant(q), Payload::Variant(c)) => {
            q.reference == c.reference && q.alts.iter().any(|alt| c.alts.contains(alt))
        }
        _ => true,
    }
}

/// Which part of the query a probe covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The whole query interval.
    Whole,
    /// The first base of the query, `[start, start + 1)`.
    Left,
    /// The last base of the query, `[end - 1, end)`.
    Right,
}

impl Probe {
    /// Range tested by this probe. Boundary probes of an empty query are
    /// empty and never match.
    #[inline]
    pub fn range(self, query: &Interval) -> (u64, u64) {
        match self {
            Probe::Whole => (query.start, query.end),
            Probe::Left if query.is_empty() => (query.start, query.start),
            Probe::Left => (query.start, query.start + 1),
            Probe::Right if query.is_empty() => (query.end, query.end),
            Probe::Right => (query.end - 1, query.end),
        }
    }

    /// Output-name prefix for annotations computed from this probe.
    pub fn prefix(self) -> &'static str {
        match self {
            Probe::Whole => "",
            Probe::Left => "left_",
            Probe::Right => "right_",
        }
    }

    /// Test a candidate against this probe. Boundary probes are positional.
    #[inline]
    pub fn matches(self, query: &Interval, candidate: &Interval, strict: bool) -> bool {
        match self {
            Probe::Whole => matches(query, candidate, strict),
            _ => {
                let (start, end) = self.range(query);
                query.chrom == candidate.chrom
                    && ranges_overlap(start, end, candidate.start, candidate.end)
            }
        }
    }
}
