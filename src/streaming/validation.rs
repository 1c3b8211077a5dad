//! Optional sort-order assertion for input streams.
//!
//! The merge engine assumes every stream is sorted and never checks. When
//! asked to (`--check-sorted`), each producer is wrapped in [`SortChecked`],
//! which fails the run on the first out-of-order record instead of silently
//! producing incomplete matches.
//!
//! Validates that:
//! 1. All records for a chromosome are contiguous (no interleaving)
//! 2. Chromosomes appear in the configured [`ChromOrder`]
//! 3. Within a chromosome, start positions are non-decreasing

use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::{AnnoError, Result};
use crate::genome::ChromOrder;
use crate::interval::Interval;

/// Inline sort validator for use within streaming loops.
#[derive(Debug)]
pub struct SortValidator {
    order: Arc<ChromOrder>,
    prev_chrom: Option<String>,
    prev_start: u64,
    seen_chroms: FxHashSet<String>,
    record_count: usize,
}

impl SortValidator {
    pub fn new(order: Arc<ChromOrder>) -> Self {
        Self {
            order,
            prev_chrom: None,
            prev_start: 0,
            seen_chroms: FxHashSet::default(),
            record_count: 0,
        }
    }

    /// Validate that the given record maintains sort order.
    #[inline]
    pub fn validate(&mut self, chrom: &str, start: u64, file_id: &str) -> Result<()> {
        self.record_count += 1;

        if let Some(ref pc) = self.prev_chrom {
            if chrom != pc {
                if self.seen_chroms.contains(chrom) {
                    return Err(AnnoError::Unsorted(format!(
                        "{}: chromosome '{}' at record {} was seen earlier (chromosomes must be contiguous)",
                        file_id, chrom, self.record_count
                    )));
                }
                if self.order.compare(pc, chrom) == Ordering::Greater {
                    return Err(AnnoError::Unsorted(format!(
                        "{}: chromosome '{}' at record {} should come before '{}'",
                        file_id, chrom, self.record_count, pc
                    )));
                }
                self.seen_chroms.insert(pc.clone());
                self.prev_chrom = Some(chrom.to_string());
            } else if start < self.prev_start {
                return Err(AnnoError::Unsorted(format!(
                    "{}: position {} at record {} comes after {} on {}",
                    file_id, start, self.record_count, self.prev_start, chrom
                )));
            }
        } else {
            self.prev_chrom = Some(chrom.to_string());
        }

        self.prev_start = start;
        Ok(())
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

/// Iterator adapter asserting sort order on an interval stream.
pub struct SortChecked<I> {
    inner: I,
    validator: SortValidator,
    file_id: String,
    failed: bool,
}

impl<I> SortChecked<I>
where
    I: Iterator<Item = Result<Interval>>,
{
    pub fn new(inner: I, order: Arc<ChromOrder>, file_id: impl Into<String>) -> Self {
        Self {
            inner,
            validator: SortValidator::new(order),
            file_id: file_id.into(),
            failed: false,
        }
    }
}

impl<I> Iterator for SortChecked<I>
where
    I: Iterator<Item = Result<Interval>>,
{
    type Item = Result<Interval>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        let checked = item.and_then(|iv| {
            self.validator
                .validate(&iv.chrom, iv.start, &self.file_id)
                .map(|_| iv)
        });
        self.failed = checked.is_err();
        Some(checked)
    }
}
