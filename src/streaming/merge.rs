//! Multi-source sweep-line merge engine.
//!
//! The engine walks the query stream once and keeps every source stream in
//! lockstep with it. Each source has a one-record look-ahead and a
//! [`Window`] of candidates that may still overlap the current or a later
//! query interval.
//!
//! # Algorithm
//!
//! For each query interval `q`, in stream order:
//! 1. If `q` is on a new chromosome, flush every window
//! 2. Discard source records on chromosomes ordered before `q.chrom`
//! 3. Pull source records with `start < q.end` on `q.chrom` into the window
//! 4. Evict candidates with `end <= q.start`
//! 5. Select the candidates matching `q` (and its boundary probes with `ends`)
//! 6. Yield `(q, matches per source)`; matched candidates stay in the window,
//!    since they may overlap the next query too
//!
//! The engine stops when the query stream ends. Unread source input is left
//! alone.
//!
//! # Requirements
//!
//! All streams MUST be sorted by chromosome (in the configured
//! [`ChromOrder`]) and then by start. Unsorted input is not detected here and
//! yields incomplete matches; wrap producers in
//! [`SortChecked`](crate::streaming::validation::SortChecked) to assert it.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::genome::ChromOrder;
use crate::interval::Interval;
use crate::overlap::Probe;
use crate::streaming::producer::IntervalStream;
use crate::streaming::window::Window;

/// Warning threshold for a single source window (potential pathological case)
const WINDOW_WARNING_THRESHOLD: usize = 100_000;

/// Matches of one query interval against one source.
#[derive(Debug, Clone, Default)]
pub struct SourceHits {
    pub whole: Vec<Arc<Interval>>,
    pub left: Vec<Arc<Interval>>,
    pub right: Vec<Arc<Interval>>,
}

impl SourceHits {
    /// Matches for one probe.
    pub fn get(&self, probe: Probe) -> &[Arc<Interval>] {
        match probe {
            Probe::Whole => &self.whole,
            Probe::Left => &self.left,
            Probe::Right => &self.right,
        }
    }
}

/// A query interval with its per-source matches, in source order.
#[derive(Debug, Clone)]
pub struct Matched {
    pub query: Interval,
    pub hits: Vec<SourceHits>,
}

/// Sweep statistics.
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    pub queries: usize,
    pub candidates_read: usize,
    pub max_window: usize,
    /// Query chromosome changes that went backwards in the configured order.
    pub chrom_order_violations: usize,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queries={}, source_records={}, max_window={}, chrom_order_violations={}",
            self.queries, self.candidates_read, self.max_window, self.chrom_order_violations
        )
    }
}

/// Cursor over one streamed source.
struct SourceCursor {
    stream: IntervalStream,
    lookahead: Option<Interval>,
    exhausted: bool,
    window: Window,
    read: usize,
    warned: bool,
}

impl SourceCursor {
    fn new(stream: IntervalStream) -> Self {
        Self {
            stream,
            lookahead: None,
            exhausted: false,
            window: Window::new(),
            read: 0,
            warned: false,
        }
    }

    /// Fill the look-ahead slot. Returns false once the stream is done.
    fn fill(&mut self) -> Result<bool> {
        if self.lookahead.is_some() {
            return Ok(true);
        }
        if self.exhausted {
            return Ok(false);
        }
        match self.stream.next() {
            Some(record) => {
                self.lookahead = Some(record?);
                self.read += 1;
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// Steps 2-4: drain, pull and evict for query `q`.
    fn advance(&mut self, q: &Interval, order: &ChromOrder) -> Result<()> {
        while self.fill()? {
            let Some(next) = self.lookahead.as_ref() else {
                break;
            };
            match order.compare(&next.chrom, &q.chrom) {
                // behind the query on an earlier chromosome: never matches
                Ordering::Less => self.lookahead = None,
                Ordering::Equal if next.start < q.end => {
                    if let Some(candidate) = self.lookahead.take() {
                        self.window.push(Arc::new(candidate));
                    }
                }
                _ => break,
            }
        }
        self.window.evict_before(q.start);
        Ok(())
    }

    fn select(&self, q: &Interval, probe: Probe, strict: bool) -> Vec<Arc<Interval>> {
        self.window
            .iter()
            .filter(|c| probe.matches(q, c, strict))
            .cloned()
            .collect()
    }
}

/// The merge engine. Iterating yields one [`Matched`] per query interval.
pub struct MergeEngine {
    query: IntervalStream,
    /// One slot per configured source; `None` for sources that are not
    /// streamed (depth lookups).
    cursors: Vec<Option<SourceCursor>>,
    order: Arc<ChromOrder>,
    strict: bool,
    ends: bool,
    current_chrom: Option<String>,
    stats: MergeStats,
    done: bool,
}

impl MergeEngine {
    pub fn new(
        query: IntervalStream,
        sources: Vec<Option<IntervalStream>>,
        order: Arc<ChromOrder>,
        strict: bool,
        ends: bool,
    ) -> Self {
        Self {
            query,
            cursors: sources
                .into_iter()
                .map(|s| s.map(SourceCursor::new))
                .collect(),
            order,
            strict,
            ends,
            current_chrom: None,
            stats: MergeStats::default(),
            done: false,
        }
    }

    /// Statistics so far; `max_window` is the largest window of any source.
    pub fn stats(&self) -> MergeStats {
        let mut stats = self.stats.clone();
        for cursor in self.cursors.iter().flatten() {
            stats.candidates_read += cursor.read;
            stats.max_window = stats.max_window.max(cursor.window.max_len());
        }
        stats
    }

    /// Current window size of a source (None for non-streamed sources).
    pub fn window_len(&self, source: usize) -> Option<usize> {
        self.cursors.get(source)?.as_ref().map(|c| c.window.len())
    }

    fn process(&mut self, q: Interval) -> Result<Matched> {
        if self.current_chrom.as_deref() != Some(q.chrom.as_str()) {
            if let Some(previous) = &self.current_chrom {
                if self.order.compare(&q.chrom, previous) == Ordering::Less {
                    self.stats.chrom_order_violations += 1;
                    tracing::warn!(
                        "query chromosome {} follows {} but sorts before it; matches on {} may be missed (set the order with -g)",
                        q.chrom,
                        previous,
                        q.chrom
                    );
                }
            }
            for cursor in self.cursors.iter_mut().flatten() {
                cursor.window.clear();
            }
            self.current_chrom = Some(q.chrom.clone());
        }

        let mut hits = Vec::with_capacity(self.cursors.len());
        for cursor in self.cursors.iter_mut() {
            let Some(cursor) = cursor else {
                hits.push(SourceHits::default());
                continue;
            };
            cursor.advance(&q, &self.order)?;

            if !cursor.warned && cursor.window.len() > WINDOW_WARNING_THRESHOLD {
                cursor.warned = true;
                tracing::warn!(
                    "source window exceeded {} records at {}:{}; check that inputs are sorted",
                    WINDOW_WARNING_THRESHOLD,
                    q.chrom,
                    q.start
                );
            }

            let mut source_hits = SourceHits {
                whole: cursor.select(&q, Probe::Whole, self.strict),
                ..Default::default()
            };
            if self.ends {
                source_hits.left = cursor.select(&q, Probe::Left, self.strict);
                source_hits.right = cursor.select(&q, Probe::Right, self.strict);
            }
            hits.push(source_hits);
        }

        self.stats.queries += 1;
        Ok(Matched { query: q, hits })
    }
}

impl Iterator for MergeEngine {
    type Item = Result<Matched>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.query.next()? {
            Ok(q) => self.process(q),
            Err(e) => Err(e),
        };
        self.done = result.is_err();
        Some(result)
    }
}
