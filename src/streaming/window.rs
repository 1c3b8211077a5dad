//! Per-source candidate window for the merge engine.
//!
//! The window holds the source records that may still overlap the current
//! or a later query interval. Records enter in source order (non-decreasing
//! start) and leave once their end is at or before the query start.
//!
//! # Memory Complexity
//!
//! O(k) where k = max number of source records overlapping any query
//! position. A source record spanning a whole chromosome keeps only itself
//! alive; shorter records behind it are still evicted.

use std::sync::Arc;

use crate::interval::Interval;

/// Candidate window with eviction by end position.
#[derive(Debug, Default)]
pub struct Window {
    data: Vec<Arc<Interval>>,
    /// Maximum observed window size (for statistics).
    max_len: usize,
}

impl Window {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            max_len: 0,
        }
    }

    /// Add a candidate at the back of the window.
    #[inline]
    pub fn push(&mut self, candidate: Arc<Interval>) {
        self.data.push(candidate);
        if self.data.len() > self.max_len {
            self.max_len = self.data.len();
        }
    }

    /// Remove candidates ending at or before `position`.
    ///
    /// Returns the number of candidates removed.
    #[inline]
    pub fn evict_before(&mut self, position: u64) -> usize {
        let before = self.data.len();
        // Fast path: the common case drops a prefix
        let prefix = self
            .data
            .iter()
            .take_while(|c| c.end <= position)
            .count();
        self.data.drain(..prefix);
        if self.data.iter().any(|c| c.end <= position) {
            self.data.retain(|c| c.end > position);
        }
        before - self.data.len()
    }

    /// Drop every candidate (chromosome change).
    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Interval>> {
        self.data.iter()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(spans: &[(u64, u64)]) -> Window {
        let mut w = Window::new();
        for &(s, e) in spans {
            w.push(Arc::new(Interval::new("chr1", s, e)));
        }
        w
    }

    fn spans(w: &Window) -> Vec<(u64, u64)> {
        w.iter().map(|c| (c.start, c.end)).collect()
    }

    #[test]
    fn test_evict_prefix() {
        let mut w = window(&[(100, 200), (150, 250), (200, 300)]);
        assert_eq!(w.evict_before(200), 1);
        assert_eq!(spans(&w), vec![(150, 250), (200, 300)]);
    }

    #[test]
    fn test_evict_behind_long_candidate() {
        let mut w = window(&[(0, 10_000), (10, 20), (30, 40), (50, 500)]);
        assert_eq!(w.evict_before(45), 2);
        assert_eq!(spans(&w), vec![(0, 10_000), (50, 500)]);
    }

    #[test]
    fn test_clear_and_stats() {
        let mut w = window(&[(1, 2), (1, 3), (2, 4)]);
        assert_eq!(w.max_len(), 3);
        w.clear();
        assert!(w.is_empty());
        assert_eq!(w.len(), 0);
        assert_eq!(w.max_len(), 3);
    }
}
