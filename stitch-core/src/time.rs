//! Timeline primitives: timestamps, spans, and the global timeline
//!
//! Every track contributes its observed timestamps to one deduplicated,
//! sorted `GlobalTimeline`. Segment boundaries are always timeline
//! entries, so rollforward only ever needs consecutive-pair iteration
//! plus binary search for the impact point.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

/// Timestamp in milliseconds since session epoch
pub type Timestamp = u64;

/// Half-open time interval `[lower, upper)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Inclusive lower bound
    pub lower: Timestamp,
    /// Exclusive upper bound
    pub upper: Timestamp,
}

impl Span {
    /// Create a span; callers must uphold `lower <= upper`
    pub const fn new(lower: Timestamp, upper: Timestamp) -> Self {
        Self { lower, upper }
    }

    /// Length in milliseconds
    pub const fn len_ms(&self) -> u64 {
        self.upper.saturating_sub(self.lower)
    }

    /// Length in seconds
    pub fn len_s(&self) -> f64 {
        self.len_ms() as f64 / crate::constants::MS_PER_SEC
    }

    /// Whether `at` falls inside the half-open interval
    pub const fn contains(&self, at: Timestamp) -> bool {
        at >= self.lower && at < self.upper
    }

    /// Fraction of the way through the span, clamped to [0, 1]
    ///
    /// Degenerate spans report 0.
    pub fn fraction_at(&self, at: Timestamp) -> f64 {
        let len = self.len_ms();
        if len == 0 {
            return 0.0;
        }
        let offset = at.saturating_sub(self.lower).min(len);
        offset as f64 / len as f64
    }
}

/// Sorted, deduplicated union of every timestamp observed across tracks
///
/// Append-mostly: insertion keeps order via binary search, and the only
/// removal is prefix archival of fully settled history. Entries after a
/// rollback point remain; rollforward re-uses them.
#[derive(Debug, Clone, Default)]
pub struct GlobalTimeline {
    stamps: Vec<Timestamp>,
}

impl GlobalTimeline {
    /// Create an empty timeline
    pub const fn new() -> Self {
        Self { stamps: Vec::new() }
    }

    /// Insert a timestamp, keeping the list sorted and deduplicated
    ///
    /// Returns false if the timestamp was already present.
    pub fn insert(&mut self, t: Timestamp) -> bool {
        match self.stamps.binary_search(&t) {
            Ok(_) => false,
            Err(idx) => {
                self.stamps.insert(idx, t);
                true
            }
        }
    }

    /// Index of the entry at or immediately before `t`
    ///
    /// None if the timeline is empty or every entry is after `t`.
    pub fn index_at_or_before(&self, t: Timestamp) -> Option<usize> {
        let after = self.stamps.partition_point(|&s| s <= t);
        after.checked_sub(1)
    }

    /// Index of an exact entry, if present
    pub fn index_of(&self, t: Timestamp) -> Option<usize> {
        self.stamps.binary_search(&t).ok()
    }

    /// Earliest observed timestamp
    pub fn first(&self) -> Option<Timestamp> {
        self.stamps.first().copied()
    }

    /// Latest observed timestamp
    pub fn last(&self) -> Option<Timestamp> {
        self.stamps.last().copied()
    }

    /// All entries, sorted ascending
    pub fn stamps(&self) -> &[Timestamp] {
        &self.stamps
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether the timeline holds no entries
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Drop all entries strictly before `keep_from`
    pub fn archive(&mut self, keep_from: Timestamp) {
        let cut = self.stamps.partition_point(|&s| s < keep_from);
        self.stamps.drain(..cut);
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.stamps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_fraction() {
        let span = Span::new(1_000, 2_000);
        assert_eq!(span.fraction_at(1_000), 0.0);
        assert_eq!(span.fraction_at(1_500), 0.5);
        assert_eq!(span.fraction_at(2_000), 1.0);
        // Outside the span clamps
        assert_eq!(span.fraction_at(500), 0.0);
        assert_eq!(span.fraction_at(9_000), 1.0);
    }

    #[test]
    fn span_degenerate() {
        let span = Span::new(5, 5);
        assert_eq!(span.len_ms(), 0);
        assert_eq!(span.fraction_at(5), 0.0);
        assert!(!span.contains(5));
    }

    #[test]
    fn timeline_insert_dedup() {
        let mut tl = GlobalTimeline::new();
        assert!(tl.insert(20));
        assert!(tl.insert(10));
        assert!(tl.insert(30));
        assert!(!tl.insert(20));
        assert_eq!(tl.stamps(), &[10, 20, 30]);
    }

    #[test]
    fn timeline_neighbor_lookup() {
        let mut tl = GlobalTimeline::new();
        for t in [10, 20, 30] {
            tl.insert(t);
        }
        assert_eq!(tl.index_at_or_before(5), None);
        assert_eq!(tl.index_at_or_before(10), Some(0));
        assert_eq!(tl.index_at_or_before(25), Some(1));
        assert_eq!(tl.index_at_or_before(99), Some(2));
    }

    #[test]
    fn timeline_archive_prefix() {
        let mut tl = GlobalTimeline::new();
        for t in [10, 20, 30, 40] {
            tl.insert(t);
        }
        tl.archive(25);
        assert_eq!(tl.stamps(), &[30, 40]);
        tl.archive(30);
        assert_eq!(tl.stamps(), &[30, 40]);
    }
}
