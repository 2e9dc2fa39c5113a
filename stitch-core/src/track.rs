//! Per-signal delta reconstruction
//!
//! A `DeltaTrack` turns a stream of raw timestamped samples into an
//! ordered, non-overlapping, contiguous sequence of delta records, each
//! covering the span between two consecutive samples of that signal and
//! queryable by timestamp.
//!
//! Two signal shapes exist, selected at construction as a closed tagged
//! pair rather than per-type trait conformance:
//!
//! - **Continuous** (heart rate, cumulative distance, cadence):
//!   `value_at` interpolates linearly between `begin` and `end`.
//! - **Classifying** (active flag, intensity zone): `value_at` is a step
//!   function, `begin` until the span ends and `end` thereafter.
//!
//! The shape also decides how far back a freshly appended record can
//! invalidate previously committed segments: a continuous delta is
//! derived from the pair (previous, current) and so impacts from its
//! *lower* bound; a classifying step only takes effect at its *upper*
//! bound.
//!
//! Records are appended, never edited. Refinement of earlier conclusions
//! is expressed by the reconciler rolling segments back and forward, not
//! by mutating history.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

use crate::errors::TrackError;
use crate::time::{Span, Timestamp};

/// Value contract shared by all track signal types
///
/// Step signals keep the default implementation, which ignores the
/// fraction and holds the span's begin value.
pub trait SignalValue: Copy + PartialEq {
    /// Value at fraction `t` in [0, 1] between `a` and `b`
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        let _ = (b, t);
        a
    }
}

impl SignalValue for f64 {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl SignalValue for bool {}

/// Interpolation shape of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    /// Linear interpolation across each span
    Continuous,
    /// Step function: begin until the span's upper bound, end thereafter
    Classifying,
}

/// Reconstructed value function over one span between consecutive samples
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeltaRecord<V> {
    /// Half-open time interval covered by this record
    pub span: Span,
    /// Value at the span's lower bound
    pub begin: V,
    /// Value at the span's upper bound
    pub end: V,
}

impl<V: SignalValue> DeltaRecord<V> {
    /// Earliest time this record can invalidate prior conclusions
    pub fn impacts_after(&self, kind: DeltaKind) -> Timestamp {
        match kind {
            DeltaKind::Continuous => self.span.lower,
            DeltaKind::Classifying => self.span.upper,
        }
    }
}

/// Outcome of appending a sample to a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppendOutcome<V> {
    /// First sample of the track; it anchors the value function but
    /// produces no record yet
    Anchored,
    /// A new delta record was appended
    Appended(DeltaRecord<V>),
}

/// Ordered, contiguous sequence of delta records for one signal
#[derive(Debug, Clone)]
pub struct DeltaTrack<V: SignalValue> {
    kind: DeltaKind,
    records: Vec<DeltaRecord<V>>,
    /// Newest sample: the anchor for the next record
    last: Option<(Timestamp, V)>,
}

impl<V: SignalValue> DeltaTrack<V> {
    /// Create an empty track of the given shape
    pub const fn new(kind: DeltaKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            last: None,
        }
    }

    /// Interpolation shape of this track
    pub const fn kind(&self) -> DeltaKind {
        self.kind
    }

    /// Accept a new sample with the track-specific end value already
    /// computed by the caller
    ///
    /// The timestamp must be strictly greater than the track's last
    /// known sample. The first sample anchors the track; each later one
    /// appends exactly one record whose `begin` is the previous end.
    pub fn append(&mut self, t: Timestamp, end: V) -> Result<AppendOutcome<V>, TrackError> {
        match self.last {
            None => {
                self.last = Some((t, end));
                Ok(AppendOutcome::Anchored)
            }
            Some((last_t, last_v)) => {
                if t <= last_t {
                    return Err(TrackError::OutOfOrder { last: last_t, got: t });
                }
                let record = DeltaRecord {
                    span: Span::new(last_t, t),
                    begin: last_v,
                    end,
                };
                self.records.push(record);
                self.last = Some((t, end));
                Ok(AppendOutcome::Appended(record))
            }
        }
    }

    /// Value of the reconstructed signal at `at`
    ///
    /// Defined from the track's first sample onward: None before it (the
    /// reconciler substitutes the signal's default there), the newest
    /// sample's value from the newest sample onward. The signal never
    /// extends backward past its first observation; doing so would let a
    /// late-starting track silently change already-committed history
    /// without a rollback.
    pub fn value_at(&self, at: Timestamp) -> Option<V> {
        let (last_t, last_v) = self.last?;
        if at >= last_t {
            return Some(last_v);
        }
        // at < last_t: there is no coverage unless records exist
        let first = self.records.first()?;
        if at < first.span.lower {
            return None;
        }
        let idx = self.records.partition_point(|r| r.span.upper <= at);
        let record = &self.records[idx];
        debug_assert!(record.span.contains(at));
        Some(match self.kind {
            DeltaKind::Continuous => V::lerp(record.begin, record.end, record.span.fraction_at(at)),
            DeltaKind::Classifying => record.begin,
        })
    }

    /// Earliest time the track's newest knowledge can invalidate prior
    /// conclusions
    ///
    /// An anchor with no records still impacts from its own timestamp:
    /// it switches `value_at` from undefined to defined there.
    pub fn newest_impacts_after(&self) -> Option<Timestamp> {
        match self.records.last() {
            Some(r) => Some(r.impacts_after(self.kind)),
            None => self.last.map(|(t, _)| t),
        }
    }

    /// Timestamp of the newest sample (anchor included)
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last.map(|(t, _)| t)
    }

    /// Value of the newest sample (anchor included)
    pub fn last_value(&self) -> Option<V> {
        self.last.map(|(_, v)| v)
    }

    /// Newest sample as the track tail, for snapshots
    pub fn tail(&self) -> Option<(Timestamp, V)> {
        self.last
    }

    /// All records, sorted by span
    pub fn records(&self) -> &[DeltaRecord<V>] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the track holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record that ends at or before `up_to`
    ///
    /// The anchor is kept so the track keeps extending forward.
    pub fn archive(&mut self, up_to: Timestamp) {
        self.records.retain(|r| r.span.upper > up_to);
    }

    /// Remove all records and the anchor
    pub fn clear(&mut self) {
        self.records.clear();
        self.last = None;
    }
}
