//! Incremental totals keyed by classification
//!
//! The aggregator consumes the reconciler's action stream and keeps a
//! classification-keyed map of accumulated duration, distance,
//! heart-rate seconds, and cadence seconds. Rollforward adds the value
//! snapshot carried by the segment, rollback subtracts the identical
//! snapshot, so the map is always the literal grouped sum of the
//! currently committed segment list. Nothing is ever recomputed from
//! scratch during normal operation.

use core::ops::{Add, AddAssign, Sub, SubAssign};

use heapless::FnvIndexMap;

use crate::constants::MAX_CLASSIFICATIONS;
use crate::reconciler::{Action, Classification, SegmentAction};

/// Additive group of per-segment contributions
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TotalsDelta {
    /// Elapsed time in seconds
    pub duration_s: f64,
    /// Distance covered in meters
    pub distance_m: f64,
    /// Heart-rate seconds (mean bpm x seconds)
    pub heartrate_s: f64,
    /// Cadence seconds (mean steps/min x seconds)
    pub cadence_s: f64,
}

impl TotalsDelta {
    /// Additive identity
    pub const ZERO: Self = Self {
        duration_s: 0.0,
        distance_m: 0.0,
        heartrate_s: 0.0,
        cadence_s: 0.0,
    };

    /// Mean heart rate over the accumulated time, if any
    pub fn mean_heart_rate(&self) -> Option<f64> {
        (self.duration_s > 0.0).then(|| self.heartrate_s / self.duration_s)
    }
}

impl Add for TotalsDelta {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            duration_s: self.duration_s + rhs.duration_s,
            distance_m: self.distance_m + rhs.distance_m,
            heartrate_s: self.heartrate_s + rhs.heartrate_s,
            cadence_s: self.cadence_s + rhs.cadence_s,
        }
    }
}

impl Sub for TotalsDelta {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            duration_s: self.duration_s - rhs.duration_s,
            distance_m: self.distance_m - rhs.distance_m,
            heartrate_s: self.heartrate_s - rhs.heartrate_s,
            cadence_s: self.cadence_s - rhs.cadence_s,
        }
    }
}

impl AddAssign for TotalsDelta {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for TotalsDelta {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

/// Classification-keyed running totals
///
/// Capacity covers every reachable key (activity state x zone) with room
/// to spare; see `MAX_CLASSIFICATIONS`.
pub type TotalsMap = FnvIndexMap<Classification, TotalsDelta, MAX_CLASSIFICATIONS>;

/// Applies the reconciler's action stream to the totals map
#[derive(Debug)]
pub struct TotalsAggregator {
    totals: TotalsMap,
}

impl Default for TotalsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TotalsAggregator {
    /// Create an empty aggregator
    pub const fn new() -> Self {
        Self { totals: TotalsMap::new() }
    }

    /// Apply one committed-segment action
    pub fn apply(&mut self, action: &SegmentAction) {
        let key = action.segment.key;
        let value = action.segment.value;
        match action.action {
            Action::Rollforward => {
                if let Some(slot) = self.totals.get_mut(&key) {
                    *slot += value;
                } else {
                    // Capacity exceeds the reachable key count
                    self.totals.insert(key, value).ok();
                }
            }
            Action::Rollback => {
                if let Some(slot) = self.totals.get_mut(&key) {
                    *slot -= value;
                } else {
                    // A rollback always retracts a prior rollforward of
                    // the same segment
                    debug_assert!(false, "rollback for unseen classification");
                }
            }
        }
    }

    /// Accumulated total for one classification
    pub fn get(&self, key: &Classification) -> TotalsDelta {
        self.totals.get(key).copied().unwrap_or(TotalsDelta::ZERO)
    }

    /// Read-only snapshot of the whole map
    pub fn totals(&self) -> &TotalsMap {
        &self.totals
    }

    /// Clear all totals (tracking session restarted)
    pub fn reset(&mut self) {
        self.totals.clear();
    }
}
