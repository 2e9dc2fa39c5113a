//! Segment reconciliation under out-of-order cross-track arrival
//!
//! ## Overview
//!
//! The reconciler owns every delta track, the global timeline, and the
//! committed segment list. Each arriving sample is appended to its
//! track, the affected time region is computed, previously committed
//! segments that the new data invalidates are rolled back, and minimal
//! new segments are rolled forward, emitting one `(segment, action)`
//! pair per step.
//!
//! ## Why rollback/rollforward?
//!
//! Sensors are independent and unordered: a later-arriving sample from
//! track A can retroactively change a value inside a region already
//! finalized using only tracks B and C. Buffering output until global
//! quiescence would delay near-real-time display indefinitely, so the
//! engine commits optimistically and corrects provably: after rollback,
//! the committed sequence is exactly reconstructable by rollforward from
//! current track state alone. Rolled-back segments carry the same value
//! snapshot they carried forward, so aggregates stay exact.
//!
//! ## Ownership
//!
//! The reconciler owns tracks, timeline, and committed list exclusively.
//! Consumers receive copies through the action stream and read-only
//! snapshots; nothing outside this struct can mutate reconciliation
//! state.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

use crate::constants::MOTION_CONFIDENCE_MIN;
use crate::events::{GeoPoint, MotionSample, SampleEvent};
use crate::geo::haversine_m;
use crate::time::{GlobalTimeline, Span, Timestamp};
use crate::totals::TotalsDelta;
use crate::track::{AppendOutcome, DeltaKind, DeltaTrack};
use crate::zones::{IntensityClassifier, Zone, ZoneTable};

/// Direction of a committed-segment action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// Segment enters the committed list; aggregates add its value
    Rollforward,
    /// Segment leaves the committed list; aggregates subtract its value
    Rollback,
}

/// Grouping key for totals: activity state times intensity zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Classification {
    /// Whether the athlete was in confident motion
    pub active: bool,
    /// Training-intensity zone in effect
    pub zone: Zone,
}

/// Atomic, immutable slice of time where all signals are constant
///
/// Key and value are resolved once, at creation, from the tracks'
/// `value_at` the span boundaries, and never recomputed: rollback must
/// subtract exactly what rollforward added even if the live tracks have
/// since changed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// Half-open time slice covered
    pub span: Span,
    /// Classification holding throughout the span
    pub key: Classification,
    /// Value snapshot contributed to the totals
    pub value: TotalsDelta,
}

/// One emitted reconciliation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentAction {
    /// The affected segment
    pub segment: Segment,
    /// Whether it was committed or retracted
    pub action: Action,
}

/// Newest sample per track, for external snapshot/recovery
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackTails {
    /// Heart-rate tail (timestamp, bpm)
    pub heart_rate: Option<(Timestamp, f64)>,
    /// Cumulative-distance tail (timestamp, meters)
    pub distance: Option<(Timestamp, f64)>,
    /// Cadence tail (timestamp, steps/min)
    pub cadence: Option<(Timestamp, f64)>,
    /// Active-flag tail
    pub active: Option<(Timestamp, bool)>,
    /// Intensity tail
    pub intensity: Option<(Timestamp, Zone)>,
}

/// Fuses all delta tracks into the committed segment timeline
#[derive(Debug)]
pub struct SegmentReconciler {
    heart_rate: DeltaTrack<f64>,
    distance: DeltaTrack<f64>,
    cadence: DeltaTrack<f64>,
    active: DeltaTrack<bool>,
    intensity: DeltaTrack<Zone>,
    classifier: IntensityClassifier,
    timeline: GlobalTimeline,
    committed: Vec<Segment>,
    /// Previous GPS fix, for haversine accumulation
    last_fix: Option<GeoPoint>,
    /// Settled-history boundary; impact points never cross it
    archived_to: Option<Timestamp>,
}

impl SegmentReconciler {
    /// Create an empty reconciler; None means no zone table configured
    pub fn new(zone_table: Option<ZoneTable>) -> Self {
        Self {
            heart_rate: DeltaTrack::new(DeltaKind::Continuous),
            distance: DeltaTrack::new(DeltaKind::Continuous),
            cadence: DeltaTrack::new(DeltaKind::Continuous),
            active: DeltaTrack::new(DeltaKind::Classifying),
            intensity: DeltaTrack::new(DeltaKind::Classifying),
            classifier: IntensityClassifier::new(zone_table),
            timeline: GlobalTimeline::new(),
            committed: Vec::new(),
            last_fix: None,
            archived_to: None,
        }
    }

    /// Replace the zone table (profile max/resting changed)
    pub fn set_zone_table(&mut self, table: Option<ZoneTable>) {
        self.classifier.set_table(table);
    }

    /// Seed the timeline with the session start timestamp
    pub fn origin(&mut self, at: Timestamp) {
        self.timeline.insert(at);
    }

    /// Committed segments, sorted and contiguous
    pub fn committed(&self) -> &[Segment] {
        &self.committed
    }

    /// The global timeline
    pub fn timeline(&self) -> &GlobalTimeline {
        &self.timeline
    }

    /// Newest sample of each track
    pub fn tails(&self) -> TrackTails {
        TrackTails {
            heart_rate: self.heart_rate.tail(),
            distance: self.distance.tail(),
            cadence: self.cadence.tail(),
            active: self.active.tail(),
            intensity: self.intensity.tail(),
        }
    }

    /// Accept one sample event and reconcile
    ///
    /// Emitted actions are appended to `out` in order: rollbacks newest
    /// first, then rollforwards oldest first. Out-of-track-order and
    /// non-finite samples are rejected without touching any state;
    /// rejection is reported by the return value so the session can log
    /// it, never raised further.
    pub fn ingest(&mut self, event: &SampleEvent, out: &mut Vec<SegmentAction>) -> bool {
        let trigger = event.timestamp();
        let accepted = match *event {
            SampleEvent::HeartRate { timestamp, bpm } => self.ingest_heart_rate(timestamp, bpm),
            SampleEvent::Location { timestamp, point } => self.ingest_location(timestamp, point),
            SampleEvent::Motion { timestamp, sample } => {
                if !(sample.confidence.is_finite() && sample.cadence_spm.is_finite()) {
                    false
                } else {
                    self.ingest_motion(timestamp, sample)
                }
            }
        };
        if accepted {
            self.reconcile(trigger, out);
        }
        accepted
    }

    fn ingest_heart_rate(&mut self, timestamp: Timestamp, bpm: f64) -> bool {
        if !bpm.is_finite() {
            return false;
        }
        match self.heart_rate.append(timestamp, bpm) {
            Err(_) => false,
            Ok(AppendOutcome::Anchored) => {
                self.timeline.insert(timestamp);
                true
            }
            Ok(AppendOutcome::Appended(record)) => {
                self.timeline.insert(timestamp);
                let event = self.classifier.classify(&record);
                // A crossing collapsing onto the previous event's
                // timestamp adds no new information
                if self.intensity.append(event.timestamp, event.zone).is_ok() {
                    self.timeline.insert(event.timestamp);
                }
                true
            }
        }
    }

    fn ingest_location(&mut self, timestamp: Timestamp, point: GeoPoint) -> bool {
        if !(point.latitude.is_finite() && point.longitude.is_finite()) {
            return false;
        }
        let cumulative = match self.last_fix {
            Some(prev) => {
                self.distance.last_value().unwrap_or(0.0) + haversine_m(prev, point)
            }
            None => 0.0,
        };
        if self.distance.append(timestamp, cumulative).is_err() {
            return false;
        }
        self.last_fix = Some(point);
        self.timeline.insert(timestamp);
        true
    }

    fn ingest_motion(&mut self, timestamp: Timestamp, sample: MotionSample) -> bool {
        // The active flag only updates on confident classifications;
        // otherwise it holds its previous value
        let active_end = if sample.confidence >= MOTION_CONFIDENCE_MIN {
            sample.state.is_active()
        } else {
            self.active.last_value().unwrap_or(false)
        };
        if self.active.append(timestamp, active_end).is_err() {
            return false;
        }
        // Same timestamp just passed the active track's ordering check
        let _ = self.cadence.append(timestamp, sample.cadence_spm);
        self.timeline.insert(timestamp);
        true
    }

    /// Roll back segments the new data invalidates, then roll forward
    /// from the surviving prefix to the end of the timeline
    fn reconcile(&mut self, trigger: Timestamp, out: &mut Vec<SegmentAction>) {
        let mut impact = trigger;
        for point in [
            self.heart_rate.newest_impacts_after(),
            self.distance.newest_impacts_after(),
            self.cadence.newest_impacts_after(),
            self.active.newest_impacts_after(),
            self.intensity.newest_impacts_after(),
        ]
        .into_iter()
        .flatten()
        {
            impact = impact.min(point);
        }
        if let Some(boundary) = self.archived_to {
            impact = impact.max(boundary);
        }

        // Rollback phase: retract committed segments past the impact
        while let Some(&segment) = self.committed.last() {
            if segment.span.upper <= impact {
                break;
            }
            self.committed.pop();
            out.push(SegmentAction { segment, action: Action::Rollback });
        }

        // Rollforward phase: rebuild from the end of the surviving
        // committed prefix to the end of the timeline
        let stamps = self.timeline.stamps();
        if stamps.len() < 2 {
            return;
        }
        let start = self
            .committed
            .last()
            .and_then(|last| self.timeline.index_of(last.span.upper))
            .unwrap_or(0);
        debug_assert!(self.committed.last().map_or(true, |l| l.span.upper <= impact));
        for i in start..self.timeline.len() - 1 {
            let span = Span::new(self.timeline.stamps()[i], self.timeline.stamps()[i + 1]);
            let segment = self.build_segment(span);
            self.committed.push(segment);
            out.push(SegmentAction { segment, action: Action::Rollforward });
        }
        debug_assert!(self.committed_contiguous());
    }

    /// Resolve one segment's key and value from current track state
    fn build_segment(&self, span: Span) -> Segment {
        let key = Classification {
            active: self.active.value_at(span.lower).unwrap_or(false),
            zone: self
                .intensity
                .value_at(span.lower)
                .unwrap_or_else(|| self.classifier.lowest_zone()),
        };
        let duration_s = span.len_s();
        let distance_m = match (self.distance.value_at(span.lower), self.distance.value_at(span.upper)) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0.0,
        };
        Segment {
            span,
            key,
            value: TotalsDelta {
                duration_s,
                distance_m,
                heartrate_s: Self::mean_over(&self.heart_rate, span) * duration_s,
                cadence_s: Self::mean_over(&self.cadence, span) * duration_s,
            },
        }
    }

    /// Trapezoidal mean of a continuous track over a span; zero while
    /// the track has no data there
    fn mean_over(track: &DeltaTrack<f64>, span: Span) -> f64 {
        match (track.value_at(span.lower), track.value_at(span.upper)) {
            (Some(lo), Some(hi)) => (lo + hi) / 2.0,
            _ => 0.0,
        }
    }

    fn committed_contiguous(&self) -> bool {
        self.committed
            .windows(2)
            .all(|pair| pair[0].span.upper == pair[1].span.lower)
    }

    /// Drop fully settled history at or before `up_to`
    ///
    /// Only segments that end at or before `up_to` are removed; the
    /// boundary then moves to the first surviving segment's start so
    /// tracks and timeline stay aligned with the committed list. Totals
    /// are untouched: they remain whole-session running sums. Callers
    /// must bound `up_to` by the out-of-order tolerance window so no
    /// future sample can impact at or before the boundary.
    pub fn archive(&mut self, up_to: Timestamp) {
        let keep = self
            .committed
            .iter()
            .position(|s| s.span.upper > up_to)
            .unwrap_or(self.committed.len());
        self.committed.drain(..keep);
        let boundary = self.committed.first().map(|s| s.span.lower).unwrap_or(up_to);
        self.timeline.archive(boundary);
        self.heart_rate.archive(boundary);
        self.distance.archive(boundary);
        self.cadence.archive(boundary);
        self.active.archive(boundary);
        self.intensity.archive(boundary);
        self.archived_to = Some(self.archived_to.map_or(boundary, |a| a.max(boundary)));
    }

    /// Clear every track, the timeline, and the committed list
    pub fn clear(&mut self) {
        self.heart_rate.clear();
        self.distance.clear();
        self.cadence.clear();
        self.active.clear();
        self.intensity.clear();
        self.classifier.reset();
        self.timeline.clear();
        self.committed.clear();
        self.last_fix = None;
        self.archived_to = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MotionSample, MotionState};
    use crate::zones::{ZoneBand, ZoneTable};

    fn two_band_table() -> ZoneTable {
        ZoneTable::from_bands(&[
            ZoneBand { zone: Zone::Cold, lower_bpm: 0.0, upper_bpm: 100.0 },
            ZoneBand { zone: Zone::Interval, lower_bpm: 100.0, upper_bpm: 250.0 },
        ])
        .unwrap()
    }

    fn deliver(rec: &mut SegmentReconciler, event: SampleEvent) -> Vec<SegmentAction> {
        let mut out = Vec::new();
        rec.ingest(&event, &mut out);
        out
    }

    fn hr(timestamp: Timestamp, bpm: f64) -> SampleEvent {
        SampleEvent::HeartRate { timestamp, bpm }
    }

    fn motion(timestamp: Timestamp, active: bool, cadence_spm: f64) -> SampleEvent {
        SampleEvent::Motion {
            timestamp,
            sample: MotionSample {
                state: if active { MotionState::Running } else { MotionState::Stationary },
                confidence: 0.9,
                cadence_spm,
            },
        }
    }

    #[test]
    fn empty_timeline_rollforward_is_noop() {
        let mut rec = SegmentReconciler::new(None);
        let actions = deliver(&mut rec, hr(1_000, 80.0));
        assert!(actions.is_empty());
        assert!(rec.committed().is_empty());
    }

    #[test]
    fn consecutive_samples_commit_segments() {
        let mut rec = SegmentReconciler::new(None);
        deliver(&mut rec, hr(0, 80.0));
        let actions = deliver(&mut rec, hr(10_000, 80.0));
        // One segment [0, 10s) plus nothing rolled back
        assert!(actions.iter().all(|a| a.action == Action::Rollforward));
        assert_eq!(rec.committed().len(), 1);
        assert_eq!(rec.committed()[0].span, Span::new(0, 10_000));
        assert_eq!(rec.committed()[0].value.duration_s, 10.0);
        assert_eq!(rec.committed()[0].value.heartrate_s, 800.0);
    }

    #[test]
    fn zone_crossing_splits_segments() {
        let mut rec = SegmentReconciler::new(Some(two_band_table()));
        deliver(&mut rec, hr(0, 80.0));
        deliver(&mut rec, hr(10_000, 80.0));
        deliver(&mut rec, hr(20_000, 160.0));

        let spans: Vec<Span> = rec.committed().iter().map(|s| s.span).collect();
        assert_eq!(
            spans,
            [Span::new(0, 10_000), Span::new(10_000, 12_500), Span::new(12_500, 20_000)]
        );
        let zones: Vec<Zone> = rec.committed().iter().map(|s| s.key.zone).collect();
        assert_eq!(zones, [Zone::Cold, Zone::Cold, Zone::Interval]);
    }

    #[test]
    fn low_confidence_motion_holds_active_flag() {
        let mut rec = SegmentReconciler::new(None);
        deliver(&mut rec, motion(0, true, 170.0));
        let mut out = Vec::new();
        rec.ingest(
            &SampleEvent::Motion {
                timestamp: 5_000,
                sample: MotionSample {
                    state: MotionState::Stationary,
                    confidence: 0.1,
                    cadence_spm: 165.0,
                },
            },
            &mut out,
        );
        deliver(&mut rec, motion(10_000, false, 0.0));

        // [0, 5s) begins active and the low-confidence report held it
        assert!(rec.committed()[0].key.active);
        assert!(rec.committed()[1].key.active);
    }

    #[test]
    fn rejected_sample_changes_nothing() {
        let mut rec = SegmentReconciler::new(None);
        deliver(&mut rec, hr(0, 80.0));
        deliver(&mut rec, hr(10_000, 90.0));
        let before = rec.committed().to_vec();

        let mut out = Vec::new();
        assert!(!rec.ingest(&hr(5_000, 100.0), &mut out));
        assert!(!rec.ingest(&hr(15_000, f64::NAN), &mut out));
        assert!(out.is_empty());
        assert_eq!(rec.committed(), before.as_slice());
    }

    #[test]
    fn archive_drops_settled_prefix_only() {
        let mut rec = SegmentReconciler::new(None);
        for t in [0u64, 10_000, 20_000, 30_000] {
            deliver(&mut rec, hr(t, 100.0));
        }
        assert_eq!(rec.committed().len(), 3);

        rec.archive(15_000);
        // [0,10s) settled and dropped; [10s,20s) straddles and stays
        assert_eq!(rec.committed().len(), 2);
        assert_eq!(rec.committed()[0].span.lower, 10_000);
        assert_eq!(rec.timeline().first(), Some(10_000));

        // Engine keeps extending after archival
        deliver(&mut rec, hr(40_000, 100.0));
        assert_eq!(rec.committed().last().unwrap().span.upper, 40_000);
    }
}
