//! Property tests for arrival-order independence
//!
//! The engine's central promise: for fixed per-track sample schedules,
//! the committed segment list converges to the same partition no matter
//! how arrivals from different tracks interleave, and the grouped
//! totals always equal the grouped sum of the committed list, after
//! every single delivery.

use proptest::prelude::*;

use stitch_core::{
    Classification, GeoPoint, MotionSample, MotionState, SampleEvent, Segment, SegmentAction,
    SegmentReconciler, TotalsAggregator, TotalsDelta, ZoneTable,
};

const EPS: f64 = 1e-6;

fn zone_table() -> ZoneTable {
    ZoneTable::from_heart_rate_profile(60.0, 190.0).expect("valid profile")
}

/// Strictly increasing timestamps in whole seconds
fn stamps(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(1u64..120, 0..max_len)
        .prop_map(|set| set.into_iter().map(|s| s * 1_000).collect())
}

fn hr_schedule() -> impl Strategy<Value = Vec<SampleEvent>> {
    stamps(8).prop_flat_map(|ts| {
        let n = ts.len();
        (Just(ts), prop::collection::vec(60.0f64..200.0, n))
    })
    .prop_map(|(ts, bpm)| {
        ts.into_iter()
            .zip(bpm)
            .map(|(timestamp, bpm)| SampleEvent::HeartRate { timestamp, bpm })
            .collect()
    })
}

fn location_schedule() -> impl Strategy<Value = Vec<SampleEvent>> {
    stamps(6).prop_flat_map(|ts| {
        let n = ts.len();
        (
            Just(ts),
            prop::collection::vec((-0.01f64..0.01, -0.01f64..0.01), n),
        )
    })
    .prop_map(|(ts, offsets)| {
        ts.into_iter()
            .zip(offsets)
            .map(|(timestamp, (d_lat, d_lon))| SampleEvent::Location {
                timestamp,
                point: GeoPoint::new(47.0 + d_lat, 8.0 + d_lon),
            })
            .collect()
    })
}

fn motion_schedule() -> impl Strategy<Value = Vec<SampleEvent>> {
    stamps(6).prop_flat_map(|ts| {
        let n = ts.len();
        (
            Just(ts),
            prop::collection::vec((any::<bool>(), 0.0f64..1.0, 0.0f64..200.0), n),
        )
    })
    .prop_map(|(ts, payloads)| {
        ts.into_iter()
            .zip(payloads)
            .map(|(timestamp, (moving, confidence, cadence_spm))| SampleEvent::Motion {
                timestamp,
                sample: MotionSample {
                    state: if moving { MotionState::Running } else { MotionState::Stationary },
                    confidence,
                    cadence_spm,
                },
            })
            .collect()
    })
}

type Schedules = (Vec<SampleEvent>, Vec<SampleEvent>, Vec<SampleEvent>);

/// Fixed schedules plus two independent interleavings of them
fn schedules_with_orders() -> impl Strategy<Value = (Schedules, Vec<u8>, Vec<u8>)> {
    (hr_schedule(), location_schedule(), motion_schedule()).prop_flat_map(|(hr, loc, motion)| {
        let mut tags = Vec::new();
        tags.extend(core::iter::repeat(0u8).take(hr.len()));
        tags.extend(core::iter::repeat(1u8).take(loc.len()));
        tags.extend(core::iter::repeat(2u8).take(motion.len()));
        (
            Just((hr, loc, motion)),
            Just(tags.clone()).prop_shuffle(),
            Just(tags).prop_shuffle(),
        )
    })
}

fn grouped_duration(committed: &[Segment], key: &Classification) -> f64 {
    committed
        .iter()
        .filter(|s| s.key == *key)
        .map(|s| s.value.duration_s)
        .sum()
}

fn grouped_distance(committed: &[Segment], key: &Classification) -> f64 {
    committed
        .iter()
        .filter(|s| s.key == *key)
        .map(|s| s.value.distance_m)
        .sum()
}

/// Deliver every sample in the given interleaving, checking the
/// partition and totals invariants after each one
fn run(schedules: &Schedules, order: &[u8]) -> (Vec<Segment>, Vec<(Classification, TotalsDelta)>) {
    let mut reconciler = SegmentReconciler::new(Some(zone_table()));
    reconciler.origin(0);
    let mut totals = TotalsAggregator::new();
    let mut cursors = [0usize; 3];
    let mut actions: Vec<SegmentAction> = Vec::new();

    for &tag in order {
        let track = match tag {
            0 => &schedules.0,
            1 => &schedules.1,
            _ => &schedules.2,
        };
        let event = track[cursors[tag as usize]];
        cursors[tag as usize] += 1;

        actions.clear();
        assert!(reconciler.ingest(&event, &mut actions), "in-order schedules never reject");
        for action in &actions {
            totals.apply(action);
        }

        // Partition: contiguous, gap-free, spanning the whole timeline
        let committed = reconciler.committed();
        for pair in committed.windows(2) {
            assert_eq!(pair[0].span.upper, pair[1].span.lower);
        }
        if let Some(first) = committed.first() {
            assert_eq!(first.span.lower, 0);
        }
        if let Some(last) = committed.last() {
            assert_eq!(Some(last.span.upper), reconciler.timeline().last());
        }

        // Totals are always the grouped sum of the committed list
        for (key, total) in totals.totals() {
            assert!((total.duration_s - grouped_duration(committed, key)).abs() < EPS);
            assert!((total.distance_m - grouped_distance(committed, key)).abs() < EPS);
        }
    }

    let pairs = totals.totals().iter().map(|(k, v)| (*k, *v)).collect();
    (reconciler.committed().to_vec(), pairs)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn committed_list_is_arrival_order_independent(
        (schedules, order_a, order_b) in schedules_with_orders()
    ) {
        let (committed_a, totals_a) = run(&schedules, &order_a);
        let (committed_b, totals_b) = run(&schedules, &order_b);

        // Rebuilt from identical final track states: exactly equal
        prop_assert_eq!(committed_a, committed_b);

        // Totals accumulate in different orders; compare with epsilon
        for (key, value) in &totals_a {
            let other = totals_b
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| *v)
                .unwrap_or(TotalsDelta::ZERO);
            prop_assert!((value.duration_s - other.duration_s).abs() < EPS);
            prop_assert!((value.distance_m - other.distance_m).abs() < EPS);
            prop_assert!((value.heartrate_s - other.heartrate_s).abs() < EPS);
            prop_assert!((value.cadence_s - other.cadence_s).abs() < EPS);
        }
    }

    #[test]
    fn replaying_a_schedule_is_idempotent(
        (schedules, order, _unused) in schedules_with_orders()
    ) {
        let (committed_once, _) = run(&schedules, &order);

        // Second delivery of every sample is a per-track duplicate and
        // must change nothing
        let mut reconciler = SegmentReconciler::new(Some(zone_table()));
        reconciler.origin(0);
        let mut actions = Vec::new();
        let mut cursors = [0usize; 3];
        for &tag in &order {
            let track = match tag {
                0 => &schedules.0,
                1 => &schedules.1,
                _ => &schedules.2,
            };
            let event = track[cursors[tag as usize]];
            cursors[tag as usize] += 1;
            actions.clear();
            reconciler.ingest(&event, &mut actions);
        }
        for event in schedules.0.iter().chain(&schedules.1).chain(&schedules.2) {
            actions.clear();
            prop_assert!(!reconciler.ingest(event, &mut actions));
            prop_assert!(actions.is_empty());
        }
        prop_assert_eq!(reconciler.committed(), committed_once.as_slice());
    }
}
