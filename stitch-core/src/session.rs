//! Workout session lifecycle and engine driver
//!
//! ## Overview
//!
//! A `Session` owns the reconciler and the totals aggregator and drives
//! them from a [`SampleQueue`]: sensor callbacks push events through a
//! [`SampleSink`], and the engine thread calls [`Session::process`] to
//! drain and deliver them. Every committed-segment action is applied to
//! the totals before being forwarded to the caller's [`ActionSink`], so
//! observers always see totals consistent with the action they are
//! handling.
//!
//! ## Lifecycle
//!
//! Idle until [`Session::start`], which fixes the timeline origin.
//! Samples stamped before the start or after the stop are rejected;
//! stragglers that arrive after [`Session::stop`] but are stamped inside
//! the session window are still reconciled, since sensors flush
//! asynchronously.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

use crate::constants::OUT_OF_ORDER_TOLERANCE_MS;
use crate::errors::SessionError;
use crate::events::{GeoPoint, MotionSample, SampleEvent};
use crate::queue::SampleQueue;
use crate::reconciler::{
    Classification, Segment, SegmentAction, SegmentReconciler, TrackTails,
};
use crate::time::Timestamp;
use crate::totals::{TotalsAggregator, TotalsDelta, TotalsMap};
use crate::zones::ZoneTable;

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}
#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}
#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Receives committed-segment actions as they are emitted
///
/// Any closure taking the action by reference qualifies; pass
/// `|_: &SegmentAction| {}` when nobody listens.
pub trait ActionSink {
    /// Handle one rollforward or rollback
    fn on_action(&mut self, action: &SegmentAction);
}

impl<F: FnMut(&SegmentAction)> ActionSink for F {
    fn on_action(&mut self, action: &SegmentAction) {
        self(action)
    }
}

/// Producer-side handle for pushing samples into a session's queue
///
/// Copyable so each sensor callback can hold its own.
pub struct SampleSink<'q, const N: usize> {
    queue: &'q SampleQueue<N>,
}

impl<'q, const N: usize> Clone for SampleSink<'q, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'q, const N: usize> Copy for SampleSink<'q, N> {}

impl<'q, const N: usize> SampleSink<'q, N> {
    /// Queue a heart-rate reading; false when the queue is full
    pub fn heart_rate(&self, timestamp: Timestamp, bpm: f64) -> bool {
        self.queue.push(SampleEvent::HeartRate { timestamp, bpm })
    }

    /// Queue a GPS fix; false when the queue is full
    pub fn location(&self, timestamp: Timestamp, point: GeoPoint) -> bool {
        self.queue.push(SampleEvent::Location { timestamp, point })
    }

    /// Queue a motion classification; false when the queue is full
    pub fn motion(&self, timestamp: Timestamp, sample: MotionSample) -> bool {
        self.queue.push(SampleEvent::Motion { timestamp, sample })
    }
}

/// A sensor adapter that can be wired to a session's intake
pub trait SampleProducer<const N: usize> {
    /// Hand the producer its sink; called once at wiring time
    fn attach(&mut self, sink: SampleSink<'static, N>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Running { started: Timestamp },
    Stopped { started: Timestamp, stopped: Timestamp },
}

/// Read-only snapshot of engine state for persistence or UI hand-off
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionSnapshot {
    /// Grouped running totals as (key, value) pairs
    pub totals: Vec<(Classification, TotalsDelta)>,
    /// Currently committed segments, sorted and contiguous
    pub committed: Vec<Segment>,
    /// Newest sample of each track
    pub tails: TrackTails,
}

/// Workout session: sample intake, reconciliation, and running totals
pub struct Session<'q, const N: usize> {
    queue: &'q SampleQueue<N>,
    reconciler: SegmentReconciler,
    totals: TotalsAggregator,
    state: SessionState,
    /// Reused per-delivery action buffer
    scratch: Vec<SegmentAction>,
}

impl<'q, const N: usize> Session<'q, N> {
    /// Create an idle session over the given intake queue
    pub fn new(queue: &'q SampleQueue<N>, zone_table: Option<ZoneTable>) -> Self {
        Self {
            queue,
            reconciler: SegmentReconciler::new(zone_table),
            totals: TotalsAggregator::new(),
            state: SessionState::Idle,
            scratch: Vec::new(),
        }
    }

    /// Producer-side handle for sensor callbacks
    pub fn sink(&self) -> SampleSink<'q, N> {
        SampleSink { queue: self.queue }
    }

    /// Replace the zone table (heart-rate profile changed)
    pub fn set_zone_table(&mut self, table: Option<ZoneTable>) {
        self.reconciler.set_zone_table(table);
    }

    /// Begin tracking; `at` becomes the timeline origin
    ///
    /// Any previous session's state is discarded.
    pub fn start(&mut self, at: Timestamp) {
        self.reconciler.clear();
        self.totals.reset();
        self.reconciler.origin(at);
        self.state = SessionState::Running { started: at };
        log_debug!("session started at {}", at);
    }

    /// Stop tracking at `at`
    ///
    /// Samples stamped after `at` are rejected from now on; stragglers
    /// stamped inside the window keep reconciling as they drain.
    pub fn stop(&mut self, at: Timestamp) {
        if let SessionState::Running { started } = self.state {
            self.state = SessionState::Stopped { started, stopped: at };
            log_debug!("session stopped at {}", at);
        }
    }

    /// Drain the intake queue, reconciling every sample
    ///
    /// Returns how many samples were delivered. Rejections (out of
    /// lifecycle window, out of per-track order, non-finite payloads)
    /// are logged and skipped; they never poison the stream.
    pub fn process(&mut self, sink: &mut dyn ActionSink) -> usize {
        let mut accepted = 0;
        while let Some(event) = self.queue.pop() {
            match self.deliver(&event, sink) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    log_warn!("dropping {} sample at {}: {}", event.signal().name(), event.timestamp(), err);
                    let _ = err;
                }
            }
        }
        accepted
    }

    /// Deliver one sample directly, bypassing the queue
    ///
    /// Useful for replay and for hosts with their own transport.
    pub fn deliver(
        &mut self,
        event: &SampleEvent,
        sink: &mut dyn ActionSink,
    ) -> Result<(), SessionError> {
        let at = event.timestamp();
        match self.state {
            SessionState::Idle => return Err(SessionError::NotRunning),
            SessionState::Running { started } => {
                if at < started {
                    return Err(SessionError::BeforeStart { at, started });
                }
            }
            SessionState::Stopped { started, stopped } => {
                if at < started {
                    return Err(SessionError::BeforeStart { at, started });
                }
                if at > stopped {
                    return Err(SessionError::AfterStop { at, stopped });
                }
            }
        }

        self.scratch.clear();
        if !self.reconciler.ingest(event, &mut self.scratch) {
            // Per-track ordering or payload rejection; reconciler state
            // is untouched
            log_warn!("rejected {} sample at {}", event.signal().name(), at);
            return Ok(());
        }
        for action in &self.scratch {
            self.totals.apply(action);
            sink.on_action(action);
        }
        Ok(())
    }

    /// Classification-keyed running totals
    pub fn totals(&self) -> &TotalsMap {
        self.totals.totals()
    }

    /// Currently committed segments
    pub fn committed(&self) -> &[Segment] {
        self.reconciler.committed()
    }

    /// Release settled history at or before `up_to`
    ///
    /// The boundary is clamped to stay at least the out-of-order
    /// tolerance behind the newest timeline entry, so no sample the
    /// engine still accepts can impact archived time. Totals are
    /// unaffected.
    pub fn archive(&mut self, up_to: Timestamp) {
        let Some(newest) = self.reconciler.timeline().last() else {
            return;
        };
        let bound = newest.saturating_sub(OUT_OF_ORDER_TOLERANCE_MS);
        self.reconciler.archive(up_to.min(bound));
    }

    /// Snapshot totals, committed segments, and track tails
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            totals: self
                .totals
                .totals()
                .iter()
                .map(|(k, v)| (*k, *v))
                .collect(),
            committed: self.reconciler.committed().to_vec(),
            tails: self.reconciler.tails(),
        }
    }

    /// Whether the session is currently accepting live samples
    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Action;

    fn hr(timestamp: Timestamp, bpm: f64) -> SampleEvent {
        SampleEvent::HeartRate { timestamp, bpm }
    }

    fn ignore(_: &SegmentAction) {}

    #[test]
    fn idle_session_rejects_samples() {
        let queue = SampleQueue::<16>::new();
        let mut session = Session::new(&queue, None);
        assert_eq!(
            session.deliver(&hr(0, 100.0), &mut ignore),
            Err(SessionError::NotRunning)
        );
    }

    #[test]
    fn lifecycle_window_filters() {
        let queue = SampleQueue::<16>::new();
        let mut session = Session::new(&queue, None);
        session.start(10_000);

        assert_eq!(
            session.deliver(&hr(5_000, 100.0), &mut ignore),
            Err(SessionError::BeforeStart { at: 5_000, started: 10_000 })
        );
        assert!(session.deliver(&hr(10_000, 100.0), &mut ignore).is_ok());

        session.stop(30_000);
        // Straggler inside the window still lands
        assert!(session.deliver(&hr(20_000, 110.0), &mut ignore).is_ok());
        assert_eq!(
            session.deliver(&hr(31_000, 110.0), &mut ignore),
            Err(SessionError::AfterStop { at: 31_000, stopped: 30_000 })
        );
    }

    #[test]
    fn process_drains_queue_and_feeds_totals() {
        let queue = SampleQueue::<16>::new();
        let mut session = Session::new(&queue, None);
        session.start(0);

        let sink = session.sink();
        assert!(sink.heart_rate(0, 100.0));
        assert!(sink.heart_rate(10_000, 100.0));

        let mut seen = 0usize;
        let mut observer = |action: &SegmentAction| {
            assert_eq!(action.action, Action::Rollforward);
            seen += 1;
        };
        assert_eq!(session.process(&mut observer), 2);
        assert_eq!(seen, 1);

        let total: f64 = session.totals().values().map(|v| v.duration_s).sum();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn start_discards_previous_session() {
        let queue = SampleQueue::<16>::new();
        let mut session = Session::new(&queue, None);
        session.start(0);
        session.deliver(&hr(0, 100.0), &mut ignore).unwrap();
        session.deliver(&hr(10_000, 100.0), &mut ignore).unwrap();
        assert_eq!(session.committed().len(), 1);

        session.start(50_000);
        assert!(session.committed().is_empty());
        assert!(session.totals().is_empty());
    }

    #[test]
    fn archive_clamps_to_tolerance_window() {
        let queue = SampleQueue::<16>::new();
        let mut session = Session::new(&queue, None);
        session.start(0);
        for t in (0..=60_000).step_by(10_000) {
            session.deliver(&hr(t, 100.0), &mut ignore).unwrap();
        }
        assert_eq!(session.committed().len(), 6);

        // Newest entry 60s, tolerance 30s: boundary clamps to 30s
        session.archive(55_000);
        assert_eq!(session.committed().first().map(|s| s.span.lower), Some(30_000));

        // Totals remain whole-session sums
        let total: f64 = session.totals().values().map(|v| v.duration_s).sum();
        assert_eq!(total, 60.0);
    }

    #[test]
    fn snapshot_reflects_state() {
        let queue = SampleQueue::<16>::new();
        let mut session = Session::new(&queue, None);
        session.start(0);
        session.deliver(&hr(0, 100.0), &mut ignore).unwrap();
        session.deliver(&hr(10_000, 120.0), &mut ignore).unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.committed.len(), 1);
        assert_eq!(snap.tails.heart_rate, Some((10_000, 120.0)));
        assert_eq!(snap.totals.len(), 1);
    }
}
