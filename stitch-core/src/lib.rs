//! Core reconciliation engine for Stitch
//!
//! Fuses independent, asynchronously arriving sensor streams (heart rate,
//! location, motion/cadence, and a derived training-intensity signal) into
//! a single gap-free, non-overlapping timeline of segments, and keeps
//! running totals per activity/intensity classification consistent under
//! late-arriving data.
//!
//! Key constraints:
//! - Samples are unordered across tracks; each track is ordered internally
//! - Committed output is corrected via symmetric rollback/rollforward,
//!   never by buffering until quiescence
//! - No allocation beyond growing record/segment lists; no blocking
//!
//! ```no_run
//! use stitch_core::{Session, SampleQueue, SegmentAction, QUEUE_CAPACITY};
//!
//! static QUEUE: SampleQueue<QUEUE_CAPACITY> = SampleQueue::new();
//!
//! let mut session = Session::new(&QUEUE, None);
//! session.start(0);
//!
//! // Producers push through the sink from their callback contexts
//! let sink = session.sink();
//! sink.heart_rate(1_000, 92.0);
//!
//! // The serialized processing context drains and reconciles
//! session.process(&mut |action: &SegmentAction| {
//!     println!("{:?} {:?}", action.action, action.segment.span);
//! });
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod constants;
pub mod errors;
pub mod events;
pub mod geo;
pub mod queue;
pub mod reconciler;
pub mod session;
pub mod time;
pub mod totals;
pub mod track;
pub mod zones;

// Public API
pub use constants::QUEUE_CAPACITY;
pub use errors::{SessionError, TrackError};
pub use events::{GeoPoint, MotionSample, MotionState, SampleEvent, Signal};
pub use queue::{QueueStats, SampleQueue};
pub use reconciler::{
    Action, Classification, Segment, SegmentAction, SegmentReconciler, TrackTails,
};
pub use session::{ActionSink, SampleProducer, SampleSink, Session, SessionSnapshot};
pub use time::{GlobalTimeline, Span, Timestamp};
pub use totals::{TotalsAggregator, TotalsDelta, TotalsMap};
pub use track::{DeltaKind, DeltaRecord, DeltaTrack, SignalValue};
pub use zones::{IntensityClassifier, IntensityEvent, Zone, ZoneBand, ZoneTable};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
