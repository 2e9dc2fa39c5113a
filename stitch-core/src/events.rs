//! Raw sample types and the tagged event funneled into the engine
//!
//! Hardware collaborators (heart-rate client, GPS manager, motion
//! manager) each emit `(timestamp, rawValue)` callbacks from their own
//! contexts. The core makes no assumption about callback thread identity;
//! it only requires that everything is eventually delivered, as a
//! `SampleEvent`, to the single serialized processing context. The tagged
//! union replaces implicit callback chains with explicit message passing:
//! one event kind per track, one queue, one consumer loop.
//!
//! Events are small Copy values so pushing from an interrupt-adjacent
//! producer context never allocates.

use crate::time::Timestamp;

/// Identity of a raw sample track, used for routing and logging
///
/// The derived intensity signal never crosses the intake boundary and
/// so has no identity here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Signal {
    /// Heart-rate readings (bpm)
    HeartRate = 0,
    /// Location fixes feeding cumulative distance
    Location = 1,
    /// Motion activity state plus step cadence
    Motion = 2,
}

impl Signal {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Signal::HeartRate => "heart_rate",
            Signal::Location => "location",
            Signal::Motion => "motion",
        }
    }
}

/// One GPS fix
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a fix from degree coordinates
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Motion activity state reported by the motion collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MotionState {
    /// No classified movement
    Stationary = 0,
    /// Walking gait detected
    Walking = 1,
    /// Running gait detected
    Running = 2,
    /// Cycling motion detected
    Cycling = 3,
    /// Classifier produced no usable state
    Unknown = 4,
}

impl MotionState {
    /// Whether this state counts as active for classification purposes
    pub const fn is_active(&self) -> bool {
        matches!(self, MotionState::Walking | MotionState::Running | MotionState::Cycling)
    }
}

/// One motion-manager report: activity state, confidence, step cadence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Classified activity state
    pub state: MotionState,
    /// Classification confidence in [0, 1]
    pub confidence: f64,
    /// Step cadence in steps per minute
    pub cadence_spm: f64,
}

/// Tagged sample event carried by the funnel queue
///
/// One variant per raw track. Intensity events are derived inside the
/// engine and never arrive from outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleEvent {
    /// Heart-rate reading in bpm
    HeartRate {
        /// When the reading was taken
        timestamp: Timestamp,
        /// Beats per minute
        bpm: f64,
    },
    /// Location fix
    Location {
        /// When the fix was taken
        timestamp: Timestamp,
        /// The fix
        point: GeoPoint,
    },
    /// Motion activity report
    Motion {
        /// When the report was produced
        timestamp: Timestamp,
        /// State, confidence, and cadence
        sample: MotionSample,
    },
}

impl SampleEvent {
    /// Get event timestamp
    pub const fn timestamp(&self) -> Timestamp {
        match self {
            SampleEvent::HeartRate { timestamp, .. } => *timestamp,
            SampleEvent::Location { timestamp, .. } => *timestamp,
            SampleEvent::Motion { timestamp, .. } => *timestamp,
        }
    }

    /// Which signal this event belongs to
    pub const fn signal(&self) -> Signal {
        match self {
            SampleEvent::HeartRate { .. } => Signal::HeartRate,
            SampleEvent::Location { .. } => Signal::Location,
            SampleEvent::Motion { .. } => Signal::Motion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_size() {
        // Events travel by value through the queue; keep them lean
        assert!(core::mem::size_of::<SampleEvent>() <= 48);
    }

    #[test]
    fn event_accessors() {
        let hr = SampleEvent::HeartRate { timestamp: 1_000, bpm: 72.0 };
        assert_eq!(hr.timestamp(), 1_000);
        assert_eq!(hr.signal(), Signal::HeartRate);
        assert_eq!(hr.signal().name(), "heart_rate");

        let loc = SampleEvent::Location { timestamp: 2_000, point: GeoPoint::new(47.0, 8.0) };
        assert_eq!(loc.signal().name(), "location");

        let motion = SampleEvent::Motion {
            timestamp: 3_000,
            sample: MotionSample {
                state: MotionState::Walking,
                confidence: 0.8,
                cadence_spm: 110.0,
            },
        };
        assert_eq!(motion.signal().name(), "motion");
    }

    #[test]
    fn motion_state_activity() {
        assert!(MotionState::Running.is_active());
        assert!(MotionState::Cycling.is_active());
        assert!(!MotionState::Stationary.is_active());
        assert!(!MotionState::Unknown.is_active());
    }
}
