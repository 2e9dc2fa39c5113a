//! Named constants for the reconciliation engine
//!
//! Tuning values live here rather than inline so the relationship between
//! queue sizing, archival tolerance, and classification capacity stays
//! visible in one place.

/// Capacity of the sample funnel queue (events)
///
/// Must be a power of two. Human-scale sensor cadences are a few Hz per
/// track, so 64 covers several seconds of backlog between drains.
pub const QUEUE_CAPACITY: usize = 64;

/// Maximum distinct classification keys in the totals map
///
/// Two activity states times the zone count, rounded up to a power of two
/// as required by the index map.
pub const MAX_CLASSIFICATIONS: usize = 16;

/// Maximum zone bands in a configured zone table
pub const MAX_ZONE_BANDS: usize = 8;

/// Mean Earth radius in meters (WGS-84), used by the haversine distance
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Minimum motion-classification confidence for the active flag to update
///
/// Below this the active track holds its previous value rather than
/// flapping on low-confidence reports.
pub const MOTION_CONFIDENCE_MIN: f64 = 0.5;

/// Maximum cross-track arrival skew the engine must tolerate
///
/// Archival is clamped so that no sample arriving within this window can
/// have an impact point at or before an already-archived time.
pub const OUT_OF_ORDER_TOLERANCE_MS: u64 = 30_000;

/// Milliseconds per second, for duration conversions
pub const MS_PER_SEC: f64 = 1_000.0;

/// Default heart-rate zone floors as fractions of heart-rate reserve
///
/// Karvonen-style boundaries: a zone begins at
/// `resting + fraction * (max - resting)`.
pub mod zone_reserve {
    /// Easy zone floor (fraction of reserve)
    pub const EASY_FLOOR: f64 = 0.60;
    /// Moderate zone floor
    pub const MODERATE_FLOOR: f64 = 0.70;
    /// Hard zone floor
    pub const HARD_FLOOR: f64 = 0.80;
    /// Interval zone floor
    pub const INTERVAL_FLOOR: f64 = 0.90;
    /// Ceiling applied to the top band (bpm)
    pub const CEILING_BPM: f64 = 250.0;
}
