//! Training-intensity zones and the heart-rate intensity classifier
//!
//! The classifier consumes each newly appended heart-rate delta record
//! and emits one `IntensityEvent` per record: either a hold at the
//! record's upper timestamp, or a zone change at a linearly interpolated
//! crossing timestamp inside the span. Events feed their own classifying
//! `DeltaTrack` exactly like a raw signal.
//!
//! Zone boundaries come from the profile collaborator and are recomputed
//! whenever max/resting heart rate changes. Absence of the table is a
//! valid degraded state: the classifier then always reports the lowest
//! zone.
//!
//! Crossing tie-break: when a record crosses out of the previously
//! emitted zone, the crossing threshold is the boundary of that previous
//! zone nearer to it (its upper edge going up, lower edge going down).
//! Adjacent zones share an edge, and anchoring the threshold to the
//! previous zone keeps attribution stable when readings hover on the
//! shared boundary. The precise behavior affects per-zone duration
//! attribution; do not replace it with a different hysteresis.

use heapless::Vec;

use crate::constants::{zone_reserve, MAX_ZONE_BANDS};
use crate::time::Timestamp;
use crate::track::{DeltaRecord, SignalValue};

/// Training-intensity zone, coldest to hottest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Zone {
    /// Below every training band
    #[default]
    Cold = 0,
    /// Recovery / easy effort
    Easy = 1,
    /// Aerobic endurance
    Moderate = 2,
    /// Tempo / threshold effort
    Hard = 3,
    /// Anaerobic interval effort
    Interval = 4,
}

impl Zone {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Zone::Cold => "cold",
            Zone::Easy => "easy",
            Zone::Moderate => "moderate",
            Zone::Hard => "hard",
            Zone::Interval => "interval",
        }
    }
}

impl SignalValue for Zone {}

/// One contiguous heart-rate band mapped to a zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBand {
    /// Zone this band maps to
    pub zone: Zone,
    /// Inclusive lower bound in bpm
    pub lower_bpm: f64,
    /// Exclusive upper bound in bpm
    pub upper_bpm: f64,
}

/// Ordered table of contiguous zone bands
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    bands: Vec<ZoneBand, MAX_ZONE_BANDS>,
}

impl ZoneTable {
    /// Build a table from explicit bands
    ///
    /// Bands must be sorted ascending by lower bound and non-overlapping;
    /// returns None otherwise, or when more bands are given than fit.
    pub fn from_bands(bands: &[ZoneBand]) -> Option<Self> {
        let mut table = Self { bands: Vec::new() };
        for band in bands {
            if band.upper_bpm <= band.lower_bpm {
                return None;
            }
            if let Some(prev) = table.bands.last() {
                if band.lower_bpm < prev.upper_bpm {
                    return None;
                }
            }
            table.bands.push(*band).ok()?;
        }
        Some(table)
    }

    /// Build the default five-band table from a heart-rate profile
    ///
    /// Zone floors sit at fixed fractions of heart-rate reserve
    /// (Karvonen): `resting + fraction * (max - resting)`.
    pub fn from_heart_rate_profile(resting_bpm: f64, max_bpm: f64) -> Option<Self> {
        if !(resting_bpm < max_bpm) || resting_bpm <= 0.0 {
            return None;
        }
        let reserve = max_bpm - resting_bpm;
        let floor = |fraction: f64| resting_bpm + fraction * reserve;
        Self::from_bands(&[
            ZoneBand { zone: Zone::Cold, lower_bpm: 0.0, upper_bpm: floor(zone_reserve::EASY_FLOOR) },
            ZoneBand {
                zone: Zone::Easy,
                lower_bpm: floor(zone_reserve::EASY_FLOOR),
                upper_bpm: floor(zone_reserve::MODERATE_FLOOR),
            },
            ZoneBand {
                zone: Zone::Moderate,
                lower_bpm: floor(zone_reserve::MODERATE_FLOOR),
                upper_bpm: floor(zone_reserve::HARD_FLOOR),
            },
            ZoneBand {
                zone: Zone::Hard,
                lower_bpm: floor(zone_reserve::HARD_FLOOR),
                upper_bpm: floor(zone_reserve::INTERVAL_FLOOR),
            },
            ZoneBand {
                zone: Zone::Interval,
                lower_bpm: floor(zone_reserve::INTERVAL_FLOOR),
                upper_bpm: zone_reserve::CEILING_BPM,
            },
        ])
    }

    /// Zone covering the given heart rate, if any
    pub fn zone_for(&self, bpm: f64) -> Option<Zone> {
        self.bands
            .iter()
            .find(|b| bpm >= b.lower_bpm && bpm < b.upper_bpm)
            .map(|b| b.zone)
    }

    /// Band of a zone, if present in the table
    pub fn band_of(&self, zone: Zone) -> Option<&ZoneBand> {
        self.bands.iter().find(|b| b.zone == zone)
    }

    /// Position of a zone within the table's ascending order
    fn index_of(&self, zone: Zone) -> Option<usize> {
        self.bands.iter().position(|b| b.zone == zone)
    }

    /// Lowest configured zone
    pub fn lowest(&self) -> Zone {
        self.bands.first().map(|b| b.zone).unwrap_or_default()
    }
}

/// Zone-change event derived from a heart-rate delta record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntensityEvent {
    /// When the zone takes effect
    pub timestamp: Timestamp,
    /// Zone in effect from this timestamp
    pub zone: Zone,
}

/// Derives intensity events from heart-rate delta records
#[derive(Debug, Clone, Default)]
pub struct IntensityClassifier {
    table: Option<ZoneTable>,
    prev: Option<Zone>,
}

impl IntensityClassifier {
    /// Create a classifier; None means no personalization data yet
    pub fn new(table: Option<ZoneTable>) -> Self {
        Self { table, prev: None }
    }

    /// Replace the zone table (profile max/resting changed)
    pub fn set_table(&mut self, table: Option<ZoneTable>) {
        self.table = table;
    }

    /// Forget the previously emitted zone (session restart)
    pub fn reset(&mut self) {
        self.prev = None;
    }

    /// Lowest zone of the configured table, or the default zone without one
    pub fn lowest_zone(&self) -> Zone {
        self.table.as_ref().map(ZoneTable::lowest).unwrap_or_default()
    }

    /// Classify one newly appended heart-rate record
    ///
    /// Always emits exactly one event. With no table configured the
    /// event holds the lowest/default zone at the record's end.
    pub fn classify(&mut self, record: &DeltaRecord<f64>) -> IntensityEvent {
        let event = self.classify_inner(record);
        self.prev = Some(event.zone);
        event
    }

    fn classify_inner(&self, record: &DeltaRecord<f64>) -> IntensityEvent {
        let table = match &self.table {
            Some(t) => t,
            None => {
                return IntensityEvent {
                    timestamp: record.span.upper,
                    zone: Zone::default(),
                }
            }
        };

        let begin_zone = table.zone_for(record.begin);
        let end_zone = table.zone_for(record.end);
        let held = begin_zone.or(self.prev).unwrap_or_else(|| table.lowest());

        match (begin_zone, end_zone) {
            (Some(b), Some(e)) if b != e => {
                let prev = self.prev.unwrap_or(b);
                let ascending = table.index_of(e) > table.index_of(b);
                // The boundary of the previous zone nearer to it: its
                // upper edge when climbing, lower edge when descending.
                let threshold = match table.band_of(prev) {
                    Some(band) if ascending => band.upper_bpm,
                    Some(band) => band.lower_bpm,
                    // Previous zone absent from a reconfigured table:
                    // fall back to the entered zone's near edge
                    None => {
                        let band = table.band_of(e).expect("end zone resolved from table");
                        if ascending {
                            band.lower_bpm
                        } else {
                            band.upper_bpm
                        }
                    }
                };
                let p = ((threshold - record.begin) / (record.end - record.begin)).clamp(0.0, 1.0);
                let offset = libm::round(record.span.len_ms() as f64 * p) as u64;
                IntensityEvent {
                    timestamp: record.span.lower + offset,
                    zone: e,
                }
            }
            _ => IntensityEvent {
                timestamp: record.span.upper,
                zone: end_zone.unwrap_or(held),
            },
        }
    }
}
