//! Error types for the reconciliation engine
//!
//! The engine never surfaces an error to its consumers: out-of-order
//! samples are rejected locally, missing classification data degrades to
//! documented defaults, and invariant violations are debug assertions.
//! These types exist at the internal seams so rejections carry enough
//! context to log, and stay small Copy values since they travel through
//! hot append paths.

use crate::time::Timestamp;
use thiserror_no_std::Error;

/// Errors raised by a single delta track
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum TrackError {
    /// Sample is not strictly after the track's last known sample
    ///
    /// Ordering violations within one track are rejected silently at the
    /// session boundary; only cross-track arrival is unordered.
    #[error("sample at {got} is not after last sample at {last}")]
    OutOfOrder {
        /// Timestamp of the track's newest sample
        last: Timestamp,
        /// Timestamp of the rejected sample
        got: Timestamp,
    },

    /// Sample value is NaN or infinite
    #[error("sample value is not a finite number")]
    NonFinite,
}

/// Errors raised by the session lifecycle
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SessionError {
    /// A sample was delivered before `start` was called
    #[error("session is not running")]
    NotRunning,

    /// A sample was delivered after the session stopped
    #[error("sample at {at} arrived after stop at {stopped}")]
    AfterStop {
        /// Timestamp of the dropped sample
        at: Timestamp,
        /// When the session stopped
        stopped: Timestamp,
    },

    /// A sample predates the session start
    #[error("sample at {at} predates start at {started}")]
    BeforeStart {
        /// Timestamp of the dropped sample
        at: Timestamp,
        /// When the session started
        started: Timestamp,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for TrackError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::OutOfOrder { last, got } => {
                defmt::write!(fmt, "sample {} not after {}", got, last)
            }
            Self::NonFinite => defmt::write!(fmt, "non-finite sample"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotRunning => defmt::write!(fmt, "session not running"),
            Self::AfterStop { at, stopped } => {
                defmt::write!(fmt, "sample {} after stop {}", at, stopped)
            }
            Self::BeforeStart { at, started } => {
                defmt::write!(fmt, "sample {} before start {}", at, started)
            }
        }
    }
}
