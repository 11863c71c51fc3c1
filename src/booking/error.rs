use uuid::Uuid;

use crate::model::{Ms, SuiteId};

/// Failure reported by a Booking Store or Suite Catalog implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Zero rows affected: target absent or not owned by the caller.
    NotFound,
    /// Connection or transaction failure. Retryable by the caller.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "no rows affected"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
pub enum BookingError {
    /// `start >= end`.
    InvalidInterval { start: Ms, end: Ms },
    /// A bound is already behind `now`.
    BoundInPast { bound: Ms, now: Ms },
    /// Notification period must be a positive duration.
    InvalidNotifyPeriod(Ms),
    /// Suite is not in the catalog.
    UnknownSuite(SuiteId),
    /// The requested interval overlaps an existing booking. Terminal;
    /// resubmit with a different interval.
    Conflict(SuiteId),
    /// Booking absent or owned by another user. Terminal.
    NotFound(Uuid),
    /// Transient store failure, surfaced for the caller to retry.
    Store(StoreError),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: [{start}, {end})")
            }
            BookingError::BoundInPast { bound, now } => {
                write!(f, "interval bound {bound} is in the past (now: {now})")
            }
            BookingError::InvalidNotifyPeriod(d) => {
                write!(f, "notification period must be positive, got {d}ms")
            }
            BookingError::UnknownSuite(id) => write!(f, "unknown suite: {id}"),
            BookingError::Conflict(suite_id) => {
                write!(f, "interval overlaps an existing booking on suite {suite_id}")
            }
            BookingError::NotFound(id) => write!(f, "booking not found: {id}"),
            BookingError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        BookingError::Store(e)
    }
}
