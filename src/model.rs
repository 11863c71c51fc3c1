use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Milliseconds since the unix epoch, UTC. All timestamps and
/// durations in the crate use this.
pub type Ms = i64;

pub type SuiteId = i64;
pub type UserId = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;

/// Lookahead for vacant-interval queries: 30 days.
pub const VACANCY_HORIZON_MS: Ms = 720 * HOUR_MS;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as Ms
}

/// Round down to the start of the minute.
pub fn truncate_to_minute(t: Ms) -> Ms {
    t - t.rem_euclid(MINUTE_MS)
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Ms,
    pub end: Ms,
}

impl Interval {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Interval start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Catalog reference data. Owned elsewhere, read-only to this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    pub id: SuiteId,
    pub name: String,
    pub capacity: u32,
}

/// A confirmed stay. One row per booking; per suite, active intervals
/// are pairwise non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: UserId,
    pub suite_id: SuiteId,
    pub interval: Interval,
    /// When the pre-arrival notification becomes due, if one was requested.
    pub notify_at: Option<Ms>,
    pub created_at: Ms,
    pub updated_at: Option<Ms>,
}

/// Create request as it arrives from the API tier. Bounds are raw; the
/// resolver validates them before an `Interval` is ever constructed.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub suite_id: SuiteId,
    pub start: Ms,
    pub end: Ms,
    /// How long before arrival to notify the guest.
    pub notify_before: Option<Ms>,
}

/// Update request. The suite is fixed for the lifetime of a booking;
/// moving a stay is cancel + create. `suite_id` names the suite the
/// booking lives on; a mismatch surfaces as not-found.
#[derive(Debug, Clone)]
pub struct BookingPatch {
    pub id: Uuid,
    pub user_id: UserId,
    pub suite_id: SuiteId,
    pub start: Ms,
    pub end: Ms,
    pub notify_before: Option<Ms>,
}
