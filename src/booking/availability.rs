use uuid::Uuid;

use crate::model::{Booking, Interval, Ms};

// ── Availability engine ──────────────────────────────────────────
//
// Pure functions only: booleans and materialized sequences, no errors.
// Error classification happens in the resolver and the scheduler.

/// True iff `candidate` intersects any booking other than `exclude`.
///
/// `exclude` carries the booking's own id on update so a stay can be
/// widened or narrowed over its prior version without self-conflict.
/// Touching endpoints (`a.end == b.start`) are not an overlap — one
/// booking may end exactly when the next begins.
pub fn overlaps(candidate: &Interval, existing: &[Booking], exclude: Option<Uuid>) -> bool {
    existing
        .iter()
        .filter(|b| exclude != Some(b.id))
        .any(|b| candidate.overlaps(&b.interval))
}

/// Gaps between `existing` bookings within `[now, horizon_end)`.
///
/// `existing` must be sorted ascending by start and pairwise disjoint
/// (the per-suite invariant). The result partitions the window together
/// with the bookings: gaps and bookings clamped to the window cover
/// `[now, horizon_end)` exactly once. Degenerate gaps are dropped, and
/// the sweep stops early once a booking reaches the horizon.
pub fn vacant_intervals(existing: &[Interval], now: Ms, horizon_end: Ms) -> Vec<Interval> {
    let mut gaps = Vec::new();
    if now >= horizon_end {
        return gaps;
    }

    let mut cursor = now;
    for b in existing {
        if b.start >= horizon_end {
            break;
        }
        if b.start > cursor {
            gaps.push(Interval::new(cursor, b.start));
        }
        cursor = cursor.max(b.end);
        if cursor >= horizon_end {
            return gaps;
        }
    }

    gaps.push(Interval::new(cursor, horizon_end));
    gaps
}
