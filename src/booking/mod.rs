mod availability;
mod error;
mod store;
mod validate;

pub use availability::{overlaps, vacant_intervals};
pub use error::{BookingError, StoreError};
pub use store::{BookingStore, BookingTx, MemoryCatalog, MemoryStore, SuiteCatalog};

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::model::{
    Booking, BookingPatch, Interval, NewBooking, Suite, SuiteId, UserId, now_ms,
    VACANCY_HORIZON_MS,
};
use crate::observability;

use validate::validate_stay;

/// The conflict resolver. Every booking write goes through here:
/// validate, then re-check availability inside the store's unit of work,
/// then commit — or abort by dropping the transaction. The store and
/// catalog are injected; no package-level state.
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn SuiteCatalog>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, catalog: Arc<dyn SuiteCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Book a stay. Exactly one of two concurrent overlapping requests
    /// on the same suite can succeed: the transaction holds the suite's
    /// row-set exclusively from the overlap read to the committed write.
    pub async fn create(&self, draft: NewBooking) -> Result<Booking, BookingError> {
        let now = now_ms();
        let stay = validate_stay(draft.start, draft.end, draft.notify_before, now)?;
        if self.catalog.get(draft.suite_id).await?.is_none() {
            return Err(BookingError::UnknownSuite(draft.suite_id));
        }

        let mut tx = self.store.begin(draft.suite_id).await?;
        let existing = tx.find_overlapping(stay.interval, None).await?;
        if overlaps(&stay.interval, &existing, None) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            // Dropping the tx aborts it — nothing was staged.
            return Err(BookingError::Conflict(draft.suite_id));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            suite_id: draft.suite_id,
            interval: stay.interval,
            notify_at: stay.notify_at,
            created_at: now,
            updated_at: None,
        };
        tx.insert(booking.clone()).await?;
        tx.commit().await?;

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(booking_id = %booking.id, suite_id = booking.suite_id, "booking created");
        Ok(booking)
    }

    /// Rewrite a booking's interval and notification period. The check
    /// excludes the booking's own row, so a stay can be widened or
    /// narrowed over itself.
    pub async fn update(&self, patch: BookingPatch) -> Result<(), BookingError> {
        let now = now_ms();
        let stay = validate_stay(patch.start, patch.end, patch.notify_before, now)?;

        let mut tx = self.store.begin(patch.suite_id).await?;
        let existing = tx.find_overlapping(stay.interval, Some(patch.id)).await?;
        if overlaps(&stay.interval, &existing, Some(patch.id)) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(BookingError::Conflict(patch.suite_id));
        }

        let row = Booking {
            id: patch.id,
            user_id: patch.user_id,
            suite_id: patch.suite_id,
            interval: stay.interval,
            notify_at: stay.notify_at,
            created_at: 0, // preserved by the store from the current row
            updated_at: Some(now),
        };
        if let Err(e) = tx.update(row).await {
            return Err(match e {
                StoreError::NotFound => BookingError::NotFound(patch.id),
                other => BookingError::Store(other),
            });
        }
        tx.commit().await?;

        info!(booking_id = %patch.id, suite_id = patch.suite_id, "booking updated");
        Ok(())
    }

    /// Owner-scoped cancellation.
    pub async fn cancel(&self, id: Uuid, user_id: UserId) -> Result<(), BookingError> {
        match self.store.delete(id, user_id).await {
            Ok(()) => {
                metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
                info!(booking_id = %id, "booking cancelled");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(BookingError::NotFound(id)),
            Err(e) => Err(BookingError::Store(e)),
        }
    }

    /// Suites with no booking intersecting `window`.
    pub async fn vacant_suites(&self, window: Interval) -> Result<Vec<Suite>, BookingError> {
        let mut vacant = Vec::new();
        for suite in self.catalog.list().await? {
            let taken = self.store.find_overlapping(suite.id, window, None).await?;
            if taken.is_empty() {
                vacant.push(suite);
            }
        }
        Ok(vacant)
    }

    /// Free sub-intervals on one suite within the next 30 days.
    pub async fn vacant_intervals(&self, suite_id: SuiteId) -> Result<Vec<Interval>, BookingError> {
        if self.catalog.get(suite_id).await?.is_none() {
            return Err(BookingError::UnknownSuite(suite_id));
        }
        let now = now_ms();
        let horizon_end = now + VACANCY_HORIZON_MS;
        let window = Interval::new(now, horizon_end);

        let mut taken: Vec<Interval> = self
            .store
            .find_overlapping(suite_id, window, None)
            .await?
            .iter()
            .map(|b| b.interval)
            .collect();
        taken.sort_by_key(|i| i.start);

        Ok(availability::vacant_intervals(&taken, now, horizon_end))
    }
}
