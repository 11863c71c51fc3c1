use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::model::{Booking, Interval, Ms, Suite, SuiteId, UserId};

use super::error::StoreError;

// ── Collaborator interfaces ──────────────────────────────────────

/// Transactional persistence for bookings. Implementations must be safe
/// for concurrent use across resolver invocations and scheduler
/// sub-tasks; every operation is expected to honor caller cancellation.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Open a unit of work scoped to one suite's bookings. The returned
    /// transaction holds suite-level exclusivity until it is committed
    /// or dropped, so the overlap check and the write it guards are
    /// indivisible. Dropping without commit discards staged writes.
    async fn begin(&self, suite_id: SuiteId) -> Result<Box<dyn BookingTx>, StoreError>;

    /// Bookings on `suite_id` whose interval intersects `window`,
    /// minus `exclude`. Read path, no transaction.
    async fn find_overlapping(
        &self,
        suite_id: SuiteId,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Owner-scoped delete. `NotFound` when zero rows are affected.
    async fn delete(&self, id: Uuid, user_id: UserId) -> Result<(), StoreError>;

    /// Bookings whose `notify_at` falls within `window`.
    async fn list_by_notify_window(&self, window: Interval) -> Result<Vec<Booking>, StoreError>;

    /// Purge bookings that ended before `cutoff`. Returns the number of
    /// rows removed; idempotent under repetition.
    async fn delete_before(&self, cutoff: Ms) -> Result<u64, StoreError>;
}

/// One suite-scoped unit of work. Reads observe committed rows; writes
/// are staged and applied atomically on `commit`.
#[async_trait]
pub trait BookingTx: Send {
    async fn find_overlapping(
        &mut self,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn insert(&mut self, booking: Booking) -> Result<(), StoreError>;

    /// Replace the row with `booking.id` owned by `booking.user_id`,
    /// preserving its original `created_at`. `NotFound` when the row is
    /// absent or owned by someone else.
    async fn update(&mut self, booking: Booking) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Read-only suite reference data, owned by the catalog service.
#[async_trait]
pub trait SuiteCatalog: Send + Sync {
    async fn get(&self, id: SuiteId) -> Result<Option<Suite>, StoreError>;
    async fn list(&self) -> Result<Vec<Suite>, StoreError>;
}

// ── In-memory reference implementation ───────────────────────────

type SharedSuiteBookings = Arc<RwLock<SuiteBookings>>;

/// One suite's rows, sorted by interval start.
#[derive(Default)]
struct SuiteBookings {
    bookings: Vec<Booking>,
}

impl SuiteBookings {
    fn insert_sorted(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.interval.start, |b| b.interval.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    fn remove(&mut self, id: Uuid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    /// Rows whose interval intersects `window`, minus `exclude`.
    /// Binary search skips rows starting at or after `window.end`.
    fn overlapping(&self, window: &Interval, exclude: Option<Uuid>) -> Vec<Booking> {
        let right = self
            .bookings
            .partition_point(|b| b.interval.start < window.end);
        self.bookings[..right]
            .iter()
            .filter(|b| b.interval.end > window.start)
            .filter(|b| exclude != Some(b.id))
            .cloned()
            .collect()
    }
}

struct StoreInner {
    suites: DashMap<SuiteId, SharedSuiteBookings>,
    /// Reverse lookup: booking id → suite id.
    index: DashMap<Uuid, SuiteId>,
}

/// Reference `BookingStore` backed by per-suite `RwLock`s. A transaction
/// is the suite's owned write guard: the read-check-write sequence runs
/// under it, which is the row-set locking the resolver's concurrency
/// guarantee leans on. Clones share state, like pool handles.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                suites: DashMap::new(),
                index: DashMap::new(),
            }),
        }
    }

    fn suite_slab(&self, suite_id: SuiteId) -> SharedSuiteBookings {
        self.inner
            .suites
            .entry(suite_id)
            .or_default()
            .value()
            .clone()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self, suite_id: SuiteId) -> Result<Box<dyn BookingTx>, StoreError> {
        let slab = self.suite_slab(suite_id);
        let guard = slab.write_owned().await;
        Ok(Box::new(MemoryTx {
            suite_id,
            guard,
            inner: self.inner.clone(),
            staged: Vec::new(),
        }))
    }

    async fn find_overlapping(
        &self,
        suite_id: SuiteId,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>, StoreError> {
        let slab = match self.inner.suites.get(&suite_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };
        let guard = slab.read().await;
        Ok(guard.overlapping(&window, exclude))
    }

    async fn delete(&self, id: Uuid, user_id: UserId) -> Result<(), StoreError> {
        let suite_id = self
            .inner
            .index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound)?;
        let slab = self.suite_slab(suite_id);
        let mut guard = slab.write().await;

        let owned = guard
            .bookings
            .iter()
            .any(|b| b.id == id && b.user_id == user_id);
        if !owned {
            return Err(StoreError::NotFound);
        }
        guard.remove(id);
        self.inner.index.remove(&id);
        Ok(())
    }

    async fn list_by_notify_window(&self, window: Interval) -> Result<Vec<Booking>, StoreError> {
        let slabs: Vec<SharedSuiteBookings> =
            self.inner.suites.iter().map(|e| e.value().clone()).collect();
        let mut due = Vec::new();
        for slab in slabs {
            let guard = slab.read().await;
            due.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.notify_at.is_some_and(|t| window.contains_instant(t)))
                    .cloned(),
            );
        }
        Ok(due)
    }

    async fn delete_before(&self, cutoff: Ms) -> Result<u64, StoreError> {
        let slabs: Vec<SharedSuiteBookings> =
            self.inner.suites.iter().map(|e| e.value().clone()).collect();
        let mut removed = 0u64;
        for slab in slabs {
            let mut guard = slab.write().await;
            guard.bookings.retain(|b| {
                if b.interval.end < cutoff {
                    self.inner.index.remove(&b.id);
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        Ok(removed)
    }
}

enum TxOp {
    Insert(Booking),
    Update(Booking),
}

struct MemoryTx {
    suite_id: SuiteId,
    guard: OwnedRwLockWriteGuard<SuiteBookings>,
    inner: Arc<StoreInner>,
    staged: Vec<TxOp>,
}

#[async_trait]
impl BookingTx for MemoryTx {
    async fn find_overlapping(
        &mut self,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self.guard.overlapping(&window, exclude))
    }

    async fn insert(&mut self, booking: Booking) -> Result<(), StoreError> {
        debug_assert_eq!(booking.suite_id, self.suite_id);
        self.staged.push(TxOp::Insert(booking));
        Ok(())
    }

    async fn update(&mut self, booking: Booking) -> Result<(), StoreError> {
        debug_assert_eq!(booking.suite_id, self.suite_id);
        let old = self
            .guard
            .bookings
            .iter()
            .find(|b| b.id == booking.id && b.user_id == booking.user_id)
            .ok_or(StoreError::NotFound)?;
        let mut row = booking;
        row.created_at = old.created_at;
        self.staged.push(TxOp::Update(row));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            suite_id,
            mut guard,
            inner,
            staged,
        } = *self;
        for op in staged {
            match op {
                TxOp::Insert(b) => {
                    inner.index.insert(b.id, suite_id);
                    guard.insert_sorted(b);
                }
                TxOp::Update(b) => {
                    guard.remove(b.id);
                    guard.insert_sorted(b);
                }
            }
        }
        Ok(())
    }
}

/// Fixed suite catalog for the daemon and tests.
pub struct MemoryCatalog {
    suites: DashMap<SuiteId, Suite>,
}

impl MemoryCatalog {
    pub fn new(suites: impl IntoIterator<Item = Suite>) -> Self {
        let map = DashMap::new();
        for s in suites {
            map.insert(s.id, s);
        }
        Self { suites: map }
    }
}

#[async_trait]
impl SuiteCatalog for MemoryCatalog {
    async fn get(&self, id: SuiteId) -> Result<Option<Suite>, StoreError> {
        Ok(self.suites.get(&id).map(|e| e.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Suite>, StoreError> {
        let mut all: Vec<Suite> = self.suites.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HOUR_MS as H;

    fn booking(suite_id: SuiteId, user_id: UserId, start: Ms, end: Ms) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id,
            suite_id,
            interval: Interval::new(start, end),
            notify_at: None,
            created_at: 0,
            updated_at: None,
        }
    }

    async fn commit_one(store: &MemoryStore, b: Booking) {
        let mut tx = store.begin(b.suite_id).await.unwrap();
        tx.insert(b).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn committed_insert_is_visible() {
        let store = MemoryStore::new();
        commit_one(&store, booking(1, 10, 2 * H, 4 * H)).await;

        let found = store
            .find_overlapping(1, Interval::new(0, 10 * H), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interval, Interval::new(2 * H, 4 * H));
    }

    #[tokio::test]
    async fn dropped_tx_discards_staged_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin(1).await.unwrap();
            tx.insert(booking(1, 10, 2 * H, 4 * H)).await.unwrap();
            // no commit
        }
        let found = store
            .find_overlapping(1, Interval::new(0, 10 * H), None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn begin_serializes_against_open_tx() {
        let store = MemoryStore::new();
        let tx = store.begin(1).await.unwrap();

        // A second transaction on the same suite must wait for the first.
        let store2 = store.clone();
        let pending = tokio::spawn(async move {
            let mut tx2 = store2.begin(1).await.unwrap();
            tx2.insert(booking(1, 11, 6 * H, 8 * H)).await.unwrap();
            tx2.commit().await.unwrap();
        });

        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        drop(tx); // abort releases the suite
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn tx_find_overlapping_honors_exclusion() {
        let store = MemoryStore::new();
        let own = booking(1, 10, 2 * H, 4 * H);
        let own_id = own.id;
        commit_one(&store, own).await;

        let mut tx = store.begin(1).await.unwrap();
        let all = tx
            .find_overlapping(Interval::new(0, 10 * H), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        let excluded = tx
            .find_overlapping(Interval::new(0, 10 * H), Some(own_id))
            .await
            .unwrap();
        assert!(excluded.is_empty());
    }

    #[tokio::test]
    async fn update_requires_matching_owner() {
        let store = MemoryStore::new();
        let original = booking(1, 10, 2 * H, 4 * H);
        let id = original.id;
        commit_one(&store, original.clone()).await;

        let mut tx = store.begin(1).await.unwrap();
        let mut stolen = original.clone();
        stolen.user_id = 99;
        assert_eq!(tx.update(stolen).await, Err(StoreError::NotFound));
        drop(tx);

        let mut tx = store.begin(1).await.unwrap();
        let mut widened = original;
        widened.interval = Interval::new(H, 5 * H);
        tx.update(widened).await.unwrap();
        tx.commit().await.unwrap();

        let found = store
            .find_overlapping(1, Interval::new(0, 10 * H), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].interval, Interval::new(H, 5 * H));
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let store = MemoryStore::new();
        let b = booking(1, 10, 2 * H, 4 * H);
        let id = b.id;
        commit_one(&store, b).await;

        assert_eq!(store.delete(id, 99).await, Err(StoreError::NotFound));
        store.delete(id, 10).await.unwrap();
        assert_eq!(store.delete(id, 10).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn notify_window_is_half_open() {
        let store = MemoryStore::new();
        let mut due = booking(1, 10, 10 * H, 12 * H);
        due.notify_at = Some(2 * H);
        let mut at_end = booking(1, 10, 20 * H, 22 * H);
        at_end.notify_at = Some(3 * H);
        let mut silent = booking(2, 10, 30 * H, 32 * H);
        silent.notify_at = None;
        commit_one(&store, due.clone()).await;
        commit_one(&store, at_end).await;
        commit_one(&store, silent).await;

        let listed = store
            .list_by_notify_window(Interval::new(2 * H, 3 * H))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
    }

    #[tokio::test]
    async fn delete_before_purges_and_is_idempotent() {
        let store = MemoryStore::new();
        commit_one(&store, booking(1, 10, H, 2 * H)).await;
        commit_one(&store, booking(2, 11, H, 3 * H)).await;
        commit_one(&store, booking(1, 10, 8 * H, 9 * H)).await;

        assert_eq!(store.delete_before(4 * H).await.unwrap(), 2);
        assert_eq!(store.delete_before(4 * H).await.unwrap(), 0);

        // Survivor still present, purged rows gone from the index too.
        let left = store
            .find_overlapping(1, Interval::new(0, 10 * H), None)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].interval, Interval::new(8 * H, 9 * H));
    }

    #[tokio::test]
    async fn catalog_lists_sorted() {
        let catalog = MemoryCatalog::new([
            Suite { id: 3, name: "Penthouse".into(), capacity: 4 },
            Suite { id: 1, name: "Standard".into(), capacity: 2 },
        ]);
        let all = catalog.list().await.unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(catalog.get(3).await.unwrap().is_some());
        assert!(catalog.get(9).await.unwrap().is_none());
    }
}
