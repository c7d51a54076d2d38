use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::Booking;
use crate::event::{Event, EventKind};
use crate::tour::Tour;
use crate::CoreResult;

/// Scoped unit of work against the backing store.
///
/// Every capacity-affecting sequence runs against one `StoreTx`: the
/// occupancy adjustment and the booking identity update are never split
/// across transactions. `commit` consumes the transaction; dropping it
/// without committing aborts, so every exit path is commit-or-abort.
#[async_trait]
pub trait StoreTx: Send {
    async fn get_tour(&mut self, id: Uuid) -> CoreResult<Option<Tour>>;
    async fn insert_tour(&mut self, tour: &Tour) -> CoreResult<()>;
    async fn update_tour(&mut self, tour: &Tour) -> CoreResult<()>;

    async fn get_event(&mut self, id: Uuid) -> CoreResult<Option<Event>>;
    /// Exact `(tour, canonical date, kind)` lookup.
    async fn find_event(
        &mut self,
        tour_id: Uuid,
        date: DateTime<Utc>,
        kind: EventKind,
    ) -> CoreResult<Option<Event>>;
    async fn insert_event(&mut self, event: &Event) -> CoreResult<()>;
    /// Persists everything except `occupied`, which only moves through
    /// `adjust_occupied`.
    async fn update_event(&mut self, event: &Event) -> CoreResult<()>;
    async fn delete_event(&mut self, id: Uuid) -> CoreResult<()>;

    /// Atomic `occupied += delta` guarded by `0 <= occupied <= capacity`.
    /// Returns the new occupancy. Fails with `CapacityExceeded` when the
    /// result would overflow, `NotFound` when the event does not exist.
    async fn adjust_occupied(&mut self, event_id: Uuid, delta: i32) -> CoreResult<i32>;

    async fn get_booking(&mut self, id: Uuid) -> CoreResult<Option<Booking>>;
    async fn insert_booking(&mut self, booking: &Booking) -> CoreResult<()>;
    async fn update_booking(&mut self, booking: &Booking) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;
}

/// Storage engine handle. Transactional work goes through `begin`; the plain
/// read methods serve listings and may be stale, while id reads inside a
/// transaction are authoritative.
#[async_trait]
pub trait TourStore: Send + Sync {
    async fn begin<'a>(&'a self) -> CoreResult<Box<dyn StoreTx + 'a>>;

    async fn get_tour(&self, id: Uuid) -> CoreResult<Option<Tour>>;
    async fn list_tours(&self) -> CoreResult<Vec<Tour>>;
    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>>;
    async fn list_events(&self) -> CoreResult<Vec<Event>>;
    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;
    async fn list_bookings(&self) -> CoreResult<Vec<Booking>>;
}
