use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use natrek_core::booking::Booking;
use natrek_core::event::{Event, EventKind};
use natrek_core::repository::{StoreTx, TourStore};
use natrek_core::tour::Tour;
use natrek_core::{CoreError, CoreResult};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    tours: HashMap<Uuid, Tour>,
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
}

/// In-memory engine used by tests and local development.
///
/// A transaction takes the whole-store lock, stages writes on a cloned
/// snapshot and swaps it back on commit. Dropping the transaction without
/// committing discards the snapshot, so aborts leave nothing behind, and
/// holding the lock for the duration makes transactions serializable by
/// construction.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl TourStore for MemoryStore {
    async fn begin<'a>(&'a self) -> CoreResult<Box<dyn StoreTx + 'a>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn get_tour(&self, id: Uuid) -> CoreResult<Option<Tour>> {
        Ok(self.state.lock().await.tours.get(&id).cloned())
    }

    async fn list_tours(&self) -> CoreResult<Vec<Tour>> {
        let mut tours: Vec<Tour> = self.state.lock().await.tours.values().cloned().collect();
        tours.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tours)
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn list_events(&self) -> CoreResult<Vec<Event>> {
        let mut events: Vec<Event> = self.state.lock().await.events.values().cloned().collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> =
            self.state.lock().await.bookings.values().cloned().collect();
        bookings.sort_by_key(|b| std::cmp::Reverse(b.created_at));
        Ok(bookings)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_tour(&mut self, id: Uuid) -> CoreResult<Option<Tour>> {
        Ok(self.staged.tours.get(&id).cloned())
    }

    async fn insert_tour(&mut self, tour: &Tour) -> CoreResult<()> {
        self.staged.tours.insert(tour.id, tour.clone());
        Ok(())
    }

    async fn update_tour(&mut self, tour: &Tour) -> CoreResult<()> {
        if !self.staged.tours.contains_key(&tour.id) {
            return Err(CoreError::not_found("tour", tour.id));
        }
        self.staged.tours.insert(tour.id, tour.clone());
        Ok(())
    }

    async fn get_event(&mut self, id: Uuid) -> CoreResult<Option<Event>> {
        Ok(self.staged.events.get(&id).cloned())
    }

    async fn find_event(
        &mut self,
        tour_id: Uuid,
        date: DateTime<Utc>,
        kind: EventKind,
    ) -> CoreResult<Option<Event>> {
        Ok(self
            .staged
            .events
            .values()
            .find(|e| e.tour_id == tour_id && e.date == date && e.kind == kind)
            .cloned())
    }

    async fn insert_event(&mut self, event: &Event) -> CoreResult<()> {
        self.staged.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> CoreResult<()> {
        let current_occupied = match self.staged.events.get(&event.id) {
            Some(existing) => existing.occupied,
            None => return Err(CoreError::not_found("event", event.id)),
        };
        // occupied only moves through adjust_occupied
        let mut stored = event.clone();
        stored.occupied = current_occupied;
        stored.updated_at = Utc::now();
        self.staged.events.insert(stored.id, stored);
        Ok(())
    }

    async fn delete_event(&mut self, id: Uuid) -> CoreResult<()> {
        self.staged
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("event", id))
    }

    async fn adjust_occupied(&mut self, event_id: Uuid, delta: i32) -> CoreResult<i32> {
        let event = self
            .staged
            .events
            .get_mut(&event_id)
            .ok_or_else(|| CoreError::not_found("event", event_id))?;

        // widened so an extreme delta fails the guard instead of overflowing
        let next = match event.occupied.checked_add(delta) {
            Some(next) => next,
            None if delta > 0 => {
                return Err(CoreError::CapacityExceeded {
                    requested: delta,
                    available: event.capacity - event.occupied,
                })
            }
            None => {
                return Err(CoreError::Validation(format!(
                    "occupancy of event {event_id} would drop below zero"
                )))
            }
        };
        if next < 0 {
            return Err(CoreError::Validation(format!(
                "occupancy of event {event_id} would drop below zero"
            )));
        }
        if next > event.capacity {
            return Err(CoreError::CapacityExceeded {
                requested: delta,
                available: event.capacity - event.occupied,
            });
        }

        event.occupied = next;
        event.updated_at = Utc::now();
        Ok(next)
    }

    async fn get_booking(&mut self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> CoreResult<()> {
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> CoreResult<()> {
        if !self.staged.bookings.contains_key(&booking.id) {
            return Err(CoreError::not_found("booking", booking.id));
        }
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
