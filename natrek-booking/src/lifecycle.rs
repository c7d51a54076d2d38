use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use natrek_core::booking::{Booking, BookingStatus, ChangeType, Customer};
use natrek_core::event::{Event, EventKind, EventStatus};
use natrek_core::pricing::BusinessRules;
use natrek_core::repository::TourStore;
use natrek_core::tour::Tour;
use natrek_core::{CoreError, CoreResult};

use crate::ledger::CapacityLedger;
use crate::mover::{BookingMover, Destination, MoveRequest};
use crate::payments::{ConfirmOutcome, ConfirmRequest, PaymentGate, PaymentInit};

/// How many times a contended transaction is re-run with fresh state before
/// the conflict surfaces to the caller.
pub const TX_RETRY_LIMIT: u32 = 3;

async fn with_retry<T, F, Fut>(op: &'static str, mut f: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Err(CoreError::Conflict) if attempt + 1 < TX_RETRY_LIMIT => {
                attempt += 1;
                warn!(op, attempt, "transaction conflict, retrying with fresh state");
            }
            other => return other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub tour_id: Uuid,
    /// Canonical noon-UTC instant, normalized at the boundary.
    pub date: DateTime<Utc>,
    pub kind: EventKind,
    pub pax: i32,
    pub customer: Customer,
}

#[derive(Debug, Clone, Default)]
pub struct BookingUpdate {
    pub pax: Option<i32>,
    pub customer: Option<Customer>,
    pub new_date: Option<DateTime<Utc>>,
    pub new_tour_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateDeparture {
    pub tour_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: EventKind,
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct DepartureUpdate {
    pub capacity: Option<i32>,
    pub status: Option<EventStatus>,
}

/// Booking lifecycle manager. Every capacity-affecting operation runs on a
/// single store transaction, delegating occupancy to the ledger, relocation
/// to the mover and provider callbacks to the payment gate.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn TourStore>,
    rules: BusinessRules,
}

impl BookingService {
    pub fn new(store: Arc<dyn TourStore>, rules: BusinessRules) -> Self {
        Self { store, rules }
    }

    pub fn store(&self) -> &Arc<dyn TourStore> {
        &self.store
    }

    pub fn rules(&self) -> &BusinessRules {
        &self.rules
    }

    pub async fn create(&self, req: &CreateBooking) -> CoreResult<Booking> {
        if req.pax <= 0 {
            return Err(CoreError::Validation(format!(
                "invalid party size: {}",
                req.pax
            )));
        }
        with_retry("create_booking", || self.try_create(req)).await
    }

    async fn try_create(&self, req: &CreateBooking) -> CoreResult<Booking> {
        let mut tx = self.store.begin().await?;

        let tour = tx
            .get_tour(req.tour_id)
            .await?
            .ok_or_else(|| CoreError::not_found("tour", req.tour_id))?;
        if !tour.active {
            return Err(CoreError::Validation(format!(
                "tour {} is not active",
                tour.id
            )));
        }

        let event =
            CapacityLedger::find_or_create(tx.as_mut(), &tour, req.date, req.kind, &self.rules)
                .await?;
        if event.status == EventStatus::Closed {
            return Err(CoreError::Validation(format!(
                "departure {} is closed",
                event.id
            )));
        }

        CapacityLedger::reserve(tx.as_mut(), event.id, req.pax).await?;

        let booking = Booking::new(event.id, req.pax, req.customer.clone());
        tx.insert_booking(&booking).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, event_id = %event.id, pax = req.pax, "booking created");
        Ok(booking)
    }

    /// Cancel and release the seats back to the departure. Idempotent.
    pub async fn cancel(&self, booking_id: Uuid, reason: Option<String>) -> CoreResult<Booking> {
        with_retry("cancel_booking", || {
            self.try_cancel(booking_id, reason.clone())
        })
        .await
    }

    async fn try_cancel(&self, booking_id: Uuid, reason: Option<String>) -> CoreResult<Booking> {
        let mut tx = self.store.begin().await?;

        let mut booking = tx
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        CapacityLedger::reserve(tx.as_mut(), booking.event_id, -booking.pax).await?;
        booking.status = BookingStatus::Cancelled;
        booking.record_change(ChangeType::Cancel, Some(booking.event_id), None, reason);
        tx.update_booking(&booking).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, "booking cancelled");
        Ok(booking)
    }

    /// Direct status transition (admin override). Transitions into and out
    /// of cancelled keep the ledger in step.
    pub async fn set_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> CoreResult<Booking> {
        with_retry("set_booking_status", || {
            self.try_set_status(booking_id, status, reason.clone())
        })
        .await
    }

    async fn try_set_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> CoreResult<Booking> {
        let mut tx = self.store.begin().await?;

        let mut booking = tx
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;
        if booking.status == status {
            return Ok(booking);
        }

        if status == BookingStatus::Cancelled {
            CapacityLedger::reserve(tx.as_mut(), booking.event_id, -booking.pax).await?;
        } else if booking.status == BookingStatus::Cancelled {
            // reinstating: seats must still fit
            CapacityLedger::reserve(tx.as_mut(), booking.event_id, booking.pax).await?;
        }

        booking.record_change(ChangeType::StatusOverride, None, None, reason);
        booking.status = status;
        tx.update_booking(&booking).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, ?status, "booking status overridden");
        Ok(booking)
    }

    /// Admin field update. A pax change re-reserves the delta against the
    /// current departure; a date/tour change routes through the mover on the
    /// same transaction.
    pub async fn update(&self, booking_id: Uuid, update: &BookingUpdate) -> CoreResult<Booking> {
        with_retry("update_booking", || self.try_update(booking_id, update)).await
    }

    async fn try_update(&self, booking_id: Uuid, update: &BookingUpdate) -> CoreResult<Booking> {
        let mut tx = self.store.begin().await?;

        let mut booking = tx
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::Validation(format!(
                "booking {booking_id} is cancelled"
            )));
        }

        if let Some(customer) = &update.customer {
            booking.customer = customer.clone();
        }

        if let Some(pax) = update.pax {
            if pax <= 0 {
                return Err(CoreError::Validation(format!("invalid party size: {pax}")));
            }
            let delta = pax - booking.pax;
            if delta != 0 {
                CapacityLedger::reserve(tx.as_mut(), booking.event_id, delta).await?;
                booking.pax = pax;
            }
        }

        booking.updated_at = Utc::now();
        tx.update_booking(&booking).await?;

        if update.new_date.is_some() || update.new_tour_id.is_some() {
            let date = match update.new_date {
                Some(date) => date,
                None => {
                    let event = tx
                        .get_event(booking.event_id)
                        .await?
                        .ok_or_else(|| CoreError::not_found("event", booking.event_id))?;
                    event.date
                }
            };
            booking = BookingMover::relocate(
                tx.as_mut(),
                MoveRequest {
                    booking_id,
                    destination: Destination::Date {
                        tour_id: update.new_tour_id,
                        date,
                    },
                    reason: None,
                },
                &self.rules,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    pub async fn move_booking(
        &self,
        booking_id: Uuid,
        new_tour_id: Option<Uuid>,
        new_date: DateTime<Utc>,
        reason: Option<String>,
    ) -> CoreResult<Booking> {
        with_retry("move_booking", || async {
            let mut tx = self.store.begin().await?;
            let booking = BookingMover::relocate(
                tx.as_mut(),
                MoveRequest {
                    booking_id,
                    destination: Destination::Date {
                        tour_id: new_tour_id,
                        date: new_date,
                    },
                    reason: reason.clone(),
                },
                &self.rules,
            )
            .await?;
            tx.commit().await?;
            Ok(booking)
        })
        .await
    }

    pub async fn transfer(
        &self,
        booking_id: Uuid,
        destination_event_id: Uuid,
        reason: Option<String>,
    ) -> CoreResult<Booking> {
        with_retry("transfer_booking", || async {
            let mut tx = self.store.begin().await?;
            let booking = BookingMover::relocate(
                tx.as_mut(),
                MoveRequest {
                    booking_id,
                    destination: Destination::Event(destination_event_id),
                    reason: reason.clone(),
                },
                &self.rules,
            )
            .await?;
            tx.commit().await?;
            Ok(booking)
        })
        .await
    }

    pub async fn init_payment(&self, booking_id: Uuid) -> CoreResult<PaymentInit> {
        with_retry("init_payment", || async {
            let mut tx = self.store.begin().await?;
            let init = PaymentGate::init(tx.as_mut(), booking_id, &self.rules).await?;
            tx.commit().await?;
            Ok(init)
        })
        .await
    }

    pub async fn confirm_payment(&self, req: &ConfirmRequest) -> CoreResult<ConfirmOutcome> {
        with_retry("confirm_payment", || async {
            let mut tx = self.store.begin().await?;
            let outcome = PaymentGate::confirm(tx.as_mut(), req, &self.rules).await?;
            tx.commit().await?;
            Ok(outcome)
        })
        .await
    }

    pub async fn create_tour(&self, tour: &Tour) -> CoreResult<Tour> {
        let mut tx = self.store.begin().await?;
        tx.insert_tour(tour).await?;
        tx.commit().await?;
        info!(tour_id = %tour.id, name = %tour.name, "tour created");
        Ok(tour.clone())
    }

    pub async fn update_tour(&self, tour: &Tour) -> CoreResult<Tour> {
        let mut tx = self.store.begin().await?;
        tx.update_tour(tour).await?;
        tx.commit().await?;
        Ok(tour.clone())
    }

    /// Explicit departure creation (admin). Fails when the `(tour, date,
    /// kind)` slot is already taken.
    pub async fn create_departure(&self, req: &CreateDeparture) -> CoreResult<Event> {
        with_retry("create_departure", || async {
            let mut tx = self.store.begin().await?;

            let tour = tx
                .get_tour(req.tour_id)
                .await?
                .ok_or_else(|| CoreError::not_found("tour", req.tour_id))?;
            let date = natrek_core::dates::normalize(req.date);
            if tx.find_event(tour.id, date, req.kind).await?.is_some() {
                return Err(CoreError::Validation(format!(
                    "departure already exists for tour {} on {}",
                    tour.id, date
                )));
            }

            let capacity = req.capacity.unwrap_or(match req.kind {
                EventKind::Public => self.rules.default_public_capacity,
                EventKind::Private => self.rules.default_private_capacity,
            });
            if capacity <= 0 {
                return Err(CoreError::Validation(format!("invalid capacity: {capacity}")));
            }

            let event = Event::new(tour.id, date, req.kind, capacity);
            tx.insert_event(&event).await?;
            tx.commit().await?;

            info!(event_id = %event.id, tour_id = %tour.id, %date, "departure created");
            Ok(event)
        })
        .await
    }

    pub async fn update_departure(
        &self,
        event_id: Uuid,
        update: &DepartureUpdate,
    ) -> CoreResult<Event> {
        with_retry("update_departure", || async {
            let mut tx = self.store.begin().await?;

            let mut event = tx
                .get_event(event_id)
                .await?
                .ok_or_else(|| CoreError::not_found("event", event_id))?;

            if let Some(capacity) = update.capacity {
                if capacity < event.occupied {
                    return Err(CoreError::Validation(format!(
                        "capacity {capacity} is below current occupancy {}",
                        event.occupied
                    )));
                }
                event.capacity = capacity;
            }
            if let Some(status) = update.status {
                event.status = status;
            }

            tx.update_event(&event).await?;
            let stored = tx
                .get_event(event_id)
                .await?
                .ok_or_else(|| CoreError::not_found("event", event_id))?;
            tx.commit().await?;
            Ok(stored)
        })
        .await
    }

    /// Departures only disappear when empty.
    pub async fn delete_departure(&self, event_id: Uuid) -> CoreResult<()> {
        with_retry("delete_departure", || async {
            let mut tx = self.store.begin().await?;

            let event = tx
                .get_event(event_id)
                .await?
                .ok_or_else(|| CoreError::not_found("event", event_id))?;
            if event.occupied != 0 {
                return Err(CoreError::Validation(format!(
                    "departure {event_id} still has {} occupants",
                    event.occupied
                )));
            }

            tx.delete_event(event_id).await?;
            tx.commit().await?;
            info!(event_id = %event_id, "departure deleted");
            Ok(())
        })
        .await
    }
}
