use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use natrek_core::booking::{Booking, BookingStatus, ChangeType};
use natrek_core::pricing::BusinessRules;
use natrek_core::repository::StoreTx;
use natrek_core::{CoreError, CoreResult};

use crate::ledger::CapacityLedger;

/// Where a booking is headed.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Admin date/tour change: the destination departure is found or created
    /// for the new date. `tour_id` of `None` keeps the current tour.
    Date {
        tour_id: Option<Uuid>,
        date: DateTime<Utc>,
    },
    /// Administrative transfer onto a specific existing departure.
    Event(Uuid),
}

#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub booking_id: Uuid,
    pub destination: Destination,
    pub reason: Option<String>,
}

/// Relocates a booking between departures as one atomic unit: both occupancy
/// adjustments and the `event_id` update happen on the caller's transaction,
/// so a destination failure leaves the source untouched. The booking itself
/// never stores a date; its date changes solely because its owning event
/// changes.
pub struct BookingMover;

impl BookingMover {
    pub async fn relocate(
        tx: &mut dyn StoreTx,
        req: MoveRequest,
        rules: &BusinessRules,
    ) -> CoreResult<Booking> {
        let mut booking = tx
            .get_booking(req.booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", req.booking_id))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::Validation(format!(
                "booking {} is cancelled and cannot be moved",
                booking.id
            )));
        }

        let from_event = tx
            .get_event(booking.event_id)
            .await?
            .ok_or_else(|| CoreError::not_found("event", booking.event_id))?;

        let (to_event, change_type) = match req.destination {
            Destination::Event(id) => {
                let event = tx
                    .get_event(id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("event", id))?;
                (event, ChangeType::Transfer)
            }
            Destination::Date { tour_id, date } => {
                let tour_id = tour_id.unwrap_or(from_event.tour_id);
                let tour = tx
                    .get_tour(tour_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("tour", tour_id))?;
                let event =
                    CapacityLedger::find_or_create(tx, &tour, date, from_event.kind, rules).await?;
                (event, ChangeType::Move)
            }
        };

        // Idempotent: moving onto the current departure is a no-op, which
        // also keeps transaction retries from double-applying.
        if to_event.id == from_event.id {
            return Ok(booking);
        }

        CapacityLedger::reserve(tx, from_event.id, -booking.pax).await?;
        CapacityLedger::reserve(tx, to_event.id, booking.pax).await?;

        booking.event_id = to_event.id;
        booking.record_change(
            change_type,
            Some(from_event.id),
            Some(to_event.id),
            req.reason,
        );
        tx.update_booking(&booking).await?;

        info!(
            booking_id = %booking.id,
            from_event = %from_event.id,
            to_event = %to_event.id,
            ?change_type,
            "relocated booking"
        );
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natrek_core::booking::Customer;
    use natrek_core::dates;
    use natrek_core::event::{Event, EventKind};
    use natrek_core::repository::TourStore;
    use natrek_core::tour::{PricingTier, Tour};
    use natrek_store::MemoryStore;

    fn sample_tour() -> Tour {
        Tour::new(
            "Lost City Trek".to_string(),
            String::new(),
            vec![PricingTier { min_pax: 1, max_pax: 8, price_cop: 100_000, price_usd: 25 }],
        )
    }

    fn sample_customer() -> Customer {
        Customer {
            name: "Ana Maria".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+57 300 000 0000".to_string(),
            document: None,
        }
    }

    async fn seed_booking(store: &MemoryStore, tour: &Tour, date: &str, pax: i32) -> (Event, Booking) {
        let date = dates::normalize_input(date).unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_tour(tour).await.unwrap();
        let event = Event::new(tour.id, date, EventKind::Public, 8);
        tx.insert_event(&event).await.unwrap();
        tx.adjust_occupied(event.id, pax).await.unwrap();
        let booking = Booking::new(event.id, pax, sample_customer());
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();
        (event, booking)
    }

    #[tokio::test]
    async fn test_move_creates_destination_and_swaps_occupancy() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let rules = BusinessRules::default();
        let (event_a, booking) = seed_booking(&store, &tour, "2025-12-31", 3).await;

        let new_date = dates::normalize_input("2026-01-15").unwrap();
        let mut tx = store.begin().await.unwrap();
        let moved = BookingMover::relocate(
            tx.as_mut(),
            MoveRequest {
                booking_id: booking.id,
                destination: Destination::Date { tour_id: Some(tour.id), date: new_date },
                reason: Some("customer asked".to_string()),
            },
            &rules,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let event_b = store.get_event(moved.event_id).await.unwrap().unwrap();
        assert_ne!(event_b.id, event_a.id);
        assert_eq!(event_b.date, new_date);
        assert_eq!(event_b.occupied, 3);
        assert_eq!(store.get_event(event_a.id).await.unwrap().unwrap().occupied, 0);

        assert_eq!(moved.previous_states.len(), 1);
        let entry = &moved.previous_states[0];
        assert_eq!(entry.change_type, ChangeType::Move);
        assert_eq!(entry.from_event_id, Some(event_a.id));
        assert_eq!(entry.to_event_id, Some(event_b.id));
    }

    #[tokio::test]
    async fn test_move_to_same_event_is_a_no_op() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let rules = BusinessRules::default();
        let (event_a, booking) = seed_booking(&store, &tour, "2025-12-31", 3).await;

        let mut tx = store.begin().await.unwrap();
        let moved = BookingMover::relocate(
            tx.as_mut(),
            MoveRequest {
                booking_id: booking.id,
                destination: Destination::Event(event_a.id),
                reason: None,
            },
            &rules,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(moved.event_id, event_a.id);
        assert!(moved.previous_states.is_empty());
        assert_eq!(store.get_event(event_a.id).await.unwrap().unwrap().occupied, 3);
    }

    #[tokio::test]
    async fn test_full_destination_aborts_without_releasing_source() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let rules = BusinessRules::default();
        let (event_a, booking) = seed_booking(&store, &tour, "2025-12-31", 3).await;

        // destination with only 1 free seat
        let full_date = dates::normalize_input("2026-02-01").unwrap();
        let mut tx = store.begin().await.unwrap();
        let event_b = Event::new(tour.id, full_date, EventKind::Public, 8);
        tx.insert_event(&event_b).await.unwrap();
        tx.adjust_occupied(event_b.id, 7).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let result = BookingMover::relocate(
            tx.as_mut(),
            MoveRequest {
                booking_id: booking.id,
                destination: Destination::Event(event_b.id),
                reason: None,
            },
            &rules,
        )
        .await;
        assert!(matches!(result, Err(CoreError::CapacityExceeded { .. })));
        drop(tx); // abort

        // the source release must not be observable
        assert_eq!(store.get_event(event_a.id).await.unwrap().unwrap().occupied, 3);
        assert_eq!(store.get_event(event_b.id).await.unwrap().unwrap().occupied, 7);
        let unchanged = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(unchanged.event_id, event_a.id);
    }

    #[tokio::test]
    async fn test_transfer_records_transfer_entry() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let rules = BusinessRules::default();
        let (event_a, booking) = seed_booking(&store, &tour, "2025-12-31", 2).await;

        let other_date = dates::normalize_input("2026-03-01").unwrap();
        let mut tx = store.begin().await.unwrap();
        let event_b = Event::new(tour.id, other_date, EventKind::Public, 8);
        tx.insert_event(&event_b).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let moved = BookingMover::relocate(
            tx.as_mut(),
            MoveRequest {
                booking_id: booking.id,
                destination: Destination::Event(event_b.id),
                reason: Some("group merge".to_string()),
            },
            &rules,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(moved.event_id, event_b.id);
        assert_eq!(moved.previous_states[0].change_type, ChangeType::Transfer);
        assert_eq!(moved.previous_states[0].reason.as_deref(), Some("group merge"));
        assert_eq!(store.get_event(event_a.id).await.unwrap().unwrap().occupied, 0);
        assert_eq!(store.get_event(event_b.id).await.unwrap().unwrap().occupied, 2);
    }
}
