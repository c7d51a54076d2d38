use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use natrek_core::dates;
use natrek_core::event::{Event, EventKind};
use natrek_core::pricing::BusinessRules;
use natrek_core::repository::StoreTx;
use natrek_core::tour::Tour;
use natrek_core::CoreResult;

/// Owns the `0 <= occupied <= capacity` invariant per event. Every
/// capacity-affecting transition goes through `reserve` on the caller's
/// transaction; nothing else writes `occupied`.
pub struct CapacityLedger;

impl CapacityLedger {
    /// Locate the departure for the exact `(tour, canonical date, kind)`
    /// triple, creating it empty when none exists. Runs inside the caller's
    /// transaction so concurrent requests for the same date cannot create
    /// duplicates.
    pub async fn find_or_create(
        tx: &mut dyn StoreTx,
        tour: &Tour,
        date: DateTime<Utc>,
        kind: EventKind,
        rules: &BusinessRules,
    ) -> CoreResult<Event> {
        let date = dates::normalize(date);

        if let Some(event) = tx.find_event(tour.id, date, kind).await? {
            return Ok(event);
        }

        let capacity = match kind {
            EventKind::Public => rules.default_public_capacity,
            EventKind::Private => rules.default_private_capacity,
        };
        let event = Event::new(tour.id, date, kind, capacity);
        tx.insert_event(&event).await?;
        info!(event_id = %event.id, tour_id = %tour.id, date = %date, ?kind, "created departure");
        Ok(event)
    }

    /// Atomic `occupied += delta`. Negative delta releases seats. Returns
    /// the new occupancy.
    pub async fn reserve(tx: &mut dyn StoreTx, event_id: Uuid, delta: i32) -> CoreResult<i32> {
        tx.adjust_occupied(event_id, delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natrek_core::repository::TourStore;
    use natrek_core::tour::PricingTier;
    use natrek_core::CoreError;
    use natrek_store::MemoryStore;

    fn sample_tour() -> Tour {
        Tour::new(
            "Cocora Valley".to_string(),
            "Full day".to_string(),
            vec![PricingTier { min_pax: 1, max_pax: 10, price_cop: 100_000, price_usd: 25 }],
        )
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_existing_departure() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let date = dates::normalize_input("2025-12-31").unwrap();
        let rules = BusinessRules::default();

        let mut tx = store.begin().await.unwrap();
        tx.insert_tour(&tour).await.unwrap();
        let first = CapacityLedger::find_or_create(tx.as_mut(), &tour, date, EventKind::Public, &rules)
            .await
            .unwrap();
        let second = CapacityLedger::find_or_create(tx.as_mut(), &tour, date, EventKind::Public, &rules)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.occupied, 0);
        assert_eq!(first.capacity, rules.default_public_capacity);
    }

    #[tokio::test]
    async fn test_private_and_public_departures_are_distinct() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let date = dates::normalize_input("2025-12-31").unwrap();
        let rules = BusinessRules::default();

        let mut tx = store.begin().await.unwrap();
        tx.insert_tour(&tour).await.unwrap();
        let public = CapacityLedger::find_or_create(tx.as_mut(), &tour, date, EventKind::Public, &rules)
            .await
            .unwrap();
        let private =
            CapacityLedger::find_or_create(tx.as_mut(), &tour, date, EventKind::Private, &rules)
                .await
                .unwrap();

        assert_ne!(public.id, private.id);
        assert_eq!(private.capacity, rules.default_private_capacity);
    }

    #[tokio::test]
    async fn test_reserve_enforces_capacity() {
        let store = MemoryStore::new();
        let tour = sample_tour();
        let date = dates::normalize_input("2026-01-15").unwrap();
        let rules = BusinessRules::default();

        let mut tx = store.begin().await.unwrap();
        tx.insert_tour(&tour).await.unwrap();
        let event = CapacityLedger::find_or_create(tx.as_mut(), &tour, date, EventKind::Private, &rules)
            .await
            .unwrap();

        assert_eq!(
            CapacityLedger::reserve(tx.as_mut(), event.id, event.capacity).await.unwrap(),
            event.capacity
        );
        assert!(matches!(
            CapacityLedger::reserve(tx.as_mut(), event.id, 1).await,
            Err(CoreError::CapacityExceeded { available: 0, .. })
        ));

        // release brings it back
        assert_eq!(CapacityLedger::reserve(tx.as_mut(), event.id, -2).await.unwrap(), event.capacity - 2);
    }

    #[tokio::test]
    async fn test_reserve_unknown_event_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            CapacityLedger::reserve(tx.as_mut(), Uuid::new_v4(), 1).await,
            Err(CoreError::NotFound { .. })
        ));
    }
}
