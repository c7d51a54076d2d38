use tracing::{info, warn};
use uuid::Uuid;

use natrek_core::booking::BookingStatus;
use natrek_core::payment::{PaymentInfo, PaymentReference, ProviderStatus};
use natrek_core::pricing::{self, BusinessRules, Quote};
use natrek_core::repository::StoreTx;
use natrek_core::{CoreError, CoreResult};

/// Amounts returned by `POST /public/payments/init`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentInit {
    pub amount: i64,
    pub tax: i64,
    pub total_due: i64,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub reference: String,
    pub provider_status: ProviderStatus,
    pub transaction_id: String,
    pub amount: i64,
}

/// How a provider callback landed. None of these are errors: payment
/// providers retry webhooks, so duplicates and stale deliveries must be
/// acknowledged with success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Booking transitioned to paid.
    Applied,
    /// Same transaction already recorded; nothing changed.
    Duplicate,
    /// Non-approved status recorded without advancing the booking.
    Recorded,
    /// Out-of-order callback after the booking was already paid; ignored.
    /// Confirmation is monotonic.
    Stale,
}

/// Applies the external provider's asynchronous callback to a booking
/// exactly once, keyed by the `NTK-{bookingId}-{nonce}` reference.
pub struct PaymentGate;

impl PaymentGate {
    /// Compute the deposit due for a booking and hand out a provider
    /// reference. Moves a pending booking to confirmed-awaiting-payment.
    pub async fn init(
        tx: &mut dyn StoreTx,
        booking_id: Uuid,
        rules: &BusinessRules,
    ) -> CoreResult<PaymentInit> {
        let mut booking = tx
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(CoreError::Validation(format!(
                    "booking {booking_id} is cancelled"
                )))
            }
            BookingStatus::Paid => {
                return Err(CoreError::Validation(format!(
                    "booking {booking_id} is already paid"
                )))
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let quote = Self::quote_for(tx, &booking.event_id, booking.pax, rules).await?;

        if booking.status == BookingStatus::Pending {
            booking.status = BookingStatus::Confirmed;
            tx.update_booking(&booking).await?;
        }

        let reference = PaymentReference::new(booking.id);
        info!(booking_id = %booking.id, amount = quote.amount, tax = quote.tax, "payment initialized");

        Ok(PaymentInit {
            amount: quote.amount,
            tax: quote.tax,
            total_due: quote.total_due,
            reference: reference.to_string(),
        })
    }

    /// At-most-once application of a provider callback. Duplicate
    /// transaction ids and post-paid downgrades are acknowledged without
    /// mutating anything.
    pub async fn confirm(
        tx: &mut dyn StoreTx,
        req: &ConfirmRequest,
        rules: &BusinessRules,
    ) -> CoreResult<ConfirmOutcome> {
        let reference = PaymentReference::parse(&req.reference)?;
        let mut booking = tx
            .get_booking(reference.booking_id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", reference.booking_id))?;

        if let Some(existing) = &booking.payment_info {
            if existing.transaction_id == req.transaction_id {
                info!(
                    booking_id = %booking.id,
                    transaction_id = %req.transaction_id,
                    "duplicate webhook delivery, already recorded"
                );
                return Ok(ConfirmOutcome::Duplicate);
            }
        }

        match (req.provider_status, booking.status) {
            (ProviderStatus::Approved, BookingStatus::Pending | BookingStatus::Confirmed) => {
                let expected = Self::quote_for(tx, &booking.event_id, booking.pax, rules).await?;
                if req.amount != expected.total_due {
                    warn!(
                        booking_id = %booking.id,
                        reported = req.amount,
                        expected = expected.total_due,
                        "approved amount differs from computed total"
                    );
                }

                booking.status = BookingStatus::Paid;
                booking.payment_info = Some(PaymentInfo {
                    status: ProviderStatus::Approved,
                    transaction_id: req.transaction_id.clone(),
                    reference: req.reference.clone(),
                    amount: req.amount,
                    tax: expected.tax,
                });
                tx.update_booking(&booking).await?;
                info!(booking_id = %booking.id, transaction_id = %req.transaction_id, "booking paid");
                Ok(ConfirmOutcome::Applied)
            }
            (ProviderStatus::Approved, BookingStatus::Paid) => {
                info!(booking_id = %booking.id, "approved callback for already-paid booking");
                Ok(ConfirmOutcome::Duplicate)
            }
            (ProviderStatus::Approved, BookingStatus::Cancelled) => {
                warn!(
                    booking_id = %booking.id,
                    transaction_id = %req.transaction_id,
                    "approved payment for a cancelled booking, recording without status change"
                );
                booking.payment_info = Some(PaymentInfo {
                    status: ProviderStatus::Approved,
                    transaction_id: req.transaction_id.clone(),
                    reference: req.reference.clone(),
                    amount: req.amount,
                    tax: 0,
                });
                tx.update_booking(&booking).await?;
                Ok(ConfirmOutcome::Recorded)
            }
            (status, BookingStatus::Paid) => {
                // A later declined/error callback never downgrades a paid
                // booking.
                warn!(
                    booking_id = %booking.id,
                    ?status,
                    transaction_id = %req.transaction_id,
                    "stale non-approved callback after payment, ignoring"
                );
                Ok(ConfirmOutcome::Stale)
            }
            (status, _) => {
                booking.payment_info = Some(PaymentInfo {
                    status,
                    transaction_id: req.transaction_id.clone(),
                    reference: req.reference.clone(),
                    amount: req.amount,
                    tax: 0,
                });
                tx.update_booking(&booking).await?;
                info!(booking_id = %booking.id, ?status, "non-approved payment recorded");
                Ok(ConfirmOutcome::Recorded)
            }
        }
    }

    async fn quote_for(
        tx: &mut dyn StoreTx,
        event_id: &Uuid,
        pax: i32,
        rules: &BusinessRules,
    ) -> CoreResult<Quote> {
        let event = tx
            .get_event(*event_id)
            .await?
            .ok_or_else(|| CoreError::not_found("event", event_id))?;
        let tour = tx
            .get_tour(event.tour_id)
            .await?
            .ok_or_else(|| CoreError::not_found("tour", event.tour_id))?;
        pricing::quote_deposit(&tour, pax, rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natrek_core::booking::{Booking, Customer};
    use natrek_core::dates;
    use natrek_core::event::{Event, EventKind};
    use natrek_core::repository::TourStore;
    use natrek_core::tour::{PricingTier, Tour};
    use natrek_store::MemoryStore;

    async fn seed(store: &MemoryStore) -> Booking {
        let tour = Tour::new(
            "Guatape".to_string(),
            String::new(),
            vec![PricingTier { min_pax: 1, max_pax: 10, price_cop: 100_000, price_usd: 25 }],
        );
        let event = Event::new(
            tour.id,
            dates::normalize_input("2025-12-31").unwrap(),
            EventKind::Private,
            8,
        );
        let booking = Booking::new(
            event.id,
            1,
            Customer {
                name: "Carlos".to_string(),
                email: "carlos@example.com".to_string(),
                phone: "+57 300 111 2222".to_string(),
                document: None,
            },
        );

        let mut tx = store.begin().await.unwrap();
        tx.insert_tour(&tour).await.unwrap();
        tx.insert_event(&event).await.unwrap();
        tx.adjust_occupied(event.id, 1).await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();
        booking
    }

    fn approved(reference: &str, tx_id: &str) -> ConfirmRequest {
        ConfirmRequest {
            reference: reference.to_string(),
            provider_status: ProviderStatus::Approved,
            transaction_id: tx_id.to_string(),
            amount: 31_500,
        }
    }

    #[tokio::test]
    async fn test_init_computes_deposit_and_confirms_booking() {
        let store = MemoryStore::new();
        let booking = seed(&store).await;
        let rules = BusinessRules::default();

        let mut tx = store.begin().await.unwrap();
        let init = PaymentGate::init(tx.as_mut(), booking.id, &rules).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(init.amount, 30_000);
        assert_eq!(init.tax, 1_500);
        assert_eq!(init.total_due, 31_500);
        assert!(init.reference.starts_with("NTK-"));

        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_duplicate_webhook_applies_once() {
        let store = MemoryStore::new();
        let booking = seed(&store).await;
        let rules = BusinessRules::default();
        let reference = PaymentReference::new(booking.id).to_string();
        let req = approved(&reference, "tx-001");

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            PaymentGate::confirm(tx.as_mut(), &req, &rules).await.unwrap(),
            ConfirmOutcome::Applied
        );
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            PaymentGate::confirm(tx.as_mut(), &req, &rules).await.unwrap(),
            ConfirmOutcome::Duplicate
        );
        tx.commit().await.unwrap();

        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Paid);
        let info = stored.payment_info.unwrap();
        assert_eq!(info.transaction_id, "tx-001");
        assert_eq!(info.amount, 31_500);
        assert_eq!(info.tax, 1_500);
    }

    #[tokio::test]
    async fn test_declined_does_not_advance_status() {
        let store = MemoryStore::new();
        let booking = seed(&store).await;
        let rules = BusinessRules::default();
        let reference = PaymentReference::new(booking.id).to_string();

        let mut tx = store.begin().await.unwrap();
        let outcome = PaymentGate::confirm(
            tx.as_mut(),
            &ConfirmRequest {
                reference,
                provider_status: ProviderStatus::Declined,
                transaction_id: "tx-002".to_string(),
                amount: 31_500,
            },
            &rules,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, ConfirmOutcome::Recorded);
        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert_eq!(stored.payment_info.unwrap().status, ProviderStatus::Declined);
    }

    #[tokio::test]
    async fn test_late_declined_never_downgrades_paid_booking() {
        let store = MemoryStore::new();
        let booking = seed(&store).await;
        let rules = BusinessRules::default();
        let reference = PaymentReference::new(booking.id).to_string();

        let mut tx = store.begin().await.unwrap();
        PaymentGate::confirm(tx.as_mut(), &approved(&reference, "tx-003"), &rules)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let outcome = PaymentGate::confirm(
            tx.as_mut(),
            &ConfirmRequest {
                reference,
                provider_status: ProviderStatus::Declined,
                transaction_id: "tx-004".to_string(),
                amount: 31_500,
            },
            &rules,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, ConfirmOutcome::Stale);
        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Paid);
        assert_eq!(stored.payment_info.unwrap().transaction_id, "tx-003");
    }

    #[tokio::test]
    async fn test_unknown_reference_is_rejected() {
        let store = MemoryStore::new();
        seed(&store).await;
        let rules = BusinessRules::default();
        let reference = PaymentReference::new(Uuid::new_v4()).to_string();

        let mut tx = store.begin().await.unwrap();
        let result = PaymentGate::confirm(tx.as_mut(), &approved(&reference, "tx-005"), &rules).await;
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }
}
