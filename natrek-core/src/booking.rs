use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payment::PaymentInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    /// Awaiting payment after checkout was initialized.
    Confirmed,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Move,
    Transfer,
    Cancel,
    StatusOverride,
}

/// One entry of the append-only structural audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub changed_at: DateTime<Utc>,
    pub change_type: ChangeType,
    pub from_event_id: Option<Uuid>,
    pub to_event_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// A customer reservation referencing exactly one event.
///
/// A booking never carries its own date field; its date is always derived by
/// dereferencing `event_id`. Writing a date directly onto a booking creates a
/// second source of truth that can diverge from the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub pax: i32,
    pub customer: Customer,
    pub status: BookingStatus,
    pub payment_info: Option<PaymentInfo>,
    pub previous_states: Vec<StateChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(event_id: Uuid, pax: i32, customer: Customer) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            pax,
            customer,
            status: BookingStatus::Pending,
            payment_info: None,
            previous_states: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_change(
        &mut self,
        change_type: ChangeType,
        from_event_id: Option<Uuid>,
        to_event_id: Option<Uuid>,
        reason: Option<String>,
    ) {
        self.previous_states.push(StateChange {
            changed_at: Utc::now(),
            change_type,
            from_event_id,
            to_event_id,
            reason,
        });
        self.updated_at = Utc::now();
    }
}
