use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Shared departure other parties may join.
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Open,
    Closed,
}

/// One bookable date-instance of a tour (a departure).
///
/// Invariant: `0 <= occupied <= capacity`, and `occupied` is only ever
/// mutated through the store's atomic adjust operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub tour_id: Uuid,
    /// Canonical noon-UTC instant, see `dates`.
    pub date: DateTime<Utc>,
    pub capacity: i32,
    pub occupied: i32,
    pub kind: EventKind,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(tour_id: Uuid, date: DateTime<Utc>, kind: EventKind, capacity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tour_id,
            date,
            capacity,
            occupied: 0,
            kind,
            status: EventStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn available(&self) -> i32 {
        self.capacity - self.occupied
    }
}
