use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use natrek_core::booking::{Booking, BookingStatus, Customer, StateChange};
use natrek_core::event::{Event, EventKind, EventStatus};
use natrek_core::payment::PaymentInfo;
use natrek_core::repository::{StoreTx, TourStore};
use natrek_core::tour::Tour;
use natrek_core::{CoreError, CoreResult};

/// Postgres engine. Occupancy adjustments are guarded single-row UPDATEs, so
/// concurrent reservations serialize on the row lock and the capacity check
/// re-evaluates after the wait; overselling is impossible without elevated
/// isolation levels.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn map_db_err(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // serialization_failure: caller retries with fresh state
            Some("40001") => return CoreError::Conflict,
            // unique_violation: two requests racing find-or-create for the
            // same departure; the retry will find the winner's row
            Some("23505") => return CoreError::Conflict,
            _ => {}
        }
    }
    CoreError::Storage(err.to_string())
}

fn storage_err(err: impl ToString) -> CoreError {
    CoreError::Storage(err.to_string())
}

fn kind_to_str(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Public => "PUBLIC",
        EventKind::Private => "PRIVATE",
    }
}

fn kind_from_str(raw: &str) -> CoreResult<EventKind> {
    match raw {
        "PUBLIC" => Ok(EventKind::Public),
        "PRIVATE" => Ok(EventKind::Private),
        other => Err(CoreError::Storage(format!("unknown event kind: {other}"))),
    }
}

fn event_status_to_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Open => "OPEN",
        EventStatus::Closed => "CLOSED",
    }
}

fn event_status_from_str(raw: &str) -> CoreResult<EventStatus> {
    match raw {
        "OPEN" => Ok(EventStatus::Open),
        "CLOSED" => Ok(EventStatus::Closed),
        other => Err(CoreError::Storage(format!("unknown event status: {other}"))),
    }
}

fn booking_status_to_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "PENDING",
        BookingStatus::Confirmed => "CONFIRMED",
        BookingStatus::Paid => "PAID",
        BookingStatus::Cancelled => "CANCELLED",
    }
}

fn booking_status_from_str(raw: &str) -> CoreResult<BookingStatus> {
    match raw {
        "PENDING" => Ok(BookingStatus::Pending),
        "CONFIRMED" => Ok(BookingStatus::Confirmed),
        "PAID" => Ok(BookingStatus::Paid),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        other => Err(CoreError::Storage(format!("unknown booking status: {other}"))),
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    name: String,
    description: String,
    pricing_tiers: serde_json::Value,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TourRow {
    fn into_tour(self) -> CoreResult<Tour> {
        Ok(Tour {
            id: self.id,
            name: self.name,
            description: self.description,
            pricing_tiers: serde_json::from_value(self.pricing_tiers).map_err(storage_err)?,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    tour_id: Uuid,
    date: DateTime<Utc>,
    capacity: i32,
    occupied: i32,
    kind: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self) -> CoreResult<Event> {
        Ok(Event {
            id: self.id,
            tour_id: self.tour_id,
            date: self.date,
            capacity: self.capacity,
            occupied: self.occupied,
            kind: kind_from_str(&self.kind)?,
            status: event_status_from_str(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    event_id: Uuid,
    pax: i32,
    customer: serde_json::Value,
    status: String,
    payment_info: Option<serde_json::Value>,
    previous_states: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> CoreResult<Booking> {
        let customer: Customer = serde_json::from_value(self.customer).map_err(storage_err)?;
        let payment_info: Option<PaymentInfo> = match self.payment_info {
            Some(value) => Some(serde_json::from_value(value).map_err(storage_err)?),
            None => None,
        };
        let previous_states: Vec<StateChange> =
            serde_json::from_value(self.previous_states).map_err(storage_err)?;

        Ok(Booking {
            id: self.id,
            event_id: self.event_id,
            pax: self.pax,
            customer,
            status: booking_status_from_str(&self.status)?,
            payment_info,
            previous_states,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_TOUR: &str =
    "SELECT id, name, description, pricing_tiers, active, created_at, updated_at FROM tours";
const SELECT_EVENT: &str =
    "SELECT id, tour_id, date, capacity, occupied, kind, status, created_at, updated_at FROM events";
const SELECT_BOOKING: &str =
    "SELECT id, event_id, pax, customer, status, payment_info, previous_states, created_at, updated_at FROM bookings";

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TourStore for PgStore {
    async fn begin<'a>(&'a self) -> CoreResult<Box<dyn StoreTx + 'a>> {
        let tx = self.pool.begin().await.map_err(map_db_err)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_tour(&self, id: Uuid) -> CoreResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!("{SELECT_TOUR} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        row.map(TourRow::into_tour).transpose()
    }

    async fn list_tours(&self) -> CoreResult<Vec<Tour>> {
        let rows = sqlx::query_as::<_, TourRow>(&format!("{SELECT_TOUR} ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(TourRow::into_tour).collect()
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        row.map(EventRow::into_event).transpose()
    }

    async fn list_events(&self) -> CoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENT} ORDER BY date"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>> {
        let rows =
            sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await
                .map_err(map_db_err)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn get_tour(&mut self, id: Uuid) -> CoreResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!("{SELECT_TOUR} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        row.map(TourRow::into_tour).transpose()
    }

    async fn insert_tour(&mut self, tour: &Tour) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tours (id, name, description, pricing_tiers, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tour.id)
        .bind(&tour.name)
        .bind(&tour.description)
        .bind(serde_json::to_value(&tour.pricing_tiers).map_err(storage_err)?)
        .bind(tour.active)
        .bind(tour.created_at)
        .bind(tour.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_tour(&mut self, tour: &Tour) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tours
            SET name = $2, description = $3, pricing_tiers = $4, active = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(tour.id)
        .bind(&tour.name)
        .bind(&tour.description)
        .bind(serde_json::to_value(&tour.pricing_tiers).map_err(storage_err)?)
        .bind(tour.active)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("tour", tour.id));
        }
        Ok(())
    }

    async fn get_event(&mut self, id: Uuid) -> CoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!("{SELECT_EVENT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        row.map(EventRow::into_event).transpose()
    }

    async fn find_event(
        &mut self,
        tour_id: Uuid,
        date: DateTime<Utc>,
        kind: EventKind,
    ) -> CoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "{SELECT_EVENT} WHERE tour_id = $1 AND date = $2 AND kind = $3"
        ))
        .bind(tour_id)
        .bind(date)
        .bind(kind_to_str(kind))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        row.map(EventRow::into_event).transpose()
    }

    async fn insert_event(&mut self, event: &Event) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, tour_id, date, capacity, occupied, kind, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id)
        .bind(event.tour_id)
        .bind(event.date)
        .bind(event.capacity)
        .bind(event.occupied)
        .bind(kind_to_str(event.kind))
        .bind(event_status_to_str(event.status))
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> CoreResult<()> {
        // occupied deliberately absent: it only moves through adjust_occupied
        let result = sqlx::query(
            r#"
            UPDATE events
            SET tour_id = $2, date = $3, capacity = $4, kind = $5, status = $6, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(event.tour_id)
        .bind(event.date)
        .bind(event.capacity)
        .bind(kind_to_str(event.kind))
        .bind(event_status_to_str(event.status))
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("event", event.id));
        }
        Ok(())
    }

    async fn delete_event(&mut self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("event", id));
        }
        Ok(())
    }

    async fn adjust_occupied(&mut self, event_id: Uuid, delta: i32) -> CoreResult<i32> {
        let updated: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE events
            SET occupied = occupied + $2, updated_at = NOW()
            WHERE id = $1
              AND occupied::bigint + $2::bigint >= 0
              AND occupied::bigint + $2::bigint <= capacity::bigint
            RETURNING occupied
            "#,
        )
        .bind(event_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        match updated {
            Some((occupied,)) => Ok(occupied),
            None => {
                let row: Option<(i32, i32)> =
                    sqlx::query_as("SELECT occupied, capacity FROM events WHERE id = $1")
                        .bind(event_id)
                        .fetch_optional(&mut *self.tx)
                        .await
                        .map_err(map_db_err)?;

                match row {
                    None => Err(CoreError::not_found("event", event_id)),
                    Some(_) if delta < 0 => Err(CoreError::Validation(format!(
                        "occupancy of event {event_id} would drop below zero"
                    ))),
                    Some((occupied, capacity)) => Err(CoreError::CapacityExceeded {
                        requested: delta,
                        available: capacity - occupied,
                    }),
                }
            }
        }
    }

    async fn get_booking(&mut self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn insert_booking(&mut self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, event_id, pax, customer, status, payment_info, previous_states, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.pax)
        .bind(serde_json::to_value(&booking.customer).map_err(storage_err)?)
        .bind(booking_status_to_str(booking.status))
        .bind(
            booking
                .payment_info
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(storage_err)?,
        )
        .bind(serde_json::to_value(&booking.previous_states).map_err(storage_err)?)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET event_id = $2, pax = $3, customer = $4, status = $5,
                payment_info = $6, previous_states = $7, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.pax)
        .bind(serde_json::to_value(&booking.customer).map_err(storage_err)?)
        .bind(booking_status_to_str(booking.status))
        .bind(
            booking
                .payment_info
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(storage_err)?,
        )
        .bind(serde_json::to_value(&booking.previous_states).map_err(storage_err)?)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("booking", booking.id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        self.tx.commit().await.map_err(map_db_err)
    }
}
