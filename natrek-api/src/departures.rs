use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use natrek_booking::lifecycle::{CreateDeparture, DepartureUpdate};
use natrek_core::dates;
use natrek_core::event::{Event, EventKind, EventStatus};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/departures", get(list_departures).post(create_departure))
        .route(
            "/admin/departures/{id}",
            get(get_departure).put(update_departure).delete(delete_departure),
        )
}

async fn list_departures(State(state): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.bookings.store().list_events().await?))
}

async fn get_departure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Event>, AppError> {
    let event = state
        .bookings
        .store()
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("departure not found: {id}")))?;
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartureRequest {
    pub tour_id: Uuid,
    pub date: String,
    #[serde(default = "default_kind")]
    pub kind: EventKind,
    pub capacity: Option<i32>,
}

fn default_kind() -> EventKind {
    EventKind::Public
}

async fn create_departure(
    State(state): State<AppState>,
    Json(req): Json<CreateDepartureRequest>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let date = dates::normalize_input(&req.date)?;
    let event = state
        .bookings
        .create_departure(&CreateDeparture {
            tour_id: req.tour_id,
            date,
            kind: req.kind,
            capacity: req.capacity,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartureRequest {
    pub capacity: Option<i32>,
    pub status: Option<EventStatus>,
}

async fn update_departure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDepartureRequest>,
) -> Result<Json<Event>, AppError> {
    let event = state
        .bookings
        .update_departure(id, &DepartureUpdate { capacity: req.capacity, status: req.status })
        .await?;
    Ok(Json(event))
}

async fn delete_departure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.bookings.delete_departure(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
