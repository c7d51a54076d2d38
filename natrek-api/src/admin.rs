use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use natrek_booking::lifecycle::BookingUpdate;
use natrek_core::booking::{Booking, BookingStatus};
use natrek_core::dates;

use crate::error::AppError;
use crate::public::CustomerPayload;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/bookings", get(list_bookings))
        .route("/admin/bookings/{id}", get(get_booking).put(update_booking))
        .route("/admin/bookings/{id}/status", put(set_status))
        .route("/admin/bookings/{id}/move", post(move_booking))
        .route("/admin/bookings/{id}/transfer", post(transfer_booking))
}

async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.store().list_bookings().await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .store()
        .get_booking(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking not found: {id}")))?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub pax: Option<i32>,
    pub customer: Option<CustomerPayload>,
    /// A date change relocates the booking; it never writes a date onto it.
    pub new_date: Option<String>,
    pub new_tour_id: Option<Uuid>,
}

async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let new_date = req.new_date.as_deref().map(dates::normalize_input).transpose()?;
    let booking = state
        .bookings
        .update(
            id,
            &BookingUpdate {
                pax: req.pax,
                customer: req.customer.map(Into::into),
                new_date,
                new_tour_id: req.new_tour_id,
            },
        )
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct StatusOverrideRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusOverrideRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.set_status(id, req.status, req.reason).await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct MoveBookingRequest {
    pub new_tour_id: Option<Uuid>,
    pub new_date: String,
    pub reason: Option<String>,
}

async fn move_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let new_date = dates::normalize_input(&req.new_date)?;
    let booking = state
        .bookings
        .move_booking(id, req.new_tour_id, new_date, req.reason)
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
pub struct TransferBookingRequest {
    pub destination_event_id: Uuid,
    pub reason: Option<String>,
}

async fn transfer_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransferBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .transfer(id, req.destination_event_id, req.reason)
        .await?;
    Ok(Json(booking))
}
