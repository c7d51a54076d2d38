use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use natrek_booking::lifecycle::CreateBooking;
use natrek_booking::payments::{ConfirmOutcome, ConfirmRequest, PaymentInit};
use natrek_core::booking::{Booking, BookingStatus, Customer};
use natrek_core::dates;
use natrek_core::event::EventKind;
use natrek_core::payment::ProviderStatus;

use crate::error::AppError;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let creation = Router::new()
        .route("/public/bookings/private", post(create_private))
        .route("/public/bookings/join", post(join_shared))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            rate_limit_middleware,
        ));

    Router::new()
        .merge(creation)
        .route("/public/bookings/{id}", get(get_booking))
        .route("/public/payments/init", post(init_payment))
        .route("/public/payments/webhook", post(payment_webhook))
}

#[derive(Debug, Deserialize)]
pub struct CustomerPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document: Option<String>,
}

impl From<CustomerPayload> for Customer {
    fn from(payload: CustomerPayload) -> Self {
        Customer {
            name: payload.name,
            email: payload.email,
            phone: payload.phone,
            document: payload.document,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tour_id: Uuid,
    /// `YYYY-MM-DD` or RFC 3339; normalized at this boundary.
    pub date: String,
    pub pax: i32,
    pub customer: CustomerPayload,
}

#[derive(Debug, Serialize)]
struct BookingCreatedResponse {
    booking_id: Uuid,
    event_id: Uuid,
    status: BookingStatus,
}

/// Public read model: no customer PII, whatever the booking's state.
#[derive(Debug, Serialize)]
pub struct PublicBookingView {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: Option<ProviderStatus>,
    pub payment_ref: Option<String>,
}

impl From<&Booking> for PublicBookingView {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            status: booking.status,
            payment_status: booking.payment_info.as_ref().map(|p| p.status),
            payment_ref: booking.payment_info.as_ref().map(|p| p.reference.clone()),
        }
    }
}

async fn create_private(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingCreatedResponse>), AppError> {
    create_with_kind(state, req, EventKind::Private).await
}

async fn join_shared(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingCreatedResponse>), AppError> {
    create_with_kind(state, req, EventKind::Public).await
}

async fn create_with_kind(
    state: AppState,
    req: CreateBookingRequest,
    kind: EventKind,
) -> Result<(StatusCode, Json<BookingCreatedResponse>), AppError> {
    let date = dates::normalize_input(&req.date)?;
    let booking = state
        .bookings
        .create(&CreateBooking {
            tour_id: req.tour_id,
            date,
            kind,
            pax: req.pax,
            customer: req.customer.into(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreatedResponse {
            booking_id: booking.id,
            event_id: booking.event_id,
            status: booking.status,
        }),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicBookingView>, AppError> {
    let booking = state
        .bookings
        .store()
        .get_booking(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking not found: {id}")))?;

    Ok(Json(PublicBookingView::from(&booking)))
}

#[derive(Debug, Deserialize)]
pub struct InitPaymentRequest {
    pub booking_id: Uuid,
}

async fn init_payment(
    State(state): State<AppState>,
    Json(req): Json<InitPaymentRequest>,
) -> Result<Json<PaymentInit>, AppError> {
    let init = state.bookings.init_payment(req.booking_id).await?;
    Ok(Json(init))
}

/// Provider callback payload, as delivered by the payment gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment_status: String,
    pub reference: String,
    pub tx_id: String,
    pub amount: i64,
    #[allow(dead_code)]
    pub currency: Option<String>,
}

async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider_status = ProviderStatus::parse(&payload.payment_status)?;
    let outcome = state
        .bookings
        .confirm_payment(&ConfirmRequest {
            reference: payload.reference,
            provider_status,
            transaction_id: payload.tx_id,
            amount: payload.amount,
        })
        .await?;

    // Providers retry on anything but 2xx, so duplicates and stale
    // deliveries are acknowledged as success.
    let result = match outcome {
        ConfirmOutcome::Applied => "applied",
        ConfirmOutcome::Duplicate => "duplicate",
        ConfirmOutcome::Recorded => "recorded",
        ConfirmOutcome::Stale => "stale",
    };
    Ok(Json(json!({ "result": result })))
}
