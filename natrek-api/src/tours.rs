use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use natrek_core::tour::{PricingTier, Tour};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/tours", get(list_tours).post(create_tour))
        .route("/admin/tours/{id}", get(get_tour).put(update_tour))
}

async fn list_tours(State(state): State<AppState>) -> Result<Json<Vec<Tour>>, AppError> {
    Ok(Json(state.bookings.store().list_tours().await?))
}

async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tour>, AppError> {
    let tour = state
        .bookings
        .store()
        .get_tour(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tour not found: {id}")))?;
    Ok(Json(tour))
}

#[derive(Debug, Deserialize)]
pub struct CreateTourRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pricing_tiers: Vec<PricingTier>,
}

async fn create_tour(
    State(state): State<AppState>,
    Json(req): Json<CreateTourRequest>,
) -> Result<(StatusCode, Json<Tour>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("tour name is required".to_string()));
    }
    let tour = Tour::new(req.name, req.description, req.pricing_tiers);
    let tour = state.bookings.create_tour(&tour).await?;
    Ok((StatusCode::CREATED, Json(tour)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTourRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub pricing_tiers: Option<Vec<PricingTier>>,
    pub active: Option<bool>,
}

async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTourRequest>,
) -> Result<Json<Tour>, AppError> {
    let mut tour = state
        .bookings
        .store()
        .get_tour(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tour not found: {id}")))?;

    if let Some(name) = req.name {
        tour.name = name;
    }
    if let Some(description) = req.description {
        tour.description = description;
    }
    if let Some(pricing_tiers) = req.pricing_tiers {
        tour.pricing_tiers = pricing_tiers;
    }
    if let Some(active) = req.active {
        tour.active = active;
    }

    let tour = state.bookings.update_tour(&tour).await?;
    Ok(Json(tour))
}
