use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-secret-key";

/// All `/admin/*` routes require the shared secret header. No retries, no
/// fallback: a missing or wrong key is a hard 401.
pub async fn require_admin_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.auth.admin_secret_key => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized),
    }
}
