use natrek_booking::BookingService;

use crate::middleware::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AuthConfig {
    pub admin_secret_key: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: BookingService,
    pub auth: AuthConfig,
    pub rate_limiter: RateLimiter,
}
