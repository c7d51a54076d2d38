use std::net::SocketAddr;
use std::sync::Arc;

use natrek_api::{app, AppState, AuthConfig};
use natrek_api::middleware::rate_limit::RateLimiter;
use natrek_booking::BookingService;
use natrek_store::PgStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "natrek_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = natrek_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Natrek API on port {}", config.server.port);

    let store = PgStore::connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    store.migrate().await.expect("Failed to run migrations");

    let state = AppState {
        bookings: BookingService::new(Arc::new(store), config.business_rules.clone()),
        auth: AuthConfig {
            admin_secret_key: config.auth.admin_secret_key.clone(),
        },
        rate_limiter: RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_seconds,
        ),
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
