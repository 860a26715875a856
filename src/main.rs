use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use venuebook::config::AppConfig;
use venuebook::db;
use venuebook::handlers;
use venuebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/users", post(handlers::users::create_user))
        .route("/api/venues", get(handlers::venues::list_venues))
        .route("/api/venues", post(handlers::venues::create_venue))
        .route("/api/venues/:id", get(handlers::venues::get_venue))
        .route("/api/venues/:id", put(handlers::venues::update_venue))
        .route("/api/venues/:id", delete(handlers::venues::delete_venue))
        .route("/api/venues/:id/addons", post(handlers::venues::add_addon))
        .route(
            "/api/venues/:id/reviews",
            get(handlers::reviews::list_reviews),
        )
        .route(
            "/api/venues/:id/reviews",
            post(handlers::reviews::submit_review),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route(
            "/api/bookings/:id/approve",
            post(handlers::bookings::approve_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/pay",
            post(handlers::bookings::confirm_payment),
        )
        .route(
            "/api/bookings/:id/complete",
            post(handlers::bookings::complete_booking),
        )
        .route(
            "/api/bookings/:id/addons",
            post(handlers::bookings::set_addons),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
