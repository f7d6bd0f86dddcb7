use axum::{extract::State, http::StatusCode, routing::get, Router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reservation_system::{config::Config, controllers, services::registry, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reservation API");

    // Connect to Postgres and Redis, run migrations
    let app_state = AppState::new(config.clone())
        .await
        .expect("Failed to initialize application state");
    info!("Database connected");

    // Warm the upcoming-events cache in the background
    let state_for_bg = app_state.clone();
    task::spawn(async move {
        let today = controllers::today();
        match registry::list_upcoming(&state_for_bg, today).await {
            Ok(events) => {
                info!("Warmed upcoming events cache ({} events)", events.len());
                state_for_bg.cache.save_upcoming_events(today, &events).await;
            }
            Err(e) => error!("Cache warmup failed: {:?}", e),
        }
    });

    // Create the main router
    let app = Router::new()
        .route("/", get(|| async { "Reservation API v1.0" }))
        .route("/health", get(health))
        // Mount the routes from the controllers module
        .nest("/api", controllers::routes())
        // Pass the application state to the router
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.db.healthy().await && state.cache.healthy().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DEGRADED")
    }
}
