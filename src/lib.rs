//! Commerce Backend - catalog API server and the typed client that drives it

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
pub mod uploads;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::Store;
use crate::error::StartupError;
use crate::logging::LogConfig;
use crate::state::AppState;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dashboard and storefront dev servers.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:3002"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/** API routes, mounted under `/api` */
fn api_routes() -> Router<AppState> {
    use routes::{auth, categories, health, orders, products, reviews, users};

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", post(auth::verify_token))
        .route("/auth/change-password", post(auth::change_password))
        .route("/user", get(users::list_users).patch(users::update_profile))
        .route("/user/create", post(users::create_user))
        .route("/user/me", get(users::me))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/products/{id}/toggle-publish",
            patch(products::toggle_publish),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            patch(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route("/reviews/{id}", axum::routing::delete(reviews::delete_review))
        .route("/reviews/{id}/approve", patch(reviews::approve_review))
        .route("/reviews/{id}/reject", patch(reviews::reject_review))
        .route("/reviews/{id}/toggle-publish", patch(reviews::toggle_publish))
        .route("/orders", get(orders::list_orders).post(orders::place_order))
        .route("/orders/stats", get(orders::order_stats))
        .route("/orders/{id}/status", patch(orders::update_order_status))
        .route("/health", get(health::health_ping))
        .route("/health/detailed", get(health::health_detailed))
        .route("/health/database", get(health::health_database))
        .route("/health/ready", get(health::health_ready))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let upload_files = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .nest("/api", api_routes())
        .nest_service(uploads::PUBLIC_PREFIX, upload_files)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Room for a 5 MB image plus the multipart framing.
        .layer(RequestBodyLimitLayer::new(uploads::MAX_FILE_SIZE + 64 * 1024))
        .layer(configure_cors())
}

/// Postgres when `DATABASE_URL` is set, otherwise the in-memory store.
async fn open_store() -> Result<Store, StartupError> {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::warn!("DATABASE_URL not set. Running on the in-memory store; data is not persisted.");
        return Ok(Store::memory());
    }
    let pool = db::init_pool(None).await?;
    db::run_migrations(&pool).await?;
    Ok(Store::postgres(pool))
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    let _log_guards = logging::init(&LogConfig::default())?;
    routes::health::init_start_time();

    let config = AppConfig::from_env();
    config.validate()?;
    let addr = config.bind_addr()?;

    let state = AppState::new(config, open_store().await?);
    auth::seed_admin(&state).await?;

    let app = create_app(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::send;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_app(AppState::for_tests());
        let (status, _) = send(&app, "GET", "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_is_mounted_under_api() {
        let app = create_app(AppState::for_tests());
        let (status, body) = send(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
