//! # studioctl: Booking and Capacity Engine for a Reformer Pilates Studio
//!
//! `studioctl` is the backend for a small pilates studio: it turns a weekly
//! opening-hours template into concrete sessions, lets members book numbered
//! beds on them, and enforces the studio's subscription quotas while doing so.
//!
//! ## Overview
//!
//! The studio runs group classes on a fixed fleet of reformer beds. Members
//! hold monthly subscriptions that cap how many classes they can attend per
//! week and per subscription period. Payments happen out of band (cash at the
//! desk or a bank transfer), so subscription changes flow through a
//! submit-and-review cycle rather than a payment provider.
//!
//! The engine's job is to make double-bookings impossible and quotas exact
//! under concurrent traffic. Seat uniqueness and the one-reservation-per-user
//! rule live in partial unique indexes, so the database is the arbiter of
//! every race; counts (occupancy, quota usage) are always derived from the
//! reservation rows and never stored.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum) and all
//! persistence is PostgreSQL via sqlx. Requests arrive pre-authenticated from
//! a reverse proxy that sets the `x-studio-user` header; the API trusts it
//! and resolves the caller against the users table.
//!
//! The **API layer** ([`api`]) exposes the consumer surface (sessions,
//! reservations, subscription view, payment submissions) and the admin
//! surface (schedule template, session generation, desk bookings, payment
//! review) under `/v1/*`.
//!
//! The **database layer** ([`db`]) uses the repository pattern: one handler
//! per entity working over `&mut PgConnection`, so services compose them
//! inside a single transaction.
//!
//! The **domain services** ([`booking`], [`generator`], [`quota`],
//! [`subscriptions`]) hold the sequencing rules: the booking transaction,
//! template expansion, window arithmetic in the studio timezone, and the
//! subscription state machine.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use studioctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = studioctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     studioctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod errors;
pub mod generator;
mod notifications;
mod openapi;
pub mod quota;
pub mod subscriptions;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::db::handlers::Users;
use crate::openapi::ApiDoc;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use bon::Builder;
pub use config::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the studioctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist. Idempotent; called on
/// every startup so a fresh deployment always has an admin.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, full_name: &str, db: &PgPool) -> Result<types::UserId, anyhow::Error> {
    let mut conn = db.acquire().await?;
    let admin = Users::new(&mut conn).ensure_admin(email, full_name).await?;
    Ok(admin.id)
}

/// Build the application router: consumer and admin endpoints under `/v1`,
/// health check, and interactive API docs.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Consumer surface
        .route("/sessions", get(api::handlers::sessions::list_sessions))
        .route("/sessions/{session_id}", get(api::handlers::sessions::get_session))
        .route("/reservations", post(api::handlers::reservations::create_reservation))
        .route("/reservations/my", get(api::handlers::reservations::list_my_reservations))
        .route(
            "/reservations/{reservation_id}/cancel",
            post(api::handlers::reservations::cancel_reservation),
        )
        .route("/subscription-plans", get(api::handlers::subscriptions::list_plans))
        .route("/me/subscription", get(api::handlers::subscriptions::get_my_subscription))
        .route("/me/subscription/usage", get(api::handlers::subscriptions::get_my_usage))
        .route(
            "/me/payments/submissions",
            post(api::handlers::payments::create_submission).get(api::handlers::payments::list_my_submissions),
        )
        .route(
            "/me/payments/submissions/withdraw",
            post(api::handlers::payments::withdraw_submission),
        )
        // Admin surface
        .route(
            "/admin/schedule/settings",
            get(api::handlers::schedule::get_settings).put(api::handlers::schedule::update_settings),
        )
        .route(
            "/admin/schedule/generate-sessions",
            post(api::handlers::schedule::generate_sessions),
        )
        .route("/admin/schedule/sessions", post(api::handlers::sessions::create_session))
        .route(
            "/admin/schedule/sessions/{session_id}",
            get(api::handlers::sessions::admin_get_session).patch(api::handlers::sessions::update_session),
        )
        .route(
            "/admin/schedule/sessions/{session_id}/cancel",
            post(api::handlers::sessions::cancel_session),
        )
        .route(
            "/admin/schedule/sessions/{session_id}/bookings",
            post(api::handlers::reservations::admin_create_booking),
        )
        .route(
            "/admin/schedule/sessions/{session_id}/bookings/{reservation_id}",
            delete(api::handlers::reservations::admin_cancel_booking),
        )
        .route(
            "/admin/payments/submissions",
            get(api::handlers::payments::admin_list_submissions),
        )
        .route(
            "/admin/payments/submissions/{submission_id}/approve",
            post(api::handlers::payments::approve_submission),
        )
        .route(
            "/admin/payments/submissions/{submission_id}/reject",
            post(api::handlers::payments::reject_submission),
        )
        .with_state(state);

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct owning the router, pool and configuration.
///
/// 1. **Create**: [`Application::new`] connects to PostgreSQL, runs
///    migrations, and ensures the initial admin user exists
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .connect(&config.database.url)
            .await?;

        Self::new_with_pool(config, pool).await
    }

    /// Build on an existing pool; migrations and admin bootstrap still run.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        migrator().run(&pool).await?;
        create_initial_admin_user(&config.admin_email, &config.admin_name, &pool).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Convert into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Booking engine listening on http://{bind_addr}");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
