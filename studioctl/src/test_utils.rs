//! Shared helpers for integration-style tests. Every creator returns the
//! database row it inserted so tests can assert against real ids.

use crate::db::handlers::{Plans, Sessions, Subscriptions, Users};
use crate::db::models::plans::{PlanCreateDBRequest, PlanDBResponse};
use crate::db::models::sessions::{SessionCreateDBRequest, SessionDBResponse, SessionType};
use crate::db::models::subscriptions::{SubscriptionCreateDBRequest, SubscriptionDBResponse};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::types::{PlanId, UserId};
use crate::{auth::USER_HEADER, AppState, Application, Config};
use axum::http::{HeaderName, HeaderValue};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU64, Ordering};

static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_suffix() -> u64 {
    UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub fn create_test_config() -> Config {
    Config {
        port: 0,
        ..Config::default()
    }
}

/// Application state over the test pool, for exercising extractors directly.
pub async fn create_test_app(pool: PgPool) -> AppState {
    AppState::builder().db(pool).config(create_test_config()).build()
}

/// Full router wrapped in an in-process test server.
pub async fn create_test_server(pool: PgPool) -> axum_test::TestServer {
    let app = Application::new_with_pool(create_test_config(), pool)
        .await
        .expect("Failed to build test application");
    app.into_test_server()
}

/// The proxy identity header for `user`.
pub fn auth_header(user: &UserDBResponse) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(USER_HEADER),
        HeaderValue::from_str(&user.email).expect("test email is a valid header value"),
    )
}

pub async fn create_test_user(pool: &PgPool, is_admin: bool) -> UserDBResponse {
    let n = unique_suffix();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            full_name: format!("Test User {n}"),
            email: format!("user{n}@example.com"),
            phone: None,
            is_admin,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_admin(pool: &PgPool) -> UserDBResponse {
    create_test_user(pool, true).await
}

pub async fn create_test_plan(pool: &PgPool, monthly_limit: i32) -> PlanDBResponse {
    let n = unique_suffix();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Plans::new(&mut conn)
        .create(&PlanCreateDBRequest {
            name: format!("Plan {monthly_limit}x {n}"),
            monthly_limit,
            price: Decimal::new(7900, 2),
        })
        .await
        .expect("Failed to create test plan")
}

pub async fn create_test_session(pool: &PgPool, starts_at: DateTime<Utc>, capacity: i32) -> SessionDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Sessions::new(&mut conn)
        .create(&SessionCreateDBRequest {
            title: "Reformer Pilates".to_string(),
            session_type: SessionType::PilatesReformer,
            starts_at,
            duration_min: 60,
            capacity_total: capacity,
            instructor_name: None,
            location_name: None,
        })
        .await
        .expect("Failed to create test session")
}

/// An active subscription generously covering sessions a couple of weeks out.
pub async fn create_active_subscription(
    pool: &PgPool,
    user_id: UserId,
    plan_id: PlanId,
    monthly_limit: i32,
) -> SubscriptionDBResponse {
    let today = Utc::now().date_naive();
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Subscriptions::new(&mut conn)
        .create(&SubscriptionCreateDBRequest {
            user_id,
            plan_id,
            monthly_limit,
            start_date: today - Duration::days(1),
            end_date: today + Duration::days(60),
        })
        .await
        .expect("Failed to create test subscription")
}
