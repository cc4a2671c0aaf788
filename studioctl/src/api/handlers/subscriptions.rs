use crate::api::models::subscriptions::{PlanResponse, SubscriptionViewResponse};
use crate::auth::CurrentUser;
use crate::db::handlers::Plans;
use crate::errors::{Error, Result};
use crate::quota::{self, Usage};
use crate::{subscriptions, AppState};
use axum::{extract::State, Json};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/subscription-plans",
    tag = "subscriptions",
    summary = "List subscription plans",
    responses(
        (status = 200, description = "Plans currently offered", body = Vec<PlanResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_plans(State(state): State<AppState>, _current_user: CurrentUser) -> Result<Json<Vec<PlanResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let plans = Plans::new(&mut pool_conn).list_active().await?;

    Ok(Json(plans.into_iter().map(PlanResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/me/subscription",
    tag = "subscriptions",
    summary = "Get my subscription",
    description = "The caller's current and queued subscription periods plus any open payment submission",
    responses(
        (status = 200, description = "Subscription view", body = SubscriptionViewResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_my_subscription(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<SubscriptionViewResponse>> {
    let today = Utc::now().with_timezone(&state.config.timezone).date_naive();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let view = subscriptions::view(&mut pool_conn, current_user.id, today).await?;

    Ok(Json(SubscriptionViewResponse::from(view)))
}

#[utoipa::path(
    get,
    path = "/me/subscription/usage",
    tag = "subscriptions",
    summary = "Get my quota usage",
    description = "Booked counts against the weekly and monthly limits, derived from active reservations",
    responses(
        (status = 200, description = "Current usage", body = Usage),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_my_usage(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Usage>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let usage = quota::usage(&mut pool_conn, current_user.id, Utc::now(), state.config.timezone).await?;

    Ok(Json(usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        auth_header, create_active_subscription, create_test_plan, create_test_server, create_test_session,
        create_test_user,
    };
    use chrono::Duration;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_plans_listing_excludes_retired_plans(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let active = create_test_plan(&pool, 12).await;
        let retired = create_test_plan(&pool, 8).await;
        sqlx::query("UPDATE plans SET active = FALSE WHERE id = $1")
            .bind(retired.id)
            .execute(&pool)
            .await
            .unwrap();

        let (name, value) = auth_header(&user);
        let response = server.get("/v1/subscription-plans").add_header(name, value).await;
        response.assert_status_ok();

        let plans: Vec<PlanResponse> = response.json();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].id, active.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_subscription_view_for_member_without_one(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool, false).await;

        let (name, value) = auth_header(&user);
        let response = server.get("/v1/me/subscription").add_header(name, value).await;
        response.assert_status_ok();

        let view: serde_json::Value = response.json();
        assert_eq!(view["current"], json!(null));
        assert_eq!(view["next"], json!(null));
        assert_eq!(view["pending"], json!(null));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_usage_reflects_booked_sessions(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        create_active_subscription(&pool, user.id, plan.id, 12).await;
        let session = create_test_session(&pool, Utc::now() + Duration::days(1), 8).await;

        sqlx::query("INSERT INTO reservations (session_id, user_id, bed_number) VALUES ($1, $2, 1)")
            .bind(session.id)
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        let (name, value) = auth_header(&user);
        let response = server.get("/v1/me/subscription/usage").add_header(name, value).await;
        response.assert_status_ok();

        let usage: Usage = response.json();
        assert_eq!(usage.weekly_limit, 3);
        assert_eq!(usage.monthly_used, Some(1));
        assert_eq!(usage.monthly_limit, Some(12));
    }
}
