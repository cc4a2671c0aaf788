use crate::api::models::schedule::{DaySettingPayload, ScheduleSettingsResponse, ScheduleSettingsUpdate};
use crate::api::models::sessions::GenerateSessionsRequest;
use crate::auth::CurrentUser;
use crate::db::handlers::Schedule;
use crate::errors::{Error, Result};
use crate::generator::{self, GenerateParams, GenerationResult};
use crate::AppState;
use axum::{extract::State, Json};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/admin/schedule/settings",
    tag = "schedule",
    summary = "Get schedule settings",
    description = "The weekly template: seven days with their work periods",
    responses(
        (status = 200, description = "Current settings", body = ScheduleSettingsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ScheduleSettingsResponse>> {
    current_user.require_admin("schedule settings")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let days = Schedule::new(&mut pool_conn).settings().await?;

    Ok(Json(ScheduleSettingsResponse {
        timezone: state.config.timezone.to_string(),
        week_start: "sunday".to_string(),
        days: days.into_iter().map(DaySettingPayload::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/admin/schedule/settings",
    tag = "schedule",
    summary = "Update schedule settings",
    description = "Replace day settings and work periods. Future sessions already generated are not touched",
    request_body = ScheduleSettingsUpdate,
    responses(
        (status = 200, description = "Updated settings", body = ScheduleSettingsResponse),
        (status = 400, description = "Overlapping or inverted work periods"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_settings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(update): Json<ScheduleSettingsUpdate>,
) -> Result<Json<ScheduleSettingsResponse>> {
    current_user.require_admin("schedule settings")?;

    let requests = update
        .days
        .into_iter()
        .map(DaySettingPayload::into_write_request)
        .collect::<Result<Vec<_>>>()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    Schedule::new(&mut tx).replace(&requests).await?;
    let days = Schedule::new(&mut tx).settings().await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ScheduleSettingsResponse {
        timezone: state.config.timezone.to_string(),
        week_start: "sunday".to_string(),
        days: days.into_iter().map(DaySettingPayload::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/schedule/generate-sessions",
    tag = "schedule",
    summary = "Generate sessions",
    description = "Expand the weekly template into concrete sessions over a date range. Existing sessions at the same instant are skipped; dryRun previews without writing",
    request_body = GenerateSessionsRequest,
    responses(
        (status = 200, description = "Generation outcome", body = GenerationResult),
        (status = 400, description = "Invalid duration or weekday"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn generate_sessions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<GenerateSessionsRequest>,
) -> Result<Json<GenerationResult>> {
    current_user.require_admin("session generation")?;

    let params = GenerateParams {
        duration_minutes: request.duration_minutes,
        day_of_weeks: request.day_of_weeks,
        start_date: request.range.start_date,
        weeks: request.range.weeks.unwrap_or(1),
        dry_run: request.dry_run,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let result = generator::generate(&mut tx, &state.config.generator, &params, Utc::now(), state.config.timezone).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(result))
}
