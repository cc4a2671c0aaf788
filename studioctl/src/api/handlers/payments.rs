use crate::api::models::payments::{ListSubmissionsQuery, ResolveRequest, SubmissionCreate, SubmissionResponse};
use crate::auth::CurrentUser;
use crate::db::handlers::Submissions;
use crate::db::models::submissions::SubmissionStatus;
use crate::errors::{Error, Result};
use crate::types::SubmissionId;
use crate::{subscriptions, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/me/payments/submissions",
    tag = "payments",
    summary = "Submit proof of payment",
    description = "Request a subscription change backed by an out-of-band payment. One open submission per member",
    request_body = SubmissionCreate,
    responses(
        (status = 201, description = "Submission recorded", body = SubmissionResponse),
        (status = 400, description = "Plan retired or invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "A submission is already awaiting review, or the action needs a current subscription"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_submission(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<SubmissionCreate>,
) -> Result<(StatusCode, Json<SubmissionResponse>)> {
    let today = Utc::now().with_timezone(&state.config.timezone).date_naive();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submission = subscriptions::submit(
        &mut pool_conn,
        current_user.id,
        create.plan_id,
        create.requested_action,
        create.method,
        create.proof_url,
        today,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(SubmissionResponse::from(submission))))
}

#[utoipa::path(
    get,
    path = "/me/payments/submissions",
    tag = "payments",
    summary = "List my submissions",
    responses(
        (status = 200, description = "The caller's submissions, newest first", body = Vec<SubmissionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_submissions(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<Vec<SubmissionResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submissions = Submissions::new(&mut pool_conn).list_for_user(current_user.id).await?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/me/payments/submissions/withdraw",
    tag = "payments",
    summary = "Withdraw my open submission",
    responses(
        (status = 200, description = "Submission withdrawn", body = SubmissionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No open submission"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn withdraw_submission(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<SubmissionResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let withdrawn = subscriptions::withdraw(&mut pool_conn, current_user.id).await?;

    Ok(Json(SubmissionResponse::from(withdrawn)))
}

#[utoipa::path(
    get,
    path = "/admin/payments/submissions",
    tag = "payments",
    summary = "List submissions for review",
    params(ListSubmissionsQuery),
    responses(
        (status = 200, description = "Submissions in the requested status, oldest first", body = Vec<SubmissionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn admin_list_submissions(
    State(state): State<AppState>,
    Query(query): Query<ListSubmissionsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<SubmissionResponse>>> {
    current_user.require_admin("payment submissions")?;

    let status = query.status.unwrap_or(SubmissionStatus::Submitted);
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let submissions = Submissions::new(&mut pool_conn).list_by_status(status).await?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/admin/payments/submissions/{submission_id}/approve",
    tag = "payments",
    summary = "Approve submission",
    description = "Apply the requested subscription change and mark the submission approved, atomically. Effective dates are computed at approval time",
    request_body = ResolveRequest,
    params(("submission_id" = uuid::Uuid, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission approved", body = SubmissionResponse),
        (status = 400, description = "Submission already resolved"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Submission not found"),
        (status = 409, description = "The requested action needs a current subscription"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn approve_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<SubmissionId>,
    current_user: CurrentUser,
    Json(resolve): Json<ResolveRequest>,
) -> Result<Json<SubmissionResponse>> {
    current_user.require_admin("payment submissions")?;
    let today = Utc::now().with_timezone(&state.config.timezone).date_naive();

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let approved = subscriptions::approve(&mut tx, submission_id, resolve.admin_note.as_deref(), today).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(SubmissionResponse::from(approved)))
}

#[utoipa::path(
    post,
    path = "/admin/payments/submissions/{submission_id}/reject",
    tag = "payments",
    summary = "Reject submission",
    request_body = ResolveRequest,
    params(("submission_id" = uuid::Uuid, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission rejected", body = SubmissionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No open submission with that ID"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reject_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<SubmissionId>,
    current_user: CurrentUser,
    Json(resolve): Json<ResolveRequest>,
) -> Result<Json<SubmissionResponse>> {
    current_user.require_admin("payment submissions")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rejected = subscriptions::reject(&mut pool_conn, submission_id, resolve.admin_note.as_deref()).await?;

    Ok(Json(SubmissionResponse::from(rejected)))
}
