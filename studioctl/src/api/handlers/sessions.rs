use crate::api::models::reservations::SessionBookingResponse;
use crate::api::models::sessions::{
    AdminSessionDetailResponse, ListSessionsQuery, SessionCreate, SessionDetailResponse, SessionResponse, SessionUpdate,
};
use crate::auth::CurrentUser;
use crate::db::handlers::{Reservations, Sessions};
use crate::db::models::sessions::{SessionCreateDBRequest, SessionUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::SessionId;
use crate::{notifications, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};

#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    summary = "List sessions",
    description = "Sessions with live seat availability, defaulting to the upcoming week",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Sessions in the range", body = Vec<SessionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
    _current_user: CurrentUser,
) -> Result<Json<Vec<SessionResponse>>> {
    let from = query.from.unwrap_or_else(Utc::now);
    let to = query.to.unwrap_or(from + Duration::days(7));
    if to < from {
        return Err(Error::BadRequest {
            message: "'to' must not be before 'from'".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let sessions = Sessions::new(&mut pool_conn).list_between(from, to).await?;

    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    tag = "sessions",
    summary = "Get session",
    description = "One session with its occupied bed numbers, for the seat picker",
    params(("session_id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session details", body = SessionDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    _current_user: CurrentUser,
) -> Result<Json<SessionDetailResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let session = Sessions::new(&mut pool_conn)
        .get_with_occupancy(session_id)
        .await?
        .ok_or(Error::NotFound {
            resource: "Session".to_string(),
            id: session_id.to_string(),
        })?;
    let booked_beds = Reservations::new(&mut pool_conn).occupied_beds(session_id).await?;

    Ok(Json(SessionDetailResponse {
        session: SessionResponse::from(session),
        booked_beds,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/schedule/sessions/{session_id}",
    tag = "sessions",
    summary = "Get session with bookings",
    description = "Session details plus every active reservation with its id and seat holder, for desk management",
    params(("session_id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session with bookings", body = AdminSessionDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn admin_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    current_user: CurrentUser,
) -> Result<Json<AdminSessionDetailResponse>> {
    current_user.require_admin("sessions")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let session = Sessions::new(&mut pool_conn)
        .get_with_occupancy(session_id)
        .await?
        .ok_or(Error::NotFound {
            resource: "Session".to_string(),
            id: session_id.to_string(),
        })?;
    let bookings = Reservations::new(&mut pool_conn).list_active_with_holders(session_id).await?;

    Ok(Json(AdminSessionDetailResponse {
        session: SessionResponse::from(session),
        bookings: bookings.into_iter().map(SessionBookingResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/schedule/sessions",
    tag = "sessions",
    summary = "Create session",
    request_body = SessionCreate,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "A scheduled session already starts at that instant"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<SessionCreate>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    current_user.require_admin("sessions")?;
    if create.duration_min <= 0 || create.capacity_total < 1 {
        return Err(Error::BadRequest {
            message: "Duration and capacity must be positive".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let session = Sessions::new(&mut pool_conn)
        .create(&SessionCreateDBRequest {
            title: create.title,
            session_type: create.session_type,
            starts_at: create.starts_at,
            duration_min: create.duration_min,
            capacity_total: create.capacity_total,
            instructor_name: create.instructor_name,
            location_name: create.location_name,
        })
        .await?;

    let with_occupancy = Sessions::new(&mut pool_conn)
        .get_with_occupancy(session.id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "read back a session that was just created".to_string(),
        })?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(with_occupancy))))
}

#[utoipa::path(
    patch,
    path = "/admin/schedule/sessions/{session_id}",
    tag = "sessions",
    summary = "Update session",
    request_body = SessionUpdate,
    params(("session_id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session updated", body = SessionResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    current_user: CurrentUser,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<SessionResponse>> {
    current_user.require_admin("sessions")?;
    if update.duration_min.is_some_and(|d| d <= 0) || update.capacity_total.is_some_and(|c| c < 1) {
        return Err(Error::BadRequest {
            message: "Duration and capacity must be positive".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    // Capacity may not shrink below the seats already taken
    if let Some(new_capacity) = update.capacity_total {
        Sessions::new(&mut tx)
            .get_for_update(session_id)
            .await?
            .ok_or(Error::NotFound {
                resource: "Session".to_string(),
                id: session_id.to_string(),
            })?;
        let occupied = Sessions::new(&mut tx).occupied_count(session_id).await?;
        if i64::from(new_capacity) < occupied {
            return Err(Error::BadRequest {
                message: format!("Capacity cannot drop below the {occupied} beds already booked"),
            });
        }
    }

    let session = Sessions::new(&mut tx)
        .update(
            session_id,
            &SessionUpdateDBRequest {
                title: update.title,
                session_type: update.session_type,
                starts_at: update.starts_at,
                duration_min: update.duration_min,
                capacity_total: update.capacity_total,
                instructor_name: update.instructor_name,
            },
        )
        .await?
        .ok_or(Error::NotFound {
            resource: "Session".to_string(),
            id: session_id.to_string(),
        })?;

    let with_occupancy = Sessions::new(&mut tx)
        .get_with_occupancy(session.id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "read back a session that was just updated".to_string(),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(SessionResponse::from(with_occupancy)))
}

#[utoipa::path(
    post,
    path = "/admin/schedule/sessions/{session_id}/cancel",
    tag = "sessions",
    summary = "Cancel session",
    description = "Cancel a session and release every active reservation on it",
    params(("session_id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session canceled", body = SessionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    current_user: CurrentUser,
) -> Result<Json<SessionResponse>> {
    current_user.require_admin("sessions")?;

    let (session, released) = crate::booking::cancel_session(&state.db, session_id, Utc::now()).await?;
    // Fire notifications only after the cascade has committed
    notifications::session_canceled(&session, &released);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let with_occupancy = Sessions::new(&mut pool_conn)
        .get_with_occupancy(session.id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "read back a session that was just canceled".to_string(),
        })?;

    Ok(Json(SessionResponse::from(with_occupancy)))
}
