use crate::api::models::reservations::{
    AdminBookingCreate, MyReservationResponse, MyReservationsQuery, ReservationCreate, ReservationListMode,
    ReservationResponse,
};
use crate::auth::CurrentUser;
use crate::booking::{self, Actor, BookingTarget};
use crate::db::handlers::{Reservations, Sessions};
use crate::errors::{ConflictCode, Error, Result};
use crate::types::{ReservationId, SessionId};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    summary = "Book a seat",
    description = "Book a numbered bed on a session for the calling account holder",
    request_body = ReservationCreate,
    responses(
        (status = 201, description = "Seat booked", body = ReservationResponse),
        (status = 400, description = "Invalid bed number"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Seat taken, session full, quota exhausted or no active subscription"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_reservation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ReservationCreate>,
) -> Result<(StatusCode, Json<ReservationResponse>)> {
    let reservation = booking::book(
        &state.db,
        state.config.timezone,
        current_user.id,
        create.session_id,
        create.bed_number,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ReservationResponse::from(reservation))))
}

#[utoipa::path(
    get,
    path = "/reservations/my",
    tag = "reservations",
    summary = "List my reservations",
    params(MyReservationsQuery),
    responses(
        (status = 200, description = "The caller's reservations with session details", body = Vec<MyReservationResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_reservations(
    State(state): State<AppState>,
    Query(query): Query<MyReservationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<MyReservationResponse>>> {
    let upcoming = !matches!(query.mode, Some(ReservationListMode::Past));
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reservations = Reservations::new(&mut pool_conn)
        .list_for_user(current_user.id, Utc::now(), upcoming, limit)
        .await?;

    Ok(Json(reservations.into_iter().map(MyReservationResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/reservations/{reservation_id}/cancel",
    tag = "reservations",
    summary = "Cancel my reservation",
    description = "Cancel one of the caller's reservations while the cutoff window is open",
    params(("reservation_id" = uuid::Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation canceled (idempotent)", body = ReservationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Cancel window closed"),
        (status = 404, description = "Reservation not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
    current_user: CurrentUser,
) -> Result<Json<ReservationResponse>> {
    let canceled = booking::cancel(
        &state.db,
        reservation_id,
        Actor::User(current_user.id),
        state.config.booking.cancel_cutoff_hours,
        Utc::now(),
    )
    .await?;

    Ok(Json(ReservationResponse::from(canceled)))
}

#[utoipa::path(
    post,
    path = "/admin/schedule/sessions/{session_id}/bookings",
    tag = "reservations",
    summary = "Create booking as admin",
    description = "Book a member or a walk-in guest onto a session, bypassing quota. Omit bedNumber to take the lowest free bed",
    request_body = AdminBookingCreate,
    params(("session_id" = uuid::Uuid, Path, description = "Session ID")),
    responses(
        (status = 201, description = "Seat booked", body = ReservationResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Seat taken, session full or member already booked"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn admin_create_booking(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    current_user: CurrentUser,
    Json(create): Json<AdminBookingCreate>,
) -> Result<(StatusCode, Json<ReservationResponse>)> {
    current_user.require_admin("bookings")?;

    let target = match (create.user_id, create.guest_name) {
        (Some(user_id), None) => BookingTarget::Member(user_id),
        (None, Some(name)) => BookingTarget::Guest {
            name,
            phone: create.guest_phone,
        },
        _ => {
            return Err(Error::BadRequest {
                message: "Provide exactly one of userId or guestName".to_string(),
            });
        }
    };

    let bed_number = match create.bed_number {
        Some(bed) => bed,
        None => lowest_free_bed(&state, session_id).await?,
    };

    let reservation = booking::admin_book(&state.db, session_id, bed_number, target, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ReservationResponse::from(reservation))))
}

/// Pick the lowest unoccupied bed. Advisory only; the unique index settles
/// any race at insert time.
async fn lowest_free_bed(state: &AppState, session_id: SessionId) -> Result<i32> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let session = Sessions::new(&mut pool_conn).get(session_id).await?.ok_or(Error::NotFound {
        resource: "Session".to_string(),
        id: session_id.to_string(),
    })?;
    let occupied = Reservations::new(&mut pool_conn).occupied_beds(session_id).await?;

    (1..=session.capacity_total)
        .find(|bed| !occupied.contains(bed))
        .ok_or_else(|| Error::conflict(ConflictCode::SessionFull, "Session has no free beds"))
}

#[utoipa::path(
    delete,
    path = "/admin/schedule/sessions/{session_id}/bookings/{reservation_id}",
    tag = "reservations",
    summary = "Cancel booking as admin",
    description = "Release a reservation regardless of owner or cutoff window",
    params(
        ("session_id" = uuid::Uuid, Path, description = "Session ID"),
        ("reservation_id" = uuid::Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation canceled", body = ReservationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Reservation not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("X-Studio-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn admin_cancel_booking(
    State(state): State<AppState>,
    Path((session_id, reservation_id)): Path<(SessionId, ReservationId)>,
    current_user: CurrentUser,
) -> Result<Json<ReservationResponse>> {
    current_user.require_admin("bookings")?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reservation = Reservations::new(&mut pool_conn)
        .get(reservation_id)
        .await?
        .filter(|r| r.session_id == session_id)
        .ok_or(Error::NotFound {
            resource: "Reservation".to_string(),
            id: reservation_id.to_string(),
        })?;
    drop(pool_conn);

    let canceled = booking::cancel(
        &state.db,
        reservation.id,
        Actor::Admin,
        state.config.booking.cancel_cutoff_hours,
        Utc::now(),
    )
    .await?;

    Ok(Json(ReservationResponse::from(canceled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::reservations::ReservationStatus;
    use crate::test_utils::{
        auth_header, create_active_subscription, create_test_admin, create_test_plan, create_test_server,
        create_test_session, create_test_user,
    };
    use chrono::Duration;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_member_books_and_sees_reservation(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        create_active_subscription(&pool, user.id, plan.id, 12).await;
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;

        let (name, value) = auth_header(&user);
        let response = server
            .post("/v1/reservations")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "sessionId": session.id, "bedNumber": 4 }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let reservation: ReservationResponse = response.json();
        assert_eq!(reservation.bed_number, 4);

        let response = server.get("/v1/reservations/my").add_header(name, value).await;
        response.assert_status_ok();
        let mine: Vec<MyReservationResponse> = response.json();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].session.id, session.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_booking_without_subscription_is_conflict(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;

        let (name, value) = auth_header(&user);
        let response = server
            .post("/v1/reservations")
            .add_header(name, value)
            .json(&json!({ "sessionId": session.id, "bedNumber": 1 }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "NoActiveSubscription");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_taken_seat_reports_stable_code(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let first = create_test_user(&pool, false).await;
        let second = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        create_active_subscription(&pool, first.id, plan.id, 12).await;
        create_active_subscription(&pool, second.id, plan.id, 12).await;
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;

        let (name, value) = auth_header(&first);
        server
            .post("/v1/reservations")
            .add_header(name, value)
            .json(&json!({ "sessionId": session.id, "bedNumber": 2 }))
            .await
            .assert_status(StatusCode::CREATED);

        let (name, value) = auth_header(&second);
        let response = server
            .post("/v1/reservations")
            .add_header(name, value)
            .json(&json!({ "sessionId": session.id, "bedNumber": 2 }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "SeatTaken");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_late_cancel_is_forbidden(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        create_active_subscription(&pool, user.id, plan.id, 12).await;
        // Inside the 48h cutoff
        let session = create_test_session(&pool, Utc::now() + Duration::hours(20), 8).await;

        let (name, value) = auth_header(&user);
        let response = server
            .post("/v1/reservations")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "sessionId": session.id, "bedNumber": 1 }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let reservation: ReservationResponse = response.json();

        let response = server
            .post(&format!("/v1/reservations/{}/cancel", reservation.id))
            .add_header(name, value)
            .await;
        response.assert_status_forbidden();
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "CancelWindowClosed");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_books_guest_with_auto_assigned_bed(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let session = create_test_session(&pool, Utc::now() + Duration::days(2), 8).await;

        sqlx::query("INSERT INTO reservations (session_id, guest_name, bed_number) VALUES ($1, 'walk-in', 1)")
            .bind(session.id)
            .execute(&pool)
            .await
            .unwrap();

        let (name, value) = auth_header(&admin);
        let response = server
            .post(&format!("/v1/admin/schedule/sessions/{}/bookings", session.id))
            .add_header(name, value)
            .json(&json!({ "guestName": "Maria K" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let reservation: ReservationResponse = response.json();
        // Bed 1 is taken, the next free one is picked
        assert_eq!(reservation.bed_number, 2);
        assert_eq!(reservation.guest_name.as_deref(), Some("Maria K"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_cancel_ignores_cutoff(pool: PgPool) {
        let server = create_test_server(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let user = create_test_user(&pool, false).await;
        let session = create_test_session(&pool, Utc::now() + Duration::hours(3), 8).await;

        let reservation_id: crate::types::ReservationId = sqlx::query_scalar(
            "INSERT INTO reservations (session_id, user_id, bed_number) VALUES ($1, $2, 1) RETURNING id",
        )
        .bind(session.id)
        .bind(user.id)
        .fetch_one(&pool)
        .await
        .unwrap();

        let (name, value) = auth_header(&admin);
        let response = server
            .delete(&format!(
                "/v1/admin/schedule/sessions/{}/bookings/{}",
                session.id, reservation_id
            ))
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let canceled: ReservationResponse = response.json();
        assert_eq!(canceled.status, ReservationStatus::Canceled);
    }
}
