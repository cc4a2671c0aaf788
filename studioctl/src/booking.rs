//! Reservation orchestration: booking, cancellation and whole-session
//! cancellation, each inside a single transaction.
//!
//! The transaction takes a row lock on the user (serializing that user's
//! quota checks) and then relies on the partial unique indexes for the
//! seat and double-booking races. Nothing here pre-reserves or retries:
//! either the transaction commits with the seat held, or the caller gets a
//! stable conflict code.

use crate::db::errors::DbError;
use crate::db::handlers::{Reservations, Sessions, Users};
use crate::db::models::reservations::{ReservationCreateDBRequest, ReservationDBResponse, ReservationStatus};
use crate::db::models::sessions::{SessionDBResponse, SessionStatus};
use crate::errors::{ConflictCode, Error, Result, ValidationCode};
use crate::quota;
use crate::types::{ReservationId, SessionId, UserId};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use tracing::{info, instrument};

/// Who is performing a cancellation. Admins bypass the cutoff and may
/// cancel any reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(UserId),
    Admin,
}

/// Seat target for an admin-created booking: an account holder or a walk-in
/// guest identified by name.
#[derive(Debug, Clone)]
pub enum BookingTarget {
    Member(UserId),
    Guest { name: String, phone: Option<String> },
}

fn map_reservation_conflict(err: DbError) -> Error {
    match err.constraint_name() {
        Some("reservations_session_bed_active") => {
            Error::conflict(ConflictCode::SeatTaken, "Bed is already taken for this session")
        }
        Some("reservations_session_user_active") => Error::conflict(
            ConflictCode::AlreadyBooked,
            "User already has an active reservation for this session",
        ),
        _ => err.into(),
    }
}

/// Session must exist, be scheduled and start in the future to accept
/// bookings; the bed number must name a real bed. The session row is read
/// FOR SHARE so a concurrent whole-session cancel cannot commit under a
/// booking in flight.
async fn bookable_session(
    conn: &mut sqlx::PgConnection,
    session_id: SessionId,
    bed_number: i32,
    now: DateTime<Utc>,
) -> Result<SessionDBResponse> {
    let session = Sessions::new(&mut *conn).get_for_share(session_id).await?.ok_or(Error::NotFound {
        resource: "Session".to_string(),
        id: session_id.to_string(),
    })?;

    if session.status != SessionStatus::Scheduled || session.starts_at <= now {
        return Err(Error::conflict(
            ConflictCode::SessionNotBookable,
            "Session is canceled or has already started",
        ));
    }
    if !(1..=session.capacity_total).contains(&bed_number) {
        return Err(Error::validation(
            ValidationCode::SeatOutOfRange,
            format!("Bed number must be between 1 and {}", session.capacity_total),
        ));
    }

    Ok(session)
}

/// Book a seat for an account holder. Runs the whole sequence in one
/// transaction: session checks, double-booking check, quota check, seat
/// acquisition.
#[instrument(skip(db), err)]
pub async fn book(
    db: &PgPool,
    tz: Tz,
    user_id: UserId,
    session_id: SessionId,
    bed_number: i32,
    now: DateTime<Utc>,
) -> Result<ReservationDBResponse> {
    let mut tx = db.begin().await.map_err(DbError::from)?;

    Users::new(&mut tx).lock(user_id).await?;
    let session = bookable_session(&mut tx, session_id, bed_number, now).await?;

    if Reservations::new(&mut tx).user_has_active(session_id, user_id).await? {
        return Err(Error::conflict(
            ConflictCode::AlreadyBooked,
            "User already has an active reservation for this session",
        ));
    }

    quota::check_for_booking(&mut tx, user_id, session.starts_at, tz).await?;

    let occupied = Sessions::new(&mut tx).occupied_count(session_id).await?;
    if occupied >= i64::from(session.capacity_total) {
        return Err(Error::conflict(ConflictCode::SessionFull, "Session has no free beds"));
    }

    let reservation = Reservations::new(&mut tx)
        .try_acquire(&ReservationCreateDBRequest {
            session_id,
            user_id: Some(user_id),
            guest_name: None,
            guest_phone: None,
            bed_number,
        })
        .await
        .map_err(map_reservation_conflict)?;

    tx.commit().await.map_err(DbError::from)?;
    info!(reservation_id = %reservation.id, bed = bed_number, "reservation booked");
    Ok(reservation)
}

/// Admin booking for a member or a walk-in guest. Skips quota entirely
/// (walk-ins have no subscription; member bookings made at the desk are the
/// admin's call) but keeps every seat and double-booking rule.
#[instrument(skip(db, target), err)]
pub async fn admin_book(
    db: &PgPool,
    session_id: SessionId,
    bed_number: i32,
    target: BookingTarget,
    now: DateTime<Utc>,
) -> Result<ReservationDBResponse> {
    let mut tx = db.begin().await.map_err(DbError::from)?;

    bookable_session(&mut tx, session_id, bed_number, now).await?;

    let request = match target {
        BookingTarget::Member(user_id) => {
            Users::new(&mut tx).lock(user_id).await?;
            if Reservations::new(&mut tx).user_has_active(session_id, user_id).await? {
                return Err(Error::conflict(
                    ConflictCode::AlreadyBooked,
                    "User already has an active reservation for this session",
                ));
            }
            ReservationCreateDBRequest {
                session_id,
                user_id: Some(user_id),
                guest_name: None,
                guest_phone: None,
                bed_number,
            }
        }
        BookingTarget::Guest { name, phone } => {
            if name.trim().is_empty() {
                return Err(Error::BadRequest {
                    message: "Guest name cannot be empty".to_string(),
                });
            }
            ReservationCreateDBRequest {
                session_id,
                user_id: None,
                guest_name: Some(name),
                guest_phone: phone,
                bed_number,
            }
        }
    };

    let reservation = Reservations::new(&mut tx)
        .try_acquire(&request)
        .await
        .map_err(map_reservation_conflict)?;

    tx.commit().await.map_err(DbError::from)?;
    Ok(reservation)
}

/// Cancel one reservation. Idempotent: canceling an already-canceled
/// reservation returns it unchanged. Users may only cancel their own
/// reservations and only while the cutoff window is still open.
#[instrument(skip(db), err)]
pub async fn cancel(
    db: &PgPool,
    reservation_id: ReservationId,
    actor: Actor,
    cutoff_hours: i64,
    now: DateTime<Utc>,
) -> Result<ReservationDBResponse> {
    let mut tx = db.begin().await.map_err(DbError::from)?;

    let reservation = Reservations::new(&mut tx)
        .get_for_update(reservation_id)
        .await?
        .ok_or(Error::NotFound {
            resource: "Reservation".to_string(),
            id: reservation_id.to_string(),
        })?;

    if let Actor::User(user_id) = actor {
        // Others' reservations are invisible to non-admins
        if reservation.user_id != Some(user_id) {
            return Err(Error::NotFound {
                resource: "Reservation".to_string(),
                id: reservation_id.to_string(),
            });
        }
    }

    if reservation.status != ReservationStatus::Booked {
        tx.commit().await.map_err(DbError::from)?;
        return Ok(reservation);
    }

    if actor != Actor::Admin {
        let session = Sessions::new(&mut tx)
            .get(reservation.session_id)
            .await?
            .ok_or(Error::NotFound {
                resource: "Session".to_string(),
                id: reservation.session_id.to_string(),
            })?;
        if now >= session.starts_at - Duration::hours(cutoff_hours) {
            return Err(Error::conflict(
                ConflictCode::CancelWindowClosed,
                format!("Reservations can only be canceled more than {cutoff_hours} hours before the session"),
            ));
        }
    }

    let canceled = Reservations::new(&mut tx)
        .cancel(reservation_id, now)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "cancel a reservation that was just locked".to_string(),
        })?;

    tx.commit().await.map_err(DbError::from)?;
    info!(reservation_id = %reservation_id, "reservation canceled");
    Ok(canceled)
}

/// Cancel a whole session, cascading to every active reservation. Returns
/// the canceled session and the reservations that were released so the
/// caller can notify the affected account holders.
#[instrument(skip(db), err)]
pub async fn cancel_session(
    db: &PgPool,
    session_id: SessionId,
    now: DateTime<Utc>,
) -> Result<(SessionDBResponse, Vec<ReservationDBResponse>)> {
    let mut tx = db.begin().await.map_err(DbError::from)?;

    Sessions::new(&mut tx)
        .get_for_update(session_id)
        .await?
        .ok_or(Error::NotFound {
            resource: "Session".to_string(),
            id: session_id.to_string(),
        })?;

    let session = Sessions::new(&mut tx)
        .cancel(session_id)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "cancel a session that was just locked".to_string(),
        })?;
    let released = Reservations::new(&mut tx).cancel_all_for_session(session_id, now).await?;

    tx.commit().await.map_err(DbError::from)?;
    info!(session_id = %session_id, released = released.len(), "session canceled");
    Ok((session, released))
}
