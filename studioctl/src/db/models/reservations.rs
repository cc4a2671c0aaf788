use crate::types::{ReservationId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "reservation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Booked,
    Canceled,
    Attended,
}

/// One bed booking. `user_id` is None for walk-in guests added by an admin;
/// those occupy a seat but never count against any quota.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReservationDBResponse {
    pub id: ReservationId,
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub bed_number: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ReservationCreateDBRequest {
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub bed_number: i32,
}

/// Active reservation with the seat holder's display name resolved: the
/// account holder's full name, or the guest name for walk-ins. Backs the
/// admin session-details view.
#[derive(Debug, Clone, FromRow)]
pub struct ReservationWithHolderDBResponse {
    pub id: ReservationId,
    pub bed_number: i32,
    pub status: ReservationStatus,
    pub user_id: Option<UserId>,
    pub holder_name: String,
    pub guest_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reservation joined with core session fields, for "my reservations" listings.
#[derive(Debug, Clone, FromRow)]
pub struct ReservationWithSessionDBResponse {
    pub id: ReservationId,
    pub bed_number: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub session_id: SessionId,
    pub session_title: String,
    pub session_starts_at: DateTime<Utc>,
    pub session_duration_min: i32,
    pub session_instructor_name: Option<String>,
    pub session_location_name: Option<String>,
}
