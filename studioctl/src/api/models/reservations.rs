//! API request/response models for reservations.

use crate::db::models::reservations::{
    ReservationDBResponse, ReservationStatus, ReservationWithHolderDBResponse, ReservationWithSessionDBResponse,
};
use crate::types::{ReservationId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for booking a seat.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCreate {
    #[schema(value_type = String, format = "uuid")]
    pub session_id: SessionId,
    pub bed_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReservationId,
    #[schema(value_type = String, format = "uuid")]
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    pub bed_number: i32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl From<ReservationDBResponse> for ReservationResponse {
    fn from(row: ReservationDBResponse) -> Self {
        ReservationResponse {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            guest_name: row.guest_name,
            bed_number: row.bed_number,
            status: row.status,
            created_at: row.created_at,
            canceled_at: row.canceled_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationListMode {
    Upcoming,
    Past,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MyReservationsQuery {
    /// `upcoming` (default) or `past`
    pub mode: Option<ReservationListMode>,
    /// Maximum rows to return (default 50, capped at 200)
    pub limit: Option<i64>,
}

/// A reservation joined with its session, for the member's booking list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyReservationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReservationId,
    pub bed_number: i32,
    pub status: ReservationStatus,
    pub session: ReservationSessionSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSessionSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: SessionId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub instructor_name: Option<String>,
    pub location_name: Option<String>,
}

impl From<ReservationWithSessionDBResponse> for MyReservationResponse {
    fn from(row: ReservationWithSessionDBResponse) -> Self {
        MyReservationResponse {
            id: row.id,
            bed_number: row.bed_number,
            status: row.status,
            session: ReservationSessionSummary {
                id: row.session_id,
                title: row.session_title,
                starts_at: row.session_starts_at,
                duration_min: row.session_duration_min,
                instructor_name: row.session_instructor_name,
                location_name: row.session_location_name,
            },
        }
    }
}

/// One occupied bed as the admin sees it: the reservation id to act on and
/// who holds the seat.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionBookingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReservationId,
    pub bed_number: i32,
    pub status: ReservationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    /// Account holder's full name, or the guest name for walk-ins
    pub holder_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_phone: Option<String>,
}

impl From<ReservationWithHolderDBResponse> for SessionBookingResponse {
    fn from(row: ReservationWithHolderDBResponse) -> Self {
        SessionBookingResponse {
            id: row.id,
            bed_number: row.bed_number,
            status: row.status,
            user_id: row.user_id,
            holder_name: row.holder_name,
            guest_phone: row.guest_phone,
        }
    }
}

/// Admin booking request: an account holder by id, or a walk-in guest by
/// name. `bedNumber` may be omitted to take the lowest free bed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminBookingCreate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub bed_number: Option<i32>,
}
