//! API request/response models for sessions and session generation.

use crate::db::models::sessions::{SessionStatus, SessionType, SessionWithOccupancyDBResponse};
use crate::types::SessionId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing sessions. Defaults to the upcoming week.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSessionsQuery {
    /// Inclusive start of the range (defaults to now)
    pub from: Option<DateTime<Utc>>,
    /// Exclusive end of the range (defaults to `from` + 7 days)
    pub to: Option<DateTime<Utc>>,
}

/// One session with its derived seat availability.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SessionId,
    pub title: String,
    pub session_type: SessionType,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub capacity_total: i32,
    pub instructor_name: Option<String>,
    pub location_name: Option<String>,
    pub status: SessionStatus,
    pub booked_count: i64,
    /// Always `capacityTotal - bookedCount`, recomputed at read time
    pub available_seats: i64,
}

impl From<SessionWithOccupancyDBResponse> for SessionResponse {
    fn from(row: SessionWithOccupancyDBResponse) -> Self {
        let capacity = i64::from(row.session.capacity_total);
        if row.occupied_count > capacity {
            // Must be impossible given the seat constraints; clamp for
            // display and leave a loud trace
            tracing::error!(
                session_id = %row.session.id,
                occupied = row.occupied_count,
                capacity,
                "occupancy exceeds capacity"
            );
        }
        let booked_count = row.occupied_count.min(capacity);
        SessionResponse {
            id: row.session.id,
            title: row.session.title,
            session_type: row.session.session_type,
            starts_at: row.session.starts_at,
            duration_min: row.session.duration_min,
            capacity_total: row.session.capacity_total,
            instructor_name: row.session.instructor_name,
            location_name: row.session.location_name,
            status: row.session.status,
            booked_count,
            available_seats: capacity - booked_count,
        }
    }
}

/// Session detail with the concrete occupied bed numbers, for seat pickers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub booked_beds: Vec<i32>,
}

/// Admin session detail: the per-reservation view behind the desk screen,
/// carrying the reservation ids the admin booking endpoints operate on.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminSessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub bookings: Vec<crate::api::models::reservations::SessionBookingResponse>,
}

/// Request body for creating a session by hand.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreate {
    pub title: String,
    #[serde(default = "default_session_type")]
    pub session_type: SessionType,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub capacity_total: i32,
    pub instructor_name: Option<String>,
    pub location_name: Option<String>,
}

fn default_session_type() -> SessionType {
    SessionType::PilatesReformer
}

/// Partial session update; omitted fields keep their values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub title: Option<String>,
    pub session_type: Option<SessionType>,
    pub starts_at: Option<DateTime<Utc>>,
    pub duration_min: Option<i32>,
    pub capacity_total: Option<i32>,
    pub instructor_name: Option<String>,
}

/// Request body for a generation run over the weekly template.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSessionsRequest {
    pub duration_minutes: i32,
    /// Target weekdays, 0 = Sunday .. 6 = Saturday
    pub day_of_weeks: Vec<i16>,
    #[serde(default)]
    pub range: GenerationRange,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRange {
    /// Range start; defaults to the Sunday of the current week
    pub start_date: Option<NaiveDate>,
    /// Number of weeks to cover (default 1)
    pub weeks: Option<u32>,
}
