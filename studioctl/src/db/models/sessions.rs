use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Canceled,
}

/// Stable class-type keys. Display labels (Arabic in the studio's client) are
/// a presentation concern and never stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "session_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    PilatesReformer,
    PilatesMat,
    Strength,
    Yoga,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionDBResponse {
    pub id: SessionId,
    pub title: String,
    pub session_type: SessionType,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub capacity_total: i32,
    pub instructor_name: Option<String>,
    pub location_name: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session row joined with its count of active reservations.
///
/// `occupied_count` is always derived from the reservations table at read
/// time; `available_seats` is a projection computed at the API boundary.
#[derive(Debug, Clone, FromRow)]
pub struct SessionWithOccupancyDBResponse {
    #[sqlx(flatten)]
    pub session: SessionDBResponse,
    pub occupied_count: i64,
}

#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub title: String,
    pub session_type: SessionType,
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub capacity_total: i32,
    pub instructor_name: Option<String>,
    pub location_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionUpdateDBRequest {
    pub title: Option<String>,
    pub session_type: Option<SessionType>,
    pub starts_at: Option<DateTime<Utc>>,
    pub duration_min: Option<i32>,
    pub capacity_total: Option<i32>,
    pub instructor_name: Option<String>,
}
