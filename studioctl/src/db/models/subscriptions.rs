use crate::types::{PlanId, SubscriptionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

/// One subscription period. Dates are inclusive civil dates in the studio
/// timezone: the subscription covers `[start_date, end_date]`, and a `next`
/// slot starts exactly one day after the current period ends.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionDBResponse {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub monthly_limit: i32,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionCreateDBRequest {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub monthly_limit: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}
