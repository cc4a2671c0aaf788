use crate::types::PlanId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Subscription plan catalogue row. Price is informational only; the engine
/// never computes monetary amounts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanDBResponse {
    pub id: PlanId,
    pub name: String,
    pub monthly_limit: i32,
    pub price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PlanCreateDBRequest {
    pub name: String,
    pub monthly_limit: i32,
    pub price: Decimal,
}
