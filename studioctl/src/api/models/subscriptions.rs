//! API models for plans and the member subscription view.

use crate::db::models::plans::PlanDBResponse;
use crate::db::models::subscriptions::{SubscriptionDBResponse, SubscriptionStatus};
use crate::subscriptions::SubscriptionView;
use crate::types::{PlanId, SubscriptionId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::payments::SubmissionResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PlanId,
    pub name: String,
    pub monthly_limit: i32,
    #[schema(value_type = String, example = "79.00")]
    pub price: Decimal,
    pub active: bool,
}

impl From<PlanDBResponse> for PlanResponse {
    fn from(plan: PlanDBResponse) -> Self {
        PlanResponse {
            id: plan.id,
            name: plan.name,
            monthly_limit: plan.monthly_limit,
            price: plan.price,
            active: plan.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SubscriptionId,
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    pub monthly_limit: i32,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<SubscriptionDBResponse> for SubscriptionResponse {
    fn from(sub: SubscriptionDBResponse) -> Self {
        SubscriptionResponse {
            id: sub.id,
            plan_id: sub.plan_id,
            monthly_limit: sub.monthly_limit,
            status: sub.status,
            start_date: sub.start_date,
            end_date: sub.end_date,
        }
    }
}

/// `{current, next, pending}` as the client renders it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionViewResponse {
    pub current: Option<SubscriptionResponse>,
    pub next: Option<SubscriptionResponse>,
    pub pending: Option<SubmissionResponse>,
}

impl From<SubscriptionView> for SubscriptionViewResponse {
    fn from(view: SubscriptionView) -> Self {
        SubscriptionViewResponse {
            current: view.current.map(SubscriptionResponse::from),
            next: view.next.map(SubscriptionResponse::from),
            pending: view.pending.map(SubmissionResponse::from),
        }
    }
}
