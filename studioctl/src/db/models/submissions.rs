use crate::types::{PlanId, SubmissionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "requested_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestedAction {
    Renew,
    UpgradeCurrentMonth,
    UpgradeNextMonth,
    DowngradeNextMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Approved,
    Rejected,
    Cancelled,
}

/// A payment-proof submission awaiting admin review. While one row is in
/// `submitted` state for a user, no second submission is accepted (partial
/// unique index `payment_submissions_user_open`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionDBResponse {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub requested_action: RequestedAction,
    pub method: PaymentMethod,
    pub proof_url: Option<String>,
    pub status: SubmissionStatus,
    pub admin_note: Option<String>,
    pub target_start_date: NaiveDate,
    pub target_end_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SubmissionCreateDBRequest {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub requested_action: RequestedAction,
    pub method: PaymentMethod,
    pub proof_url: Option<String>,
    pub target_start_date: NaiveDate,
    pub target_end_date: NaiveDate,
}
