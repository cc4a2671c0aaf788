//! API models for payment-proof submissions.

use crate::db::models::submissions::{
    PaymentMethod, RequestedAction, SubmissionDBResponse, SubmissionStatus,
};
use crate::types::{PlanId, SubmissionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for submitting proof of payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreate {
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    pub requested_action: RequestedAction,
    pub method: PaymentMethod,
    pub proof_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SubmissionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    pub requested_action: RequestedAction,
    pub method: PaymentMethod,
    pub proof_url: Option<String>,
    pub status: SubmissionStatus,
    pub admin_note: Option<String>,
    /// Informational; the effective dates are recomputed when the
    /// submission is approved
    pub target_start_date: NaiveDate,
    pub target_end_date: NaiveDate,
    pub submitted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<SubmissionDBResponse> for SubmissionResponse {
    fn from(row: SubmissionDBResponse) -> Self {
        SubmissionResponse {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            requested_action: row.requested_action,
            method: row.method,
            proof_url: row.proof_url,
            status: row.status,
            admin_note: row.admin_note,
            target_start_date: row.target_start_date,
            target_end_date: row.target_end_date,
            submitted_at: row.submitted_at,
            resolved_at: row.resolved_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSubmissionsQuery {
    /// Filter by status; defaults to `submitted`
    pub status: Option<SubmissionStatus>,
}

/// Request body for approving or rejecting a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub admin_note: Option<String>,
}
