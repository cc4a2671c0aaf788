//! Subscription state machine: the member-facing current/next/pending view,
//! payment-proof submission, and admin resolution of submissions.
//!
//! Periods are civil-date ranges in the studio timezone, inclusive on both
//! ends, with `next.start_date == current.end_date + 1 day` whenever both
//! exist. Expiry and next→current promotion happen lazily on read.

use crate::db::handlers::{Plans, Submissions, Subscriptions};
use crate::db::models::submissions::{
    PaymentMethod, RequestedAction, SubmissionCreateDBRequest, SubmissionDBResponse, SubmissionStatus,
};
use crate::db::models::subscriptions::{SubscriptionCreateDBRequest, SubscriptionDBResponse};
use crate::errors::{ConflictCode, Error, Result};
use crate::types::{PlanId, SubmissionId, UserId};
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{info, instrument};

/// The member's subscription state as the client sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub current: Option<SubscriptionDBResponse>,
    pub next: Option<SubscriptionDBResponse>,
    pub pending: Option<SubmissionDBResponse>,
}

/// Last day of a one-month period starting at `start` (inclusive dates).
fn period_end(start: NaiveDate) -> NaiveDate {
    start
        .checked_add_months(Months::new(1))
        .map(|d| d - Duration::days(1))
        .unwrap_or(start + Duration::days(29))
}

/// Read the current/next/pending view, expiring lapsed periods first so a
/// queued period is promoted to current the first time anyone looks.
pub async fn view(conn: &mut PgConnection, user_id: UserId, today: NaiveDate) -> Result<SubscriptionView> {
    Subscriptions::new(&mut *conn).expire_stale(user_id, today).await?;
    let current = Subscriptions::new(&mut *conn).current_active(user_id, today).await?;
    let next = Subscriptions::new(&mut *conn).next_upcoming(user_id, today).await?;
    let pending = Submissions::new(&mut *conn).open_for_user(user_id).await?;

    Ok(SubscriptionView { current, next, pending })
}

/// Record a payment-proof submission. Target dates are computed now for
/// display; the authoritative dates are recomputed at approval time. The
/// one-open-submission gate is the partial unique index.
#[instrument(skip(conn, proof_url), err)]
pub async fn submit(
    conn: &mut PgConnection,
    user_id: UserId,
    plan_id: PlanId,
    requested_action: RequestedAction,
    method: PaymentMethod,
    proof_url: Option<String>,
    today: NaiveDate,
) -> Result<SubmissionDBResponse> {
    let plan = Plans::new(&mut *conn).get(plan_id).await?.ok_or(Error::NotFound {
        resource: "Plan".to_string(),
        id: plan_id.to_string(),
    })?;
    if !plan.active {
        return Err(Error::BadRequest {
            message: "Plan is no longer offered".to_string(),
        });
    }

    Subscriptions::new(&mut *conn).expire_stale(user_id, today).await?;
    let current = Subscriptions::new(&mut *conn).current_active(user_id, today).await?;

    let target_start = match requested_action {
        RequestedAction::Renew => current.as_ref().map(|c| c.end_date + Duration::days(1)).unwrap_or(today),
        RequestedAction::UpgradeCurrentMonth => {
            let current = current.as_ref().ok_or_else(|| {
                Error::conflict(ConflictCode::NoActiveSubscription, "No current subscription to upgrade")
            })?;
            current.start_date
        }
        RequestedAction::UpgradeNextMonth | RequestedAction::DowngradeNextMonth => {
            let current = current.as_ref().ok_or_else(|| {
                Error::conflict(ConflictCode::NoActiveSubscription, "No current subscription to change")
            })?;
            current.end_date + Duration::days(1)
        }
    };
    let target_end = match requested_action {
        RequestedAction::UpgradeCurrentMonth => current.as_ref().map(|c| c.end_date).unwrap_or_else(|| period_end(target_start)),
        _ => period_end(target_start),
    };

    let submission = Submissions::new(&mut *conn)
        .create(&SubmissionCreateDBRequest {
            user_id,
            plan_id,
            requested_action,
            method,
            proof_url,
            target_start_date: target_start,
            target_end_date: target_end,
        })
        .await
        .map_err(|err| match err.constraint_name() {
            Some("payment_submissions_user_open") => Error::conflict(
                ConflictCode::PendingSubmissionExists,
                "A submission is already awaiting review",
            ),
            _ => err.into(),
        })?;

    Ok(submission)
}

/// Approve an open submission and apply its requested action. Must run
/// inside a transaction: the submission row is locked, resolved, and the
/// subscription change applied atomically.
#[instrument(skip(conn, admin_note), err)]
pub async fn approve(
    conn: &mut PgConnection,
    submission_id: SubmissionId,
    admin_note: Option<&str>,
    today: NaiveDate,
) -> Result<SubmissionDBResponse> {
    let submission = Submissions::new(&mut *conn)
        .get_for_update(submission_id)
        .await?
        .ok_or(Error::NotFound {
            resource: "Submission".to_string(),
            id: submission_id.to_string(),
        })?;
    if submission.status != SubmissionStatus::Submitted {
        return Err(Error::BadRequest {
            message: "Submission has already been resolved".to_string(),
        });
    }

    let plan = Plans::new(&mut *conn)
        .get(submission.plan_id)
        .await?
        .ok_or(Error::NotFound {
            resource: "Plan".to_string(),
            id: submission.plan_id.to_string(),
        })?;

    Subscriptions::new(&mut *conn).expire_stale(submission.user_id, today).await?;
    let current = Subscriptions::new(&mut *conn)
        .current_active(submission.user_id, today)
        .await?;

    match submission.requested_action {
        RequestedAction::Renew => {
            // Dates are recomputed at approval so a late review never
            // creates a period already in the past
            let start = current
                .as_ref()
                .map(|c| c.end_date + Duration::days(1))
                .unwrap_or(today);
            let request = SubscriptionCreateDBRequest {
                user_id: submission.user_id,
                plan_id: plan.id,
                monthly_limit: plan.monthly_limit,
                start_date: start,
                end_date: period_end(start),
            };
            if current.is_some() {
                Subscriptions::new(&mut *conn).replace_next(today, &request).await?;
            } else {
                Subscriptions::new(&mut *conn).create(&request).await?;
            }
        }
        RequestedAction::UpgradeCurrentMonth => {
            let current = current.ok_or_else(|| {
                Error::conflict(ConflictCode::NoActiveSubscription, "No current subscription to upgrade")
            })?;
            Subscriptions::new(&mut *conn)
                .update_plan(current.id, plan.id, plan.monthly_limit)
                .await?;
        }
        RequestedAction::UpgradeNextMonth | RequestedAction::DowngradeNextMonth => {
            let current = current.ok_or_else(|| {
                Error::conflict(ConflictCode::NoActiveSubscription, "No current subscription to change")
            })?;
            let start = current.end_date + Duration::days(1);
            Subscriptions::new(&mut *conn)
                .replace_next(
                    today,
                    &SubscriptionCreateDBRequest {
                        user_id: submission.user_id,
                        plan_id: plan.id,
                        monthly_limit: plan.monthly_limit,
                        start_date: start,
                        end_date: period_end(start),
                    },
                )
                .await?;
        }
    }

    let resolved = Submissions::new(&mut *conn)
        .resolve(submission_id, SubmissionStatus::Approved, admin_note)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "resolve a submission that was just locked".to_string(),
        })?;
    info!(submission_id = %submission_id, action = ?resolved.requested_action, "submission approved");
    Ok(resolved)
}

/// Reject an open submission. No subscription change.
#[instrument(skip(conn, admin_note), err)]
pub async fn reject(
    conn: &mut PgConnection,
    submission_id: SubmissionId,
    admin_note: Option<&str>,
) -> Result<SubmissionDBResponse> {
    let resolved = Submissions::new(&mut *conn)
        .resolve(submission_id, SubmissionStatus::Rejected, admin_note)
        .await?
        .ok_or(Error::NotFound {
            resource: "Open submission".to_string(),
            id: submission_id.to_string(),
        })?;
    Ok(resolved)
}

/// A member withdraws their own open submission.
#[instrument(skip(conn), err)]
pub async fn withdraw(conn: &mut PgConnection, user_id: UserId) -> Result<SubmissionDBResponse> {
    let open = Submissions::new(&mut *conn).open_for_user(user_id).await?.ok_or(Error::NotFound {
        resource: "Open submission".to_string(),
        id: user_id.to_string(),
    })?;
    let resolved = Submissions::new(&mut *conn)
        .resolve(open.id, SubmissionStatus::Cancelled, None)
        .await?
        .ok_or_else(|| Error::Internal {
            operation: "withdraw a submission that was just read".to_string(),
        })?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_active_subscription, create_test_plan, create_test_user};
    use chrono::Utc;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_renew_without_current_starts_today(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        let submission = submit(
            &mut conn,
            user.id,
            plan.id,
            RequestedAction::Renew,
            PaymentMethod::Cash,
            None,
            today,
        )
        .await
        .unwrap();

        approve(&mut conn, submission.id, None, today).await.unwrap();

        let state = view(&mut conn, user.id, today).await.unwrap();
        let current = state.current.unwrap();
        assert_eq!(current.start_date, today);
        assert_eq!(current.end_date, period_end(today));
        assert!(state.next.is_none());
        assert!(state.pending.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_renew_with_current_queues_gapless_next(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();
        create_active_subscription(&pool, user.id, plan.id, 12).await;

        let mut conn = pool.acquire().await.unwrap();
        let submission = submit(
            &mut conn,
            user.id,
            plan.id,
            RequestedAction::Renew,
            PaymentMethod::BankTransfer,
            Some("https://proofs.example/r.jpg".to_string()),
            today,
        )
        .await
        .unwrap();
        approve(&mut conn, submission.id, None, today).await.unwrap();

        let state = view(&mut conn, user.id, today).await.unwrap();
        let current = state.current.unwrap();
        let next = state.next.unwrap();
        // No gap, no overlap
        assert_eq!(next.start_date, current.end_date + Duration::days(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upgrade_current_month_swaps_plan_in_place(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let small = create_test_plan(&pool, 8).await;
        let big = create_test_plan(&pool, 16).await;
        let today = Utc::now().date_naive();
        let existing = create_active_subscription(&pool, user.id, small.id, 8).await;

        let mut conn = pool.acquire().await.unwrap();
        let submission = submit(
            &mut conn,
            user.id,
            big.id,
            RequestedAction::UpgradeCurrentMonth,
            PaymentMethod::Cash,
            None,
            today,
        )
        .await
        .unwrap();
        // Target dates mirror the current period
        assert_eq!(submission.target_start_date, existing.start_date);
        assert_eq!(submission.target_end_date, existing.end_date);

        approve(&mut conn, submission.id, Some("receipt verified"), today).await.unwrap();

        let state = view(&mut conn, user.id, today).await.unwrap();
        let current = state.current.unwrap();
        assert_eq!(current.id, existing.id);
        assert_eq!(current.plan_id, big.id);
        assert_eq!(current.monthly_limit, 16);
        assert_eq!(current.start_date, existing.start_date);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pending_submission_gates_the_next_one(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        submit(&mut conn, user.id, plan.id, RequestedAction::Renew, PaymentMethod::Cash, None, today)
            .await
            .unwrap();

        let err = submit(&mut conn, user.id, plan.id, RequestedAction::Renew, PaymentMethod::Cash, None, today)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Conflict {
                code: ConflictCode::PendingSubmissionExists,
                ..
            }
        ));

        // Withdrawing unblocks
        withdraw(&mut conn, user.id).await.unwrap();
        submit(&mut conn, user.id, plan.id, RequestedAction::Renew, PaymentMethod::Cash, None, today)
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reject_changes_no_subscription(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        let submission = submit(&mut conn, user.id, plan.id, RequestedAction::Renew, PaymentMethod::Cash, None, today)
            .await
            .unwrap();
        let resolved = reject(&mut conn, submission.id, Some("no receipt attached")).await.unwrap();
        assert_eq!(resolved.status, SubmissionStatus::Rejected);

        let state = view(&mut conn, user.id, today).await.unwrap();
        assert!(state.current.is_none());
        assert!(state.pending.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_next_month_actions_require_a_current_subscription(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        for action in [RequestedAction::UpgradeNextMonth, RequestedAction::DowngradeNextMonth] {
            let err = submit(&mut conn, user.id, plan.id, action, PaymentMethod::Cash, None, today)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Conflict {
                    code: ConflictCode::NoActiveSubscription,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_period_end_is_one_month_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        // Jan 31 + 1 month clamps to Feb 28, minus a day = Feb 27
        assert_eq!(period_end(start), NaiveDate::from_ymd_opt(2025, 2, 27).unwrap());

        let clean = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(period_end(clean), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
    }
}
