use crate::db::errors::Result;
use crate::db::models::submissions::{SubmissionCreateDBRequest, SubmissionDBResponse, SubmissionStatus};
use crate::types::{SubmissionId, UserId};
use sqlx::PgConnection;
use tracing::instrument;

const SUBMISSION_COLUMNS: &str = "id, user_id, plan_id, requested_action, method, proof_url, status, admin_note, target_start_date, target_end_date, submitted_at, resolved_at";

/// Repository for payment-proof submissions. The one-open-submission-per-user
/// rule is enforced by the `payment_submissions_user_open` partial index, so
/// a duplicate surfaces as a `UniqueViolation` rather than a racy pre-check.
pub struct Submissions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Submissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, action = ?request.requested_action), err)]
    pub async fn create(&mut self, request: &SubmissionCreateDBRequest) -> Result<SubmissionDBResponse> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            r#"
            INSERT INTO payment_submissions
                (user_id, plan_id, requested_action, method, proof_url, target_start_date, target_end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.plan_id)
        .bind(request.requested_action)
        .bind(request.method)
        .bind(&request.proof_url)
        .bind(request.target_start_date)
        .bind(request.target_end_date)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(submission)
    }

    pub async fn get(&mut self, id: SubmissionId) -> Result<Option<SubmissionDBResponse>> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM payment_submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(submission)
    }

    /// Lock the row for resolution so two admins cannot approve it twice.
    pub async fn get_for_update(&mut self, id: SubmissionId) -> Result<Option<SubmissionDBResponse>> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM payment_submissions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(submission)
    }

    /// The user's open submission, if one exists.
    pub async fn open_for_user(&mut self, user_id: UserId) -> Result<Option<SubmissionDBResponse>> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM payment_submissions WHERE user_id = $1 AND status = 'submitted'"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(submission)
    }

    /// Review queue for admins, oldest first.
    pub async fn list_by_status(&mut self, status: SubmissionStatus) -> Result<Vec<SubmissionDBResponse>> {
        let submissions = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM payment_submissions WHERE status = $1 ORDER BY submitted_at"
        ))
        .bind(status)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(submissions)
    }

    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<SubmissionDBResponse>> {
        let submissions = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM payment_submissions WHERE user_id = $1 ORDER BY submitted_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(submissions)
    }

    /// Move an open submission to a terminal state. Returns `None` when the
    /// row is missing or already resolved.
    #[instrument(skip(self, admin_note), err)]
    pub async fn resolve(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
        admin_note: Option<&str>,
    ) -> Result<Option<SubmissionDBResponse>> {
        let submission = sqlx::query_as::<_, SubmissionDBResponse>(&format!(
            r#"
            UPDATE payment_submissions
            SET status = $2, admin_note = $3, resolved_at = now()
            WHERE id = $1 AND status = 'submitted'
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(admin_note)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::db::models::submissions::{PaymentMethod, RequestedAction};
    use crate::test_utils::{create_test_plan, create_test_user};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    fn renewal(user_id: UserId, plan_id: crate::types::PlanId) -> SubmissionCreateDBRequest {
        let today = Utc::now().date_naive();
        SubmissionCreateDBRequest {
            user_id,
            plan_id,
            requested_action: RequestedAction::Renew,
            method: PaymentMethod::BankTransfer,
            proof_url: Some("https://proofs.example/receipt.jpg".to_string()),
            target_start_date: today,
            target_end_date: today + Duration::days(30),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_second_open_submission_rejected(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Submissions::new(&mut conn);

        repo.create(&renewal(user.id, plan.id)).await.unwrap();
        let err = repo.create(&renewal(user.id, plan.id)).await.unwrap_err();

        match err {
            DbError::UniqueViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("payment_submissions_user_open"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resolved_submission_unblocks_the_next_one(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Submissions::new(&mut conn);

        let first = repo.create(&renewal(user.id, plan.id)).await.unwrap();
        let resolved = repo
            .resolve(first.id, SubmissionStatus::Rejected, Some("unreadable receipt"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.status, SubmissionStatus::Rejected);
        assert!(resolved.resolved_at.is_some());

        // Terminal rows are out of the partial index
        repo.create(&renewal(user.id, plan.id)).await.unwrap();
        assert!(repo.open_for_user(user.id).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resolve_is_single_shot(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Submissions::new(&mut conn);

        let submission = repo.create(&renewal(user.id, plan.id)).await.unwrap();
        repo.resolve(submission.id, SubmissionStatus::Approved, None).await.unwrap().unwrap();

        // A second resolution attempt finds no open row
        assert!(repo.resolve(submission.id, SubmissionStatus::Rejected, None).await.unwrap().is_none());
    }
}
