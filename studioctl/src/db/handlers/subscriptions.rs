use crate::db::errors::Result;
use crate::db::models::subscriptions::{SubscriptionCreateDBRequest, SubscriptionDBResponse, SubscriptionStatus};
use crate::types::{PlanId, SubscriptionId, UserId};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan_id, monthly_limit, status, start_date, end_date, created_at, updated_at";

/// Repository for subscription periods. Expiry is lazy: rows whose end date
/// has passed are flipped to `expired` on the next read path that cares,
/// which also promotes a queued `next` period to current without any
/// background job.
pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id), err)]
    pub async fn create(&mut self, request: &SubscriptionCreateDBRequest) -> Result<SubscriptionDBResponse> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            r#"
            INSERT INTO subscriptions (user_id, plan_id, monthly_limit, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.plan_id)
        .bind(request.monthly_limit)
        .bind(request.start_date)
        .bind(request.end_date)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// Flip the user's active periods that ended before `today` to expired.
    /// Returns the number of rows flipped.
    #[instrument(skip(self), err)]
    pub async fn expire_stale(&mut self, user_id: UserId, today: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired', updated_at = now()
            WHERE user_id = $1 AND status = 'active' AND end_date < $2
            "#,
        )
        .bind(user_id)
        .bind(today)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// The active period covering `today`, if any. Callers run
    /// [`Self::expire_stale`] first so a lapsed period never masquerades as
    /// current.
    pub async fn current_active(&mut self, user_id: UserId, today: NaiveDate) -> Result<Option<SubscriptionDBResponse>> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1 AND status = 'active' AND start_date <= $2 AND end_date >= $2
            ORDER BY start_date DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(today)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// The queued period starting after `today`, if any.
    pub async fn next_upcoming(&mut self, user_id: UserId, today: NaiveDate) -> Result<Option<SubscriptionDBResponse>> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1 AND status = 'active' AND start_date > $2
            ORDER BY start_date
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(today)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// The active period covering an arbitrary date, used when booking a
    /// session that falls in a different period than today.
    pub async fn active_covering(&mut self, user_id: UserId, date: NaiveDate) -> Result<Option<SubscriptionDBResponse>> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1 AND status = 'active' AND start_date <= $2 AND end_date >= $2
            ORDER BY start_date DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// Swap the plan on an existing period, keeping its dates. Used for
    /// mid-period upgrades, where the allowance changes immediately.
    #[instrument(skip(self), err)]
    pub async fn update_plan(
        &mut self,
        id: SubscriptionId,
        plan_id: PlanId,
        monthly_limit: i32,
    ) -> Result<Option<SubscriptionDBResponse>> {
        let subscription = sqlx::query_as::<_, SubscriptionDBResponse>(&format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $2, monthly_limit = $3, updated_at = now()
            WHERE id = $1 AND status = 'active'
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(plan_id)
        .bind(monthly_limit)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscription)
    }

    /// Cancel any queued future period for the user, then insert the given
    /// one. At most one `next` slot exists per user.
    #[instrument(skip(self, request), fields(user_id = %request.user_id), err)]
    pub async fn replace_next(
        &mut self,
        today: NaiveDate,
        request: &SubscriptionCreateDBRequest,
    ) -> Result<SubscriptionDBResponse> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'cancelled', updated_at = now()
            WHERE user_id = $1 AND status = 'active' AND start_date > $2
            "#,
        )
        .bind(request.user_id)
        .bind(today)
        .execute(&mut *self.db)
        .await?;

        self.create(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_plan, create_test_user};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_lazy_expiry_promotes_queued_period(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Subscriptions::new(&mut conn);

        // A lapsed period followed by one that covers today
        repo.create(&SubscriptionCreateDBRequest {
            user_id: user.id,
            plan_id: plan.id,
            monthly_limit: plan.monthly_limit,
            start_date: today - Duration::days(60),
            end_date: today - Duration::days(31),
        })
        .await
        .unwrap();
        repo.create(&SubscriptionCreateDBRequest {
            user_id: user.id,
            plan_id: plan.id,
            monthly_limit: plan.monthly_limit,
            start_date: today - Duration::days(30),
            end_date: today + Duration::days(1),
        })
        .await
        .unwrap();

        assert_eq!(repo.expire_stale(user.id, today).await.unwrap(), 1);
        let current = repo.current_active(user.id, today).await.unwrap().unwrap();
        assert_eq!(current.start_date, today - Duration::days(30));
        assert_eq!(current.status, SubscriptionStatus::Active);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replace_next_keeps_single_queued_slot(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 8);
        let bigger = create_test_plan(&pool, 16);
        let (plan, bigger) = (plan.await, bigger.await);
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Subscriptions::new(&mut conn);

        repo.replace_next(
            today,
            &SubscriptionCreateDBRequest {
                user_id: user.id,
                plan_id: plan.id,
                monthly_limit: plan.monthly_limit,
                start_date: today + Duration::days(10),
                end_date: today + Duration::days(40),
            },
        )
        .await
        .unwrap();

        let replacement = repo
            .replace_next(
                today,
                &SubscriptionCreateDBRequest {
                    user_id: user.id,
                    plan_id: bigger.id,
                    monthly_limit: bigger.monthly_limit,
                    start_date: today + Duration::days(10),
                    end_date: today + Duration::days(40),
                },
            )
            .await
            .unwrap();

        let next = repo.next_upcoming(user.id, today).await.unwrap().unwrap();
        assert_eq!(next.id, replacement.id);
        assert_eq!(next.monthly_limit, 16);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_active_covering_matches_session_date_not_today(pool: PgPool) {
        let user = create_test_user(&pool, false).await;
        let plan = create_test_plan(&pool, 12).await;
        let today = Utc::now().date_naive();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Subscriptions::new(&mut conn);

        repo.create(&SubscriptionCreateDBRequest {
            user_id: user.id,
            plan_id: plan.id,
            monthly_limit: plan.monthly_limit,
            start_date: today + Duration::days(5),
            end_date: today + Duration::days(35),
        })
        .await
        .unwrap();

        assert!(repo.active_covering(user.id, today).await.unwrap().is_none());
        assert!(repo.active_covering(user.id, today + Duration::days(6)).await.unwrap().is_some());
    }
}
