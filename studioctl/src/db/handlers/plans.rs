use crate::db::errors::Result;
use crate::db::models::plans::{PlanCreateDBRequest, PlanDBResponse};
use crate::types::PlanId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct Plans<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Plans<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &PlanCreateDBRequest) -> Result<PlanDBResponse> {
        let plan = sqlx::query_as::<_, PlanDBResponse>(
            r#"
            INSERT INTO plans (name, monthly_limit, price)
            VALUES ($1, $2, $3)
            RETURNING id, name, monthly_limit, price, active, created_at
            "#,
        )
        .bind(&request.name)
        .bind(request.monthly_limit)
        .bind(request.price)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(plan)
    }

    pub async fn get(&mut self, id: PlanId) -> Result<Option<PlanDBResponse>> {
        let plan = sqlx::query_as::<_, PlanDBResponse>(
            "SELECT id, name, monthly_limit, price, active, created_at FROM plans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(plan)
    }

    pub async fn list_active(&mut self) -> Result<Vec<PlanDBResponse>> {
        let plans = sqlx::query_as::<_, PlanDBResponse>(
            "SELECT id, name, monthly_limit, price, active, created_at FROM plans WHERE active ORDER BY monthly_limit",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(plans)
    }
}
