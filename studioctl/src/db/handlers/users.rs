use crate::db::errors::Result;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::types::UserId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (full_name, email, phone, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING id, full_name, email, phone, is_admin, created_at, updated_at
            "#,
        )
        .bind(&request.full_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.is_admin)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    /// Idempotent upsert used for the initial admin user created on startup.
    #[instrument(skip(self), err)]
    pub async fn ensure_admin(&mut self, email: &str, full_name: &str) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (full_name, email, is_admin)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (email) DO UPDATE SET is_admin = TRUE, updated_at = now()
            RETURNING id, full_name, email, phone, is_admin, created_at, updated_at
            "#,
        )
        .bind(full_name)
        .bind(email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "SELECT id, full_name, email, phone, is_admin, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "SELECT id, full_name, email, phone, is_admin, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    /// Take a row-level lock on the user, serializing quota checks per user
    /// for the duration of the surrounding transaction.
    pub async fn lock(&mut self, id: UserId) -> Result<()> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(())
    }
}
