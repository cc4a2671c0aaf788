use crate::db::errors::Result;
use crate::db::models::sessions::{
    SessionCreateDBRequest, SessionDBResponse, SessionStatus, SessionUpdateDBRequest, SessionWithOccupancyDBResponse,
};
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

const SESSION_COLUMNS: &str =
    "id, title, session_type, starts_at, duration_min, capacity_total, instructor_name, location_name, status, created_at, updated_at";

pub struct Sessions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Sessions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(starts_at = %request.starts_at), err)]
    pub async fn create(&mut self, request: &SessionCreateDBRequest) -> Result<SessionDBResponse> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            INSERT INTO sessions (title, session_type, starts_at, duration_min, capacity_total, instructor_name, location_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(&request.title)
        .bind(request.session_type)
        .bind(request.starts_at)
        .bind(request.duration_min)
        .bind(request.capacity_total)
        .bind(&request.instructor_name)
        .bind(&request.location_name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(session)
    }

    /// Insert unless a scheduled session already holds the start instant.
    /// The conflict is absorbed by `ON CONFLICT DO NOTHING` rather than
    /// raised, so a losing insert cannot abort an enclosing transaction.
    #[instrument(skip(self, request), fields(starts_at = %request.starts_at), err)]
    pub async fn create_if_start_free(&mut self, request: &SessionCreateDBRequest) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            INSERT INTO sessions (title, session_type, starts_at, duration_min, capacity_total, instructor_name, location_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (starts_at) WHERE status = 'scheduled' DO NOTHING
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(&request.title)
        .bind(request.session_type)
        .bind(request.starts_at)
        .bind(request.duration_min)
        .bind(request.capacity_total)
        .bind(&request.instructor_name)
        .bind(&request.location_name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session)
    }

    pub async fn get(&mut self, id: SessionId) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(session)
    }

    /// Fetch with a row-level lock, for capacity edits and whole-session
    /// cancellation inside a transaction.
    pub async fn get_for_update(&mut self, id: SessionId) -> Result<Option<SessionDBResponse>> {
        let session =
            sqlx::query_as::<_, SessionDBResponse>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(session)
    }

    /// Fetch with a shared lock. Bookers hold this across their transaction
    /// so a whole-session cancellation (which takes the row FOR UPDATE)
    /// cannot slip between the status check and the reservation insert.
    pub async fn get_for_share(&mut self, id: SessionId) -> Result<Option<SessionDBResponse>> {
        let session =
            sqlx::query_as::<_, SessionDBResponse>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 FOR SHARE"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(session)
    }

    /// Count of active reservations for one session, derived at read time.
    pub async fn occupied_count(&mut self, id: SessionId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE session_id = $1 AND status = 'booked'")
                .bind(id)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(count)
    }

    pub async fn get_with_occupancy(&mut self, id: SessionId) -> Result<Option<SessionWithOccupancyDBResponse>> {
        let session = sqlx::query_as::<_, SessionWithOccupancyDBResponse>(&format!(
            r#"
            SELECT s.{columns}, COALESCE(r.occupied, 0) AS occupied_count
            FROM sessions s
            LEFT JOIN (
                SELECT session_id, COUNT(*) AS occupied
                FROM reservations
                WHERE status = 'booked'
                GROUP BY session_id
            ) r ON r.session_id = s.id
            WHERE s.id = $1
            "#,
            columns = SESSION_COLUMNS.replace(", ", ", s.")
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session)
    }

    /// Sessions starting inside `[from, to)` with their occupancy, ordered
    /// chronologically.
    pub async fn list_between(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionWithOccupancyDBResponse>> {
        let sessions = sqlx::query_as::<_, SessionWithOccupancyDBResponse>(&format!(
            r#"
            SELECT s.{columns}, COALESCE(r.occupied, 0) AS occupied_count
            FROM sessions s
            LEFT JOIN (
                SELECT session_id, COUNT(*) AS occupied
                FROM reservations
                WHERE status = 'booked'
                GROUP BY session_id
            ) r ON r.session_id = s.id
            WHERE s.starts_at >= $1 AND s.starts_at < $2
            ORDER BY s.starts_at
            "#,
            columns = SESSION_COLUMNS.replace(", ", ", s.")
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(sessions)
    }

    /// Start instants of live sessions inside `[from, to)`. The generator
    /// dedupes candidates against this set (exact-match tolerance).
    pub async fn scheduled_start_times_between(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let starts: Vec<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT starts_at FROM sessions WHERE status = 'scheduled' AND starts_at >= $1 AND starts_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(starts)
    }

    #[instrument(skip(self, request), err)]
    pub async fn update(&mut self, id: SessionId, request: &SessionUpdateDBRequest) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            UPDATE sessions
            SET title = COALESCE($2, title),
                session_type = COALESCE($3, session_type),
                starts_at = COALESCE($4, starts_at),
                duration_min = COALESCE($5, duration_min),
                capacity_total = COALESCE($6, capacity_total),
                instructor_name = COALESCE($7, instructor_name),
                updated_at = now()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.title)
        .bind(request.session_type)
        .bind(request.starts_at)
        .bind(request.duration_min)
        .bind(request.capacity_total)
        .bind(&request.instructor_name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session)
    }

    /// Mark the session canceled. Its reservations are left for the caller to
    /// cascade; a canceled session accepts no new bookings but keeps its
    /// history for audit.
    #[instrument(skip(self), err)]
    pub async fn cancel(&mut self, id: SessionId) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, SessionDBResponse>(&format!(
            r#"
            UPDATE sessions
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(SessionStatus::Canceled)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::sessions::SessionType;
    use crate::test_utils::{create_test_session, create_test_user};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_occupancy_is_derived_from_active_reservations(pool: PgPool) {
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;
        let user = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("INSERT INTO reservations (session_id, user_id, bed_number) VALUES ($1, $2, 1)")
            .bind(session.id)
            .bind(user.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let mut repo = Sessions::new(&mut conn);
        let with_occupancy = repo.get_with_occupancy(session.id).await.unwrap().unwrap();
        assert_eq!(with_occupancy.occupied_count, 1);

        // Canceled reservations free the seat in the derived count
        sqlx::query("UPDATE reservations SET status = 'canceled', canceled_at = now() WHERE session_id = $1")
            .bind(session.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let mut repo = Sessions::new(&mut conn);
        let with_occupancy = repo.get_with_occupancy(session.id).await.unwrap().unwrap();
        assert_eq!(with_occupancy.occupied_count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_scheduled_start_rejected(pool: PgPool) {
        let starts_at = Utc::now() + Duration::days(2);
        create_test_session(&pool, starts_at, 8).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sessions::new(&mut conn);
        let err = repo
            .create(&SessionCreateDBRequest {
                title: "duplicate".to_string(),
                session_type: SessionType::PilatesReformer,
                starts_at,
                duration_min: 60,
                capacity_total: 8,
                instructor_name: None,
                location_name: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, crate::db::errors::DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_conflicting_insert_leaves_transaction_usable(pool: PgPool) {
        let starts_at = Utc::now() + Duration::days(2);
        create_test_session(&pool, starts_at, 8).await;

        let request = SessionCreateDBRequest {
            title: "morning flow".to_string(),
            session_type: SessionType::PilatesReformer,
            starts_at,
            duration_min: 60,
            capacity_total: 8,
            instructor_name: None,
            location_name: None,
        };

        let mut tx = pool.begin().await.unwrap();
        let lost = Sessions::new(&mut tx).create_if_start_free(&request).await.unwrap();
        assert!(lost.is_none());

        // The same transaction must accept further inserts after the conflict
        let mut later = request.clone();
        later.starts_at = starts_at + Duration::hours(1);
        let created = Sessions::new(&mut tx).create_if_start_free(&later).await.unwrap();
        assert!(created.is_some());
        tx.commit().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_between_is_chronological(pool: PgPool) {
        let base = Utc::now() + Duration::days(7);
        create_test_session(&pool, base + Duration::hours(4), 8).await;
        create_test_session(&pool, base, 8).await;
        create_test_session(&pool, base + Duration::hours(2), 8).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Sessions::new(&mut conn);
        let sessions = repo.list_between(base - Duration::hours(1), base + Duration::days(1)).await.unwrap();

        assert_eq!(sessions.len(), 3);
        assert!(sessions.windows(2).all(|w| w[0].session.starts_at <= w[1].session.starts_at));
    }
}
