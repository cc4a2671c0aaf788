use crate::db::errors::Result;
use crate::db::models::reservations::{
    ReservationCreateDBRequest, ReservationDBResponse, ReservationStatus, ReservationWithHolderDBResponse,
    ReservationWithSessionDBResponse,
};
use crate::types::{ReservationId, SessionId, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

const RESERVATION_COLUMNS: &str =
    "id, session_id, user_id, guest_name, guest_phone, bed_number, status, created_at, canceled_at";

/// The seat ledger, scoped to reservations rows. Seat acquisition is a plain
/// INSERT: the partial unique indexes `reservations_session_bed_active` and
/// `reservations_session_user_active` are the authoritative arbiters under
/// concurrency, surviving process crashes and horizontal scaling. Callers
/// translate the resulting `UniqueViolation` by constraint name.
pub struct Reservations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reservations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Bed numbers currently occupied in the session, ascending.
    pub async fn occupied_beds(&mut self, session_id: SessionId) -> Result<Vec<i32>> {
        let beds: Vec<i32> = sqlx::query_scalar(
            "SELECT bed_number FROM reservations WHERE session_id = $1 AND status = 'booked' ORDER BY bed_number",
        )
        .bind(session_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(beds)
    }

    /// Insert an active reservation. Exactly one of two concurrent inserts
    /// for the same (session, bed) can succeed; the loser gets a
    /// `UniqueViolation` on `reservations_session_bed_active`.
    #[instrument(skip(self, request), fields(session_id = %request.session_id, bed = request.bed_number), err)]
    pub async fn try_acquire(&mut self, request: &ReservationCreateDBRequest) -> Result<ReservationDBResponse> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>(&format!(
            r#"
            INSERT INTO reservations (session_id, user_id, guest_name, guest_phone, bed_number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(request.session_id)
        .bind(request.user_id)
        .bind(&request.guest_name)
        .bind(&request.guest_phone)
        .bind(request.bed_number)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(reservation)
    }

    pub async fn get(&mut self, id: ReservationId) -> Result<Option<ReservationDBResponse>> {
        let reservation =
            sqlx::query_as::<_, ReservationDBResponse>(&format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(reservation)
    }

    pub async fn get_for_update(&mut self, id: ReservationId) -> Result<Option<ReservationDBResponse>> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(reservation)
    }

    /// Release the seat. Only flips `booked` rows; canceling an already
    /// canceled reservation is the caller's idempotent no-op.
    #[instrument(skip(self), err)]
    pub async fn cancel(&mut self, id: ReservationId, at: DateTime<Utc>) -> Result<Option<ReservationDBResponse>> {
        let reservation = sqlx::query_as::<_, ReservationDBResponse>(&format!(
            r#"
            UPDATE reservations
            SET status = $2, canceled_at = $3
            WHERE id = $1 AND status = 'booked'
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(ReservationStatus::Canceled)
        .bind(at)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(reservation)
    }

    /// Cascade for whole-session cancellation: every active reservation
    /// transitions to canceled, returned so the caller can emit events.
    #[instrument(skip(self), err)]
    pub async fn cancel_all_for_session(
        &mut self,
        session_id: SessionId,
        at: DateTime<Utc>,
    ) -> Result<Vec<ReservationDBResponse>> {
        let reservations = sqlx::query_as::<_, ReservationDBResponse>(&format!(
            r#"
            UPDATE reservations
            SET status = $2, canceled_at = $3
            WHERE session_id = $1 AND status = 'booked'
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(ReservationStatus::Canceled)
        .bind(at)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(reservations)
    }

    /// Active reservations in the session with each holder's display name,
    /// ordered by bed. Members resolve to their account name, walk-ins keep
    /// the guest name the admin entered.
    pub async fn list_active_with_holders(&mut self, session_id: SessionId) -> Result<Vec<ReservationWithHolderDBResponse>> {
        let reservations = sqlx::query_as::<_, ReservationWithHolderDBResponse>(
            r#"
            SELECT r.id, r.bed_number, r.status, r.user_id,
                   COALESCE(u.full_name, r.guest_name) AS holder_name,
                   r.guest_phone, r.created_at
            FROM reservations r
            LEFT JOIN users u ON u.id = r.user_id
            WHERE r.session_id = $1 AND r.status = 'booked'
            ORDER BY r.bed_number
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(reservations)
    }

    /// Whether the user already holds an active reservation in this session.
    pub async fn user_has_active(&mut self, session_id: SessionId, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reservations WHERE session_id = $1 AND user_id = $2 AND status = 'booked')",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(exists)
    }

    /// Count of the user's active reservations whose session starts inside
    /// `[from, to)`. This is the derived quota usage: never stored, so it can
    /// never drift from reservation state.
    pub async fn count_booked_between(&mut self, user_id: UserId, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM reservations r
            JOIN sessions s ON s.id = r.session_id
            WHERE r.user_id = $1
              AND r.status = 'booked'
              AND s.starts_at >= $2
              AND s.starts_at < $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// The user's reservations joined with session details, upcoming
    /// (soonest first) or past (most recent first) relative to `now`.
    pub async fn list_for_user(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
        upcoming: bool,
        limit: i64,
    ) -> Result<Vec<ReservationWithSessionDBResponse>> {
        let comparison = if upcoming { ">=" } else { "<" };
        let order = if upcoming { "ASC" } else { "DESC" };

        let reservations = sqlx::query_as::<_, ReservationWithSessionDBResponse>(&format!(
            r#"
            SELECT r.id, r.bed_number, r.status, r.created_at, r.canceled_at,
                   s.id AS session_id,
                   s.title AS session_title,
                   s.starts_at AS session_starts_at,
                   s.duration_min AS session_duration_min,
                   s.instructor_name AS session_instructor_name,
                   s.location_name AS session_location_name
            FROM reservations r
            JOIN sessions s ON s.id = r.session_id
            WHERE r.user_id = $1 AND s.starts_at {comparison} $2
            ORDER BY s.starts_at {order}
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(reservations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::test_utils::{create_test_session, create_test_user};
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    fn booking(session_id: SessionId, user_id: UserId, bed_number: i32) -> ReservationCreateDBRequest {
        ReservationCreateDBRequest {
            session_id,
            user_id: Some(user_id),
            guest_name: None,
            guest_phone: None,
            bed_number,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_same_bed_second_insert_violates_unique_index(pool: PgPool) {
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;
        let alice = create_test_user(&pool, false).await;
        let bob = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);

        repo.try_acquire(&booking(session.id, alice.id, 2)).await.unwrap();
        let err = repo.try_acquire(&booking(session.id, bob.id, 2)).await.unwrap_err();

        match err {
            DbError::UniqueViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("reservations_session_bed_active"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_same_user_second_bed_violates_unique_index(pool: PgPool) {
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;
        let alice = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);

        repo.try_acquire(&booking(session.id, alice.id, 1)).await.unwrap();
        let err = repo.try_acquire(&booking(session.id, alice.id, 5)).await.unwrap_err();

        match err {
            DbError::UniqueViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("reservations_session_user_active"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_canceled_seat_can_be_reacquired(pool: PgPool) {
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;
        let alice = create_test_user(&pool, false).await;
        let bob = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);

        let first = repo.try_acquire(&booking(session.id, alice.id, 4)).await.unwrap();
        repo.cancel(first.id, Utc::now()).await.unwrap().unwrap();

        // Seat freed: the partial index ignores canceled rows
        let second = repo.try_acquire(&booking(session.id, bob.id, 4)).await.unwrap();
        assert_eq!(second.bed_number, 4);

        let beds = repo.occupied_beds(session.id).await.unwrap();
        assert_eq!(beds, vec![4]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_only_flips_booked_rows(pool: PgPool) {
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;
        let alice = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);

        let reservation = repo.try_acquire(&booking(session.id, alice.id, 1)).await.unwrap();
        assert!(repo.cancel(reservation.id, Utc::now()).await.unwrap().is_some());
        // Second cancel is a no-op at the ledger level
        assert!(repo.cancel(reservation.id, Utc::now()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_guest_rows_do_not_collide_on_user_index(pool: PgPool) {
        let session = create_test_session(&pool, Utc::now() + Duration::days(3), 8).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);

        for bed in 1..=2 {
            repo.try_acquire(&ReservationCreateDBRequest {
                session_id: session.id,
                user_id: None,
                guest_name: Some(format!("walk-in {bed}")),
                guest_phone: None,
                bed_number: bed,
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.occupied_beds(session.id).await.unwrap(), vec![1, 2]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_windowed_count_follows_session_start(pool: PgPool) {
        let inside = create_test_session(&pool, Utc::now() + Duration::days(1), 8).await;
        let outside = create_test_session(&pool, Utc::now() + Duration::days(20), 8).await;
        let alice = create_test_user(&pool, false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reservations::new(&mut conn);
        repo.try_acquire(&booking(inside.id, alice.id, 1)).await.unwrap();
        repo.try_acquire(&booking(outside.id, alice.id, 1)).await.unwrap();

        let count = repo
            .count_booked_between(alice.id, Utc::now(), Utc::now() + Duration::days(7))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
