//! Quota tracking: weekly (global, fixed) and monthly (plan-defined) booking
//! allowances.
//!
//! Usage is always derived by counting active reservations joined to session
//! start times, never stored. The booking path re-runs these checks inside
//! its own transaction (after taking the user row lock) rather than trusting
//! a previously fetched usage snapshot.

use crate::db::handlers::{Reservations, Subscriptions};
use crate::db::models::subscriptions::SubscriptionDBResponse;
use crate::errors::{ConflictCode, Error, Result};
use crate::types::UserId;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// Bookings allowed per week regardless of plan.
pub const WEEKLY_LIMIT: i64 = 3;

/// Derived usage for one user at one instant. Monthly fields are absent when
/// the user has no active subscription.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub weekly_used: i64,
    pub weekly_limit: i64,
    pub weekly_left: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_left: Option<i64>,
}

/// Midnight at the start of `date` in the studio timezone, as a UTC instant.
/// On a spring-forward day where midnight does not exist locally, the first
/// valid instant after the gap is used.
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let later = naive + Duration::hours(1);
            match tz.from_local_datetime(&later) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

/// The `[start, end)` UTC bounds of the Sunday-anchored week containing
/// `instant` in the studio timezone.
pub fn week_bounds(instant: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_date = instant.with_timezone(&tz).date_naive();
    let week_start = local_date - Duration::days(local_date.weekday().num_days_from_sunday() as i64);
    (local_midnight(week_start, tz), local_midnight(week_start + Duration::days(7), tz))
}

/// The `[start, end)` UTC bounds of a subscription period. The subscription
/// covers its end date, so the window runs through that whole local day.
pub fn period_bounds(subscription: &SubscriptionDBResponse, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        local_midnight(subscription.start_date, tz),
        local_midnight(subscription.end_date + Duration::days(1), tz),
    )
}

/// Compute the usage view relative to `now`: the current week's window and,
/// when an active subscription exists, its period window. Expires stale
/// subscription rows first so a lapsed plan never reports an allowance.
pub async fn usage(conn: &mut PgConnection, user_id: UserId, now: DateTime<Utc>, tz: Tz) -> Result<Usage> {
    let today = now.with_timezone(&tz).date_naive();
    Subscriptions::new(&mut *conn).expire_stale(user_id, today).await?;
    let subscription = Subscriptions::new(&mut *conn).current_active(user_id, today).await?;

    let (week_from, week_to) = week_bounds(now, tz);
    let weekly_used = Reservations::new(&mut *conn)
        .count_booked_between(user_id, week_from, week_to)
        .await?;

    let mut view = Usage {
        weekly_used,
        weekly_limit: WEEKLY_LIMIT,
        weekly_left: (WEEKLY_LIMIT - weekly_used).max(0),
        monthly_used: None,
        monthly_limit: None,
        monthly_left: None,
    };

    if let Some(sub) = &subscription {
        let (month_from, month_to) = period_bounds(sub, tz);
        let monthly_used = Reservations::new(&mut *conn)
            .count_booked_between(user_id, month_from, month_to)
            .await?;
        let monthly_limit = i64::from(sub.monthly_limit);
        view.monthly_used = Some(monthly_used);
        view.monthly_limit = Some(monthly_limit);
        view.monthly_left = Some((monthly_limit - monthly_used).max(0));
    }

    Ok(view)
}

/// Enforce both allowances for a booking of a session starting at
/// `session_start`. Windows are anchored to the session's start, not to
/// "now", so booking ahead into next week consumes next week's allowance.
///
/// Must run inside the booking transaction, after the user row lock.
pub async fn check_for_booking(
    conn: &mut PgConnection,
    user_id: UserId,
    session_start: DateTime<Utc>,
    tz: Tz,
) -> Result<()> {
    let session_date = session_start.with_timezone(&tz).date_naive();
    let subscription = Subscriptions::new(&mut *conn)
        .active_covering(user_id, session_date)
        .await?
        .ok_or_else(|| {
            Error::conflict(
                ConflictCode::NoActiveSubscription,
                "No active subscription covers the session date",
            )
        })?;

    let (week_from, week_to) = week_bounds(session_start, tz);
    let weekly_used = Reservations::new(&mut *conn)
        .count_booked_between(user_id, week_from, week_to)
        .await?;
    if weekly_used >= WEEKLY_LIMIT {
        return Err(Error::conflict(
            ConflictCode::QuotaExceeded,
            format!("Weekly limit of {WEEKLY_LIMIT} bookings reached"),
        ));
    }

    let (month_from, month_to) = period_bounds(&subscription, tz);
    let monthly_used = Reservations::new(&mut *conn)
        .count_booked_between(user_id, month_from, month_to)
        .await?;
    if monthly_used >= i64::from(subscription.monthly_limit) {
        return Err(Error::conflict(
            ConflictCode::QuotaExceeded,
            format!("Monthly limit of {} bookings reached", subscription.monthly_limit),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use chrono_tz::Europe::Athens;

    #[test]
    fn test_week_starts_on_sunday_in_studio_tz() {
        // 2025-06-11 is a Wednesday
        let instant = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        let (from, to) = week_bounds(instant, Athens);

        let local_from = from.with_timezone(&Athens);
        assert_eq!(local_from.weekday(), Weekday::Sun);
        assert_eq!(local_from.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 8).unwrap());
        assert_eq!(local_from.time(), NaiveTime::MIN);
        assert_eq!(to - from, Duration::days(7));
    }

    #[test]
    fn test_late_saturday_utc_can_already_be_sunday_locally() {
        // 23:00 UTC Saturday is 02:00 Sunday in Athens (UTC+3 in summer)
        let instant = Utc.with_ymd_and_hms(2025, 6, 14, 23, 0, 0).unwrap();
        let (from, _) = week_bounds(instant, Athens);
        assert_eq!(
            from.with_timezone(&Athens).date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
        );
    }

    #[test]
    fn test_sunday_midnight_belongs_to_the_new_week() {
        let sunday_midnight = local_midnight(NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(), Athens);
        let (from, _) = week_bounds(sunday_midnight, Athens);
        assert_eq!(from, sunday_midnight);

        // One second earlier is still Saturday's week
        let (prev_from, prev_to) = week_bounds(sunday_midnight - Duration::seconds(1), Athens);
        assert_eq!(prev_to, sunday_midnight);
        assert_eq!(prev_from, sunday_midnight - Duration::days(7));
    }

    #[test]
    fn test_period_window_covers_the_end_date() {
        let sub = SubscriptionDBResponse {
            id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            plan_id: uuid::Uuid::new_v4(),
            monthly_limit: 12,
            status: crate::db::models::subscriptions::SubscriptionStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let (from, to) = period_bounds(&sub, Athens);
        // A session late on June 30 local time is inside the window
        let last_evening = Athens
            .with_ymd_and_hms(2025, 6, 30, 21, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(from <= last_evening && last_evening < to);
        // July 1 midnight local is outside
        assert_eq!(to, local_midnight(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), Athens));
    }

    #[test]
    fn test_dst_gap_midnight_falls_forward() {
        // Athens springs forward on 2025-03-30 at 03:00→04:00, so midnight
        // exists; use a zone where midnight itself is skipped instead.
        let tz: Tz = "America/Santiago".parse().unwrap();
        // Chile springs forward 2025-09-07: 00:00 jumps to 01:00
        let bounded = local_midnight(NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(), tz);
        assert_eq!(bounded.with_timezone(&tz).time(), NaiveTime::from_hms_opt(1, 0, 0).unwrap());
    }
}
