use crate::db::errors::Result;
use crate::db::models::schedule::{
    DaySettingDBResponse, DaySettingWithPeriods, DaySettingWriteDBRequest, WorkPeriodDBResponse,
};
use sqlx::PgConnection;
use tracing::instrument;

/// Repository for the Calendar Template Store: seven day rows plus their
/// work periods. Day rows are seeded by migration and only updated in place.
pub struct Schedule<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Schedule<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// All seven day settings with their periods, ordered Sunday-first and
    /// chronologically within a day.
    pub async fn settings(&mut self) -> Result<Vec<DaySettingWithPeriods>> {
        let days = sqlx::query_as::<_, DaySettingDBResponse>(
            "SELECT day_of_week, enabled FROM day_settings ORDER BY day_of_week",
        )
        .fetch_all(&mut *self.db)
        .await?;

        let periods = sqlx::query_as::<_, WorkPeriodDBResponse>(
            "SELECT id, day_of_week, start_time, end_time FROM work_periods ORDER BY day_of_week, start_time",
        )
        .fetch_all(&mut *self.db)
        .await?;

        let mut out: Vec<DaySettingWithPeriods> = days
            .into_iter()
            .map(|d| DaySettingWithPeriods {
                day_of_week: d.day_of_week,
                enabled: d.enabled,
                work_periods: Vec::new(),
            })
            .collect();

        for period in periods {
            if let Some(day) = out.iter_mut().find(|d| d.day_of_week == period.day_of_week) {
                day.work_periods.push(period);
            }
        }

        Ok(out)
    }

    /// Replace the stored settings with the given days. Disabled days have
    /// their periods cleared; enabled days get their period set replaced
    /// wholesale (caller validates non-overlap first). Period ids supplied by
    /// the caller are preserved so generation details stay traceable.
    #[instrument(skip(self, days), fields(count = days.len()), err)]
    pub async fn replace(&mut self, days: &[DaySettingWriteDBRequest]) -> Result<()> {
        for day in days {
            sqlx::query("UPDATE day_settings SET enabled = $2, updated_at = now() WHERE day_of_week = $1")
                .bind(day.day_of_week)
                .bind(day.enabled)
                .execute(&mut *self.db)
                .await?;

            sqlx::query("DELETE FROM work_periods WHERE day_of_week = $1")
                .bind(day.day_of_week)
                .execute(&mut *self.db)
                .await?;

            if !day.enabled {
                continue;
            }

            for period in &day.work_periods {
                sqlx::query(
                    r#"
                    INSERT INTO work_periods (id, day_of_week, start_time, end_time)
                    VALUES (COALESCE($1, uuid_generate_v4()), $2, $3, $4)
                    "#,
                )
                .bind(period.id)
                .bind(day.day_of_week)
                .bind(period.start_time)
                .bind(period.end_time)
                .execute(&mut *self.db)
                .await?;
            }
        }

        Ok(())
    }
}
