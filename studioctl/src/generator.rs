//! Session generation: expands the weekly schedule template into concrete
//! dated sessions over a target range.
//!
//! Expansion is a pure function over the template; persistence happens in a
//! second phase that dedupes against existing scheduled sessions by exact
//! start instant. Duplicate starts are tolerated at insert time too (the
//! losing insert is absorbed, not raised), so two admins generating at once
//! cannot double-create a slot and the run's transaction stays healthy.

use crate::config::GeneratorConfig;
use crate::db::handlers::{Schedule, Sessions};
use crate::db::models::schedule::DaySettingWithPeriods;
use crate::db::models::sessions::SessionCreateDBRequest;
use crate::errors::{Error, Result, ValidationCode};
use crate::types::WorkPeriodId;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::{debug, instrument};

pub const MIN_DURATION_MIN: i32 = 15;
pub const MAX_DURATION_MIN: i32 = 180;

/// Parameters for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub duration_minutes: i32,
    /// Target weekdays, 0 = Sunday .. 6 = Saturday
    pub day_of_weeks: Vec<i16>,
    /// Range start; defaults to the Sunday of the current week. When absent,
    /// past candidates are filtered out; an explicit start takes the range
    /// as given.
    pub start_date: Option<NaiveDate>,
    pub weeks: u32,
    pub dry_run: bool,
}

/// Per-(weekday, period) outcome counts, ordered by day then period start.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDetail {
    pub day_of_week: i16,
    #[schema(value_type = String, format = "uuid")]
    pub period_id: WorkPeriodId,
    pub period_start: NaiveTime,
    pub created: i64,
    pub skipped: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub created: i64,
    pub skipped: i64,
    /// Set on dry runs: the count that a real run would have created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub would_create: Option<i64>,
    pub details: Vec<GenerationDetail>,
}

/// A concrete session start produced by template expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub starts_at: DateTime<Utc>,
    pub day_of_week: i16,
    pub period_id: WorkPeriodId,
    pub period_start: NaiveTime,
}

fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        // Start time swallowed by a DST gap: no session that day
        LocalResult::None => None,
    }
}

/// The Sunday of the week containing `now` in the studio timezone.
pub fn default_range_start(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    let local_date = now.with_timezone(&tz).date_naive();
    local_date - Duration::days(local_date.weekday().num_days_from_sunday() as i64)
}

/// Expand the template into candidate session starts for the range. Pure:
/// all skipping decided here is silent (duration does not fit the period,
/// past start when no explicit range, DST gap); only collisions with
/// existing sessions are reported as "skipped" in the result.
pub fn expand_candidates(
    days: &[DaySettingWithPeriods],
    params: &GenerateParams,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<Candidate>> {
    if !(MIN_DURATION_MIN..=MAX_DURATION_MIN).contains(&params.duration_minutes) {
        return Err(Error::validation(
            ValidationCode::InvalidDuration,
            format!("Duration must be between {MIN_DURATION_MIN} and {MAX_DURATION_MIN} minutes"),
        ));
    }
    if params.day_of_weeks.iter().any(|d| !(0..=6).contains(d)) {
        return Err(Error::BadRequest {
            message: "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        });
    }

    let filter_past = params.start_date.is_none();
    let range_start = params.start_date.unwrap_or_else(|| default_range_start(now, tz));
    let range_days = i64::from(params.weeks.max(1)) * 7;
    let duration = Duration::minutes(i64::from(params.duration_minutes));

    let mut candidates = Vec::new();
    for offset in 0..range_days {
        let date = range_start + Duration::days(offset);
        let day_of_week = date.weekday().num_days_from_sunday() as i16;
        if !params.day_of_weeks.contains(&day_of_week) {
            continue;
        }
        let Some(day) = days.iter().find(|d| d.day_of_week == day_of_week && d.enabled) else {
            continue;
        };

        for period in &day.work_periods {
            // The period bounds when sessions may start; the configured
            // duration must still fit before the period ends.
            let (session_end, wrapped_secs) = period.start_time.overflowing_add_signed(duration);
            if wrapped_secs != 0 || session_end > period.end_time {
                continue;
            }

            let Some(starts_at) = local_instant(date, period.start_time, tz) else {
                continue;
            };
            if filter_past && starts_at <= now {
                continue;
            }

            candidates.push(Candidate {
                starts_at,
                day_of_week,
                period_id: period.id,
                period_start: period.start_time,
            });
        }
    }

    candidates.sort_by_key(|c| c.starts_at);
    Ok(candidates)
}

fn tally(candidates: &[Candidate], created: &HashSet<DateTime<Utc>>) -> Vec<GenerationDetail> {
    let mut details: Vec<GenerationDetail> = Vec::new();
    for candidate in candidates {
        let idx = match details
            .iter()
            .position(|d| d.day_of_week == candidate.day_of_week && d.period_id == candidate.period_id)
        {
            Some(idx) => idx,
            None => {
                details.push(GenerationDetail {
                    day_of_week: candidate.day_of_week,
                    period_id: candidate.period_id,
                    period_start: candidate.period_start,
                    created: 0,
                    skipped: 0,
                });
                details.len() - 1
            }
        };
        let entry = &mut details[idx];
        if created.contains(&candidate.starts_at) {
            entry.created += 1;
        } else {
            entry.skipped += 1;
        }
    }
    details.sort_by_key(|d| (d.day_of_week, d.period_start));
    details
}

/// Run a generation pass: expand, dedupe against existing scheduled
/// sessions, and persist (unless `dry_run`).
#[instrument(skip(conn, config), fields(duration = params.duration_minutes, weeks = params.weeks, dry_run = params.dry_run), err)]
pub async fn generate(
    conn: &mut PgConnection,
    config: &GeneratorConfig,
    params: &GenerateParams,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<GenerationResult> {
    let days = Schedule::new(&mut *conn).settings().await?;
    let candidates = expand_candidates(&days, params, now, tz)?;

    let range_start = params.start_date.unwrap_or_else(|| default_range_start(now, tz));
    let range_end = range_start + Duration::days(i64::from(params.weeks.max(1)) * 7);
    let existing: HashSet<DateTime<Utc>> = Sessions::new(&mut *conn)
        .scheduled_start_times_between(
            candidates.first().map(|c| c.starts_at).unwrap_or(now),
            local_range_end(range_end, tz),
        )
        .await?
        .into_iter()
        .collect();

    let mut created_starts: HashSet<DateTime<Utc>> = HashSet::new();
    let mut skipped: i64 = 0;

    for candidate in &candidates {
        if existing.contains(&candidate.starts_at) {
            skipped += 1;
            continue;
        }
        if params.dry_run {
            created_starts.insert(candidate.starts_at);
            continue;
        }
        let request = SessionCreateDBRequest {
            title: config.default_title.clone(),
            session_type: crate::db::models::sessions::SessionType::PilatesReformer,
            starts_at: candidate.starts_at,
            duration_min: params.duration_minutes,
            capacity_total: config.default_capacity,
            instructor_name: config.default_instructor.clone(),
            location_name: config.default_location.clone(),
        };
        match Sessions::new(&mut *conn).create_if_start_free(&request).await? {
            Some(_) => {
                created_starts.insert(candidate.starts_at);
            }
            // Lost a race with a concurrent generation run
            None => skipped += 1,
        }
    }

    let details = tally(&candidates, &created_starts);
    let created = created_starts.len() as i64;
    debug!(created, skipped, "generation pass finished");

    Ok(GenerationResult {
        created: if params.dry_run { 0 } else { created },
        skipped,
        would_create: params.dry_run.then_some(created),
        details,
    })
}

fn local_range_end(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&date.and_time(NaiveTime::MIN)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
    }
}
