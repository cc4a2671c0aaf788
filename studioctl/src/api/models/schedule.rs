//! API models for the weekly schedule template.

use crate::db::models::schedule::{DaySettingWithPeriods, DaySettingWriteDBRequest, WorkPeriodDBResponse, WorkPeriodWriteDBRequest};
use crate::errors::{Error, Result, ValidationCode};
use crate::types::WorkPeriodId;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkPeriodPayload {
    /// Present when updating an existing period, absent for new ones
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub id: Option<WorkPeriodId>,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "13:00:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaySettingPayload {
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: i16,
    pub enabled: bool,
    #[serde(default)]
    pub work_periods: Vec<WorkPeriodPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettingsUpdate {
    pub days: Vec<DaySettingPayload>,
}

/// The stored template plus the deployment-level calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettingsResponse {
    /// IANA studio timezone
    pub timezone: String,
    /// Always `sunday`; weeks are Sunday-anchored
    pub week_start: String,
    pub days: Vec<DaySettingPayload>,
}

impl From<DaySettingWithPeriods> for DaySettingPayload {
    fn from(day: DaySettingWithPeriods) -> Self {
        DaySettingPayload {
            day_of_week: day.day_of_week,
            enabled: day.enabled,
            work_periods: day.work_periods.into_iter().map(WorkPeriodPayload::from).collect(),
        }
    }
}

impl From<WorkPeriodDBResponse> for WorkPeriodPayload {
    fn from(period: WorkPeriodDBResponse) -> Self {
        WorkPeriodPayload {
            id: Some(period.id),
            start_time: period.start_time,
            end_time: period.end_time,
        }
    }
}

impl DaySettingPayload {
    /// Validate and convert for storage. Rejects inverted periods and any
    /// pair of overlapping periods within the day (touching endpoints are
    /// allowed).
    pub fn into_write_request(self) -> Result<DaySettingWriteDBRequest> {
        if !(0..=6).contains(&self.day_of_week) {
            return Err(Error::BadRequest {
                message: format!("dayOfWeek {} is out of range 0..=6", self.day_of_week),
            });
        }

        let mut periods = self.work_periods;
        for period in &periods {
            if period.start_time >= period.end_time {
                return Err(Error::validation(
                    ValidationCode::OverlappingPeriods,
                    format!(
                        "Period {}-{} on day {} ends before it starts",
                        period.start_time, period.end_time, self.day_of_week
                    ),
                ));
            }
        }

        periods.sort_by_key(|p| p.start_time);
        for pair in periods.windows(2) {
            if pair[1].start_time < pair[0].end_time {
                return Err(Error::validation(
                    ValidationCode::OverlappingPeriods,
                    format!(
                        "Periods {}-{} and {}-{} on day {} overlap",
                        pair[0].start_time, pair[0].end_time, pair[1].start_time, pair[1].end_time, self.day_of_week
                    ),
                ));
            }
        }

        Ok(DaySettingWriteDBRequest {
            day_of_week: self.day_of_week,
            enabled: self.enabled,
            work_periods: periods
                .into_iter()
                .map(|p| WorkPeriodWriteDBRequest {
                    id: p.id,
                    start_time: p.start_time,
                    end_time: p.end_time,
                })
                .collect(),
        })
    }
}
