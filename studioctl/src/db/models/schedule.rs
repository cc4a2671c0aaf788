use crate::types::WorkPeriodId;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One admin-defined generation window within a weekday ("HH:mm" times in
/// the studio timezone).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkPeriodDBResponse {
    pub id: WorkPeriodId,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Weekday row (0 = Sunday .. 6 = Saturday). Rows exist for all seven days
/// and are only ever updated in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DaySettingDBResponse {
    pub day_of_week: i16,
    pub enabled: bool,
}

/// A weekday together with its ordered, non-overlapping work periods.
#[derive(Debug, Clone)]
pub struct DaySettingWithPeriods {
    pub day_of_week: i16,
    pub enabled: bool,
    pub work_periods: Vec<WorkPeriodDBResponse>,
}

#[derive(Debug, Clone)]
pub struct WorkPeriodWriteDBRequest {
    pub id: Option<WorkPeriodId>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct DaySettingWriteDBRequest {
    pub day_of_week: i16,
    pub enabled: bool,
    pub work_periods: Vec<WorkPeriodWriteDBRequest>,
}
