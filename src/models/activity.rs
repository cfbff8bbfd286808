use serde::{Deserialize, Serialize};

/// Activity status (tipo de situação)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    NotStarted,
    Running,
    Paused,
    Finished,
    Canceled,
}

impl ActivityStatus {
    pub fn code(&self) -> i64 {
        match self {
            ActivityStatus::NotStarted => 1,
            ActivityStatus::Running => 2,
            ActivityStatus::Paused => 3,
            ActivityStatus::Finished => 4,
            ActivityStatus::Canceled => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ActivityStatus::NotStarted),
            2 => Some(ActivityStatus::Running),
            3 => Some(ActivityStatus::Paused),
            4 => Some(ActivityStatus::Finished),
            5 => Some(ActivityStatus::Canceled),
            _ => None,
        }
    }

    /// Statuses an activity may be deleted in
    pub const DELETABLE: [ActivityStatus; 2] = [ActivityStatus::NotStarted, ActivityStatus::Paused];
}

impl rusqlite::types::FromSql for ActivityStatus {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let code = i64::column_result(value)?;
        Self::from_code(code).ok_or(rusqlite::types::FromSqlError::OutOfRange(code))
    }
}

/// Assignment of a work unit to a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub stage_id: i64,
    pub work_unit_id: i64,
    pub status: ActivityStatus,
}
