use serde::{Deserialize, Serialize};

/// Stage kind (tipo de etapa)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Normal,
    Review,
    Correction,
    ReviewCorrection,
}

impl StageKind {
    pub fn code(&self) -> i64 {
        match self {
            StageKind::Normal => 1,
            StageKind::Review => 2,
            StageKind::Correction => 3,
            StageKind::ReviewCorrection => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(StageKind::Normal),
            2 => Some(StageKind::Review),
            3 => Some(StageKind::Correction),
            4 => Some(StageKind::ReviewCorrection),
            _ => None,
        }
    }
}

impl rusqlite::types::FromSql for StageKind {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let code = i64::column_result(value)?;
        Self::from_code(code).ok_or(rusqlite::types::FromSqlError::OutOfRange(code))
    }
}

/// A step in a subphase pipeline, positioned by `ordem`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub kind: StageKind,
    pub subphase_id: i64,
    pub ordem: i64,
    pub note: Option<String>,
}

/// Stage row joined with its naming context, for listings
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub id: i64,
    pub kind: StageKind,
    pub kind_name: String,
    pub subphase_id: i64,
    pub subphase: String,
    pub ordem: i64,
    pub note: Option<String>,
    pub phase_type: String,
    pub production_line: String,
    pub project: String,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionLine {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub project: String,
    pub finished: bool,
    pub product_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Phase {
    pub id: i64,
    pub phase_type: String,
    pub production_line_id: i64,
    pub production_line: String,
    pub ordem: i64,
    pub project: String,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubPhase {
    pub id: i64,
    pub name: String,
    pub phase_id: i64,
    pub phase_type: String,
    pub ordem: i64,
    pub note: Option<String>,
    pub production_line: String,
    pub project: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_codes() {
        for kind in [
            StageKind::Normal,
            StageKind::Review,
            StageKind::Correction,
            StageKind::ReviewCorrection,
        ] {
            assert_eq!(StageKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(StageKind::Review.code(), 2);
        assert_eq!(StageKind::from_code(0), None);
        assert_eq!(StageKind::from_code(5), None);
    }
}
