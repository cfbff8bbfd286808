use serde::{Deserialize, Serialize};
use crate::error::SapError;

/// Spatial relationship used to bind an input group to work units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationStrategy {
    /// Work unit centroid lies in the input geometry
    UnitCentroidInInput,
    /// Input centroid lies in the work unit geometry
    InputCentroidInUnit,
    Intersects,
    /// Interiors share an area (DE-9IM `2********`)
    Overlaps,
    /// Every input to every work unit
    All,
}

impl AssociationStrategy {
    pub fn code(&self) -> i64 {
        match self {
            AssociationStrategy::UnitCentroidInInput => 1,
            AssociationStrategy::InputCentroidInUnit => 2,
            AssociationStrategy::Intersects => 3,
            AssociationStrategy::Overlaps => 4,
            AssociationStrategy::All => 5,
        }
    }
}

impl TryFrom<i64> for AssociationStrategy {
    type Error = SapError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(AssociationStrategy::UnitCentroidInInput),
            2 => Ok(AssociationStrategy::InputCentroidInUnit),
            3 => Ok(AssociationStrategy::Intersects),
            4 => Ok(AssociationStrategy::Overlaps),
            5 => Ok(AssociationStrategy::All),
            other => Err(SapError::InvalidStrategy(other)),
        }
    }
}

/// Strategy code/name row as seeded in the datastore
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub code: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputGroup {
    pub id: i64,
    pub name: String,
}

/// Externally supplied dataset (insumo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub epsg: Option<i64>,
    #[serde(default)]
    pub geom: Option<String>,
    pub input_group_id: i64,
}

/// Link between an input and a work unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputBinding {
    pub id: i64,
    pub work_unit_id: i64,
    pub input_id: i64,
    pub default_path: Option<String>,
}
