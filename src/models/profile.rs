use serde::{Deserialize, Serialize};

/// FME job-execution server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FmeServer {
    #[serde(default)]
    pub id: Option<i64>,
    pub server: String,
    pub port: u16,
}

/// FME routine run for a subphase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FmeProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub fme_server_id: i64,
    pub routine: String,
    #[serde(default)]
    pub requires_finalization: bool,
    #[serde(default)]
    pub generates_false_positive: bool,
    pub subphase_id: i64,
    pub ordem: i64,
    /// Subphase name, filled on listing
    #[serde(default)]
    pub subphase: Option<String>,
}

/// QGIS processing model run for a subphase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub qgis_model_id: i64,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub requires_finalization: bool,
    #[serde(default)]
    pub generates_false_positive: bool,
    pub subphase_id: i64,
    pub ordem: i64,
    /// Model name, filled on listing
    #[serde(default)]
    pub model_name: Option<String>,
    /// Model description, filled on listing
    #[serde(default)]
    pub model_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub rule_group_id: i64,
    pub subphase_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub subphase_id: i64,
}
