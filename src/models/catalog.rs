// QGIS catalog entities: styles, attribute rules, processing models, menus and layers.
// `owner` and `updated_ts` are stamped by the repositories and ignored on input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    #[serde(default)]
    pub id: Option<i64>,
    pub f_table_schema: String,
    pub f_table_name: String,
    pub f_geometry_column: String,
    pub stylename: String,
    #[serde(default)]
    pub styleqml: Option<String>,
    #[serde(default)]
    pub stylesld: Option<String>,
    #[serde(default)]
    pub ui: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub updated_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub color_rgb: String,
    pub ordem: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRule {
    #[serde(default)]
    pub id: Option<i64>,
    pub rule_group_id: i64,
    /// Group name, filled on listing
    #[serde(default)]
    pub rule_group: Option<String>,
    pub schema_name: String,
    pub layer: String,
    pub attribute: String,
    pub rule: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub updated_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QgisModel {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub model_xml: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub updated_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QgisMenu {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub updated_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default)]
    pub id: Option<i64>,
    pub schema_name: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    /// Filled on listing
    #[serde(default)]
    pub has_attributes: bool,
    /// Filled on listing
    #[serde(default)]
    pub has_profile: bool,
}
