use serde::{Deserialize, Serialize};

/// Work unit (unidade de trabalho) model
///
/// `geom` holds WKT or EWKT text. `id` is `None` for rows not yet inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub geom: String,
    #[serde(default)]
    pub epsg: Option<i64>,
    #[serde(default)]
    pub production_data_id: Option<i64>,
    #[serde(default)]
    pub subphase_id: Option<i64>,
    #[serde(default)]
    pub lot_id: Option<i64>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub note: Option<String>,
}

impl WorkUnit {
    pub fn new(name: impl Into<String>, geom: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            geom: geom.into(),
            epsg: None,
            production_data_id: None,
            subphase_id: None,
            lot_id: None,
            available: false,
            priority: 0,
            note: None,
        }
    }
}

/// Source id → clone id pair produced by a work-unit copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopiedWorkUnit {
    pub source_id: i64,
    pub copy_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub id: i64,
    pub name: String,
}

/// Product (produto) of a production line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: Option<i64>,
    /// Generated when absent
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mi: Option<String>,
    #[serde(default)]
    pub inom: Option<String>,
    pub scale: String,
    pub geom: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionData {
    pub id: i64,
    pub name: String,
    pub data_type_id: i64,
    pub data_type: String,
    pub production_config: Option<String>,
}

/// Production database endpoint, split from a `server:port` configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseEndpoint {
    pub name: String,
    pub server: String,
    pub port: Option<String>,
}

impl DatabaseEndpoint {
    pub fn from_config(name: String, config: &str) -> Self {
        let mut parts = config.splitn(2, ':');
        let server = parts.next().unwrap_or_default().to_string();
        let port = parts.next().map(|p| p.to_string());
        Self { name, server, port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_unit_deserialize_defaults() {
        let unit: WorkUnit = serde_json::from_str(
            r#"{"name": "MI-2965-2-NO", "geom": "POLYGON((0 0,1 0,1 1,0 1,0 0))"}"#,
        )
        .unwrap();
        assert_eq!(unit.id, None);
        assert!(!unit.available);
        assert_eq!(unit.priority, 0);
        assert_eq!(unit, WorkUnit::new("MI-2965-2-NO", "POLYGON((0 0,1 0,1 1,0 1,0 0))"));
    }

    #[test]
    fn test_database_endpoint_split() {
        let endpoint = DatabaseEndpoint::from_config("bdgex".into(), "10.0.0.5:5432");
        assert_eq!(endpoint.server, "10.0.0.5");
        assert_eq!(endpoint.port.as_deref(), Some("5432"));

        let endpoint = DatabaseEndpoint::from_config("local".into(), "localhost");
        assert_eq!(endpoint.server, "localhost");
        assert_eq!(endpoint.port, None);
    }
}
