use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Settings read from the `rc` file (`key=value` lines, `#` comments)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Database location, already resolved against the rc directory
    pub data_location: Option<PathBuf>,
    /// Default acting user for owner stamping
    pub user_id: Option<i64>,
}

impl Config {
    /// Base directory for configuration and the default database
    pub fn base_dir() -> PathBuf {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        home.join(".sap")
    }

    pub fn rc_path() -> PathBuf {
        Self::base_dir().join("rc")
    }

    /// Load the rc file if present, defaults otherwise
    pub fn load() -> Result<Self> {
        let path = Self::rc_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents, path.parent().unwrap_or(Path::new(".")))
    }

    /// Parse rc contents; relative paths resolve against `rc_dir`
    pub fn parse(contents: &str, rc_dir: &Path) -> Result<Self> {
        let mut config = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("Ignoring malformed config line: {}", line);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = Some(if path.is_relative() {
                        rc_dir.join(path)
                    } else {
                        path
                    });
                }
                "user.id" => {
                    let id = value
                        .parse::<i64>()
                        .with_context(|| format!("Invalid user.id in config: '{}'", value))?;
                    config.user_id = Some(id);
                }
                other => log::debug!("Unknown config key: {}", other),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_relative_location() {
        let dir = TempDir::new().unwrap();
        let config = Config::parse("data.location=./custom.db\n", dir.path()).unwrap();
        assert_eq!(config.data_location, Some(dir.path().join("./custom.db")));
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn test_parse_absolute_location_and_user() {
        let config = Config::parse(
            "# production box\ndata.location=/var/lib/sap/sap.db\nuser.id = 12\n",
            Path::new("/home/op/.sap"),
        )
        .unwrap();
        assert_eq!(config.data_location, Some(PathBuf::from("/var/lib/sap/sap.db")));
        assert_eq!(config.user_id, Some(12));
    }

    #[test]
    fn test_parse_rejects_bad_user_id() {
        assert!(Config::parse("user.id=abc", Path::new(".")).is_err());
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let config = Config::parse("garbage\nfoo=bar\n", Path::new(".")).unwrap();
        assert_eq!(config, Config::default());
    }
}
