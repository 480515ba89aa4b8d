use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Process configuration: bot credential, cache root, stats database and
/// logging format. File values can be overridden by environment variables
/// (`DISCORD_TOKEN`, `DOWNLOAD_DIR`, `STATS_DB_PATH`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub discord_token: Option<String>,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    #[serde(default)]
    pub stats_db: Option<PathBuf>,
    #[serde(default)]
    pub logging_format: Option<String>,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let mut config: Config =
            toml::from_str(&raw).with_context(|| format!("Failed to parse config file {path}"))?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            self.discord_token = Some(token);
        }
        if let Ok(dir) = std::env::var("DOWNLOAD_DIR") {
            self.download_dir = Some(dir.into());
        }
        if let Ok(path) = std::env::var("STATS_DB_PATH") {
            self.stats_db = Some(path.into());
        }
    }

    pub fn token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .context("No bot token: set discord_token in the config file or DISCORD_TOKEN")
    }

    pub fn logging_format(&self) -> &str {
        self.logging_format.as_deref().unwrap_or("json")
    }

    /// Cache root for downloaded media. Created by the media service if absent.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| data_root().join("cache"))
    }

    pub fn stats_db(&self) -> PathBuf {
        self.stats_db
            .clone()
            .unwrap_or_else(|| data_root().join("stats.sqlite3"))
    }
}

fn data_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".vidgrab"))
        .unwrap_or_else(|| std::env::temp_dir().join("vidgrab"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            discord_token = "token-123"
            download_dir = "/data/cache"
            stats_db = "/data/stats.sqlite3"
            logging_format = "pretty"
            "#,
        )
        .unwrap();
        assert_eq!(config.discord_token.as_deref(), Some("token-123"));
        assert_eq!(config.download_dir(), PathBuf::from("/data/cache"));
        assert_eq!(config.stats_db(), PathBuf::from("/data/stats.sqlite3"));
        assert_eq!(config.logging_format(), "pretty");
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.logging_format(), "json");
        assert!(config.download_dir().ends_with("cache"));
        assert!(config.stats_db().ends_with("stats.sqlite3"));
        assert!(config.token().is_err());
    }
}
