// Configuration - layered with figment
//
// Precedence (highest wins):
// 1. LEARNTRACK_* environment variables (`__` separates sections)
// 2. explicit --config file, or ./learntrack.toml
// 3. ~/.config/learntrack/config.toml
// 4. built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "LEARNTRACK_";
pub const LOCAL_CONFIG_FILE: &str = "learntrack.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),
}

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file holding all six tables
    pub path: PathBuf,

    /// Enable WAL journal mode on open
    pub wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("learntrack.db"),
            wal: true,
        }
    }
}

/// Limits and thresholds for the leaderboard style reports.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportConfig {
    pub top_limit: u32,
    /// Minimum graded courses before a student can rank as a top performer
    pub top_min_courses: u32,
    pub low_score_threshold: f64,
    pub low_attendance_threshold: f64,
    pub attendance_summary_limit: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            top_limit: 10,
            top_min_courses: 3,
            low_score_threshold: 60.0,
            low_attendance_threshold: 75.0,
            attendance_summary_limit: 20,
        }
    }
}

/// Report server (feature `server`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reports: ReportConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from every source. An explicit file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
        }

        let config: AppConfig = Self::figment(explicit).extract()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Provider chain, public so tests can extract from it directly.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                figment = figment.merge(Toml::file(global));
            }
        }

        match explicit {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                let local = PathBuf::from(LOCAL_CONFIG_FILE);
                if local.exists() {
                    figment = figment.merge(Toml::file(local));
                }
            }
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("learntrack").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, PathBuf::from("learntrack.db"));
        assert!(config.database.wal);
        assert_eq!(config.reports.top_limit, 10);
        assert_eq!(config.reports.top_min_courses, 3);
        assert_eq!(config.reports.low_score_threshold, 60.0);
        assert_eq!(config.reports.low_attendance_threshold, 75.0);
        assert_eq!(config.reports.attendance_summary_limit, 20);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_local_file_then_env_override() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().display().to_string();
            jail.set_env("XDG_CONFIG_HOME", dir);
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"
                [database]
                path = "school.db"

                [reports]
                top_limit = 3
                low_score_threshold = 50.0
                "#,
            )?;
            jail.set_env("LEARNTRACK_REPORTS__TOP_LIMIT", "7");

            let config: AppConfig = AppConfig::figment(None).extract()?;

            assert_eq!(config.database.path, PathBuf::from("school.db"));
            assert!(config.database.wal);
            assert_eq!(config.reports.top_limit, 7);
            assert_eq!(config.reports.low_score_threshold, 50.0);
            assert_eq!(config.reports.attendance_summary_limit, 20);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_wins_over_local() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().display().to_string();
            jail.set_env("XDG_CONFIG_HOME", dir);
            jail.create_file(LOCAL_CONFIG_FILE, "[reports]\ntop_limit = 3\n")?;
            jail.create_file("other.toml", "[reports]\ntop_limit = 12\n")?;

            let config: AppConfig = AppConfig::figment(Some(Path::new("other.toml"))).extract()?;
            assert_eq!(config.reports.top_limit, 12);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }
}
