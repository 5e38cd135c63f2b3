//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/fslinks/config.toml)
//! 3. Environment variables (FSLINKS_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "FSLINKS";

/// Default lock wait for writers
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the link database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How long a writer waits for the database lock before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Tags applied to every newly added link (comma-separated)
    #[serde(default)]
    pub default_tags: String,

    /// Tag new links by file kind and extension
    #[serde(default = "default_auto_tag")]
    pub auto_tag: bool,

    /// Log file path (logs go to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            default_tags: String::new(),
            auto_tag: true,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (FSLINKS_DATA_DIR, FSLINKS_BUSY_TIMEOUT_MS, ...)
    /// 2. Config file (~/.config/fslinks/config.toml or FSLINKS_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::read_from_path(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read only what the file holds, without environment overrides
    ///
    /// Use this before `save_to_path` so `FSLINKS_*` values are not
    /// written back into the file.
    pub fn read_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_BUSY_TIMEOUT_MS", ENV_PREFIX)) {
            match val.parse() {
                Ok(ms) => self.busy_timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid {}_BUSY_TIMEOUT_MS: {}", ENV_PREFIX, val),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DEFAULT_TAGS", ENV_PREFIX)) {
            self.default_tags = val;
        }

        if let Ok(val) = std::env::var(format!("{}_AUTO_TAG", ENV_PREFIX)) {
            self.auto_tag = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with FSLINKS_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fslinks")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("links.db")
    }

    /// Writer lock wait as a `Duration`
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fslinks")
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_auto_tag() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "FSLINKS_DATA_DIR",
        "FSLINKS_BUSY_TIMEOUT_MS",
        "FSLINKS_DEFAULT_TAGS",
        "FSLINKS_AUTO_TAG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.auto_tag);
        assert!(config.default_tags.is_empty());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.data_dir.ends_with("fslinks"));
        assert!(config.database_path().ends_with("links.db"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("FSLINKS_DATA_DIR", "/tmp/fslinks-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/fslinks-test"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/fslinks-test/links.db")
        );
    }

    #[test]
    fn test_env_override_busy_timeout() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("FSLINKS_BUSY_TIMEOUT_MS", "250");
        config.apply_env_overrides();
        assert_eq!(config.busy_timeout_ms, 250);

        // Invalid values are ignored
        env::set_var("FSLINKS_BUSY_TIMEOUT_MS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_env_override_tags() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("FSLINKS_DEFAULT_TAGS", "inbox, todo");
        env::set_var("FSLINKS_AUTO_TAG", "0");
        config.apply_env_overrides();

        assert_eq!(config.default_tags, "inbox, todo");
        assert!(!config.auto_tag);

        env::set_var("FSLINKS_AUTO_TAG", "TRUE");
        config.apply_env_overrides();
        assert!(config.auto_tag);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            busy_timeout_ms = 1000
            default_tags = "work"
            auto_tag = false
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.busy_timeout_ms, 1000);
        assert_eq!(config.default_tags, "work");
        assert!(!config.auto_tag);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_load_from_str_uses_defaults_for_missing_keys() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str("").unwrap();
        assert!(config.auto_tag);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.auto_tag);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_read_from_path_ignores_env() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "busy_timeout_ms = 900\n").unwrap();

        env::set_var("FSLINKS_DEFAULT_TAGS", "from-env");
        env::set_var("FSLINKS_BUSY_TIMEOUT_MS", "10");

        let file_only = Config::read_from_path(&path).unwrap();
        assert!(file_only.default_tags.is_empty());
        assert_eq!(file_only.busy_timeout_ms, 900);

        let effective = Config::load_from_path(&path).unwrap();
        assert_eq!(effective.default_tags, "from-env");
        assert_eq!(effective.busy_timeout_ms, 10);
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: PathBuf::from("/data/fslinks"),
            busy_timeout_ms: 750,
            default_tags: "inbox".to_string(),
            auto_tag: false,
            log_file: Some(PathBuf::from("/tmp/fslinks.log")),
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.busy_timeout_ms, 750);
        assert_eq!(loaded.default_tags, "inbox");
        assert!(!loaded.auto_tag);
        assert_eq!(loaded.log_file, config.log_file);
    }
}
