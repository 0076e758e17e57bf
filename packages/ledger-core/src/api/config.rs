use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ledger API URL (local development server)
const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Default HTTP timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable name for API URL override
pub const ENV_API_URL: &str = "LEDGER_API_URL";

/// Environment variable name for the preferences file override
pub const ENV_DATA_FILE: &str = "LEDGER_DATA_FILE";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    api: Option<ApiSection>,
    auth: Option<AuthSection>,
    storage: Option<StorageSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiSection {
    /// API base URL (e.g., "https://ledger.example.com/api")
    base_url: Option<String>,
    /// Request timeout in seconds
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AuthSection {
    /// Path fragments that never receive a bearer token
    exempt_paths: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageSection {
    /// Preferences file location
    path: Option<PathBuf>,
}

/// Runtime API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL for API calls, without trailing slash
    pub base_url: String,
    pub timeout: Duration,
    /// Path fragments exempt from bearer injection
    pub exempt_paths: Vec<String>,
    /// Preferences file override (`None` for the platform default)
    pub data_file: Option<PathBuf>,
    /// Source of the base URL (for logging)
    pub source: ConfigSource,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            exempt_paths: vec!["login".to_string()],
            data_file: None,
            source: ConfigSource::Default,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
pub fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("ledger").join("config.toml"))
}

/// Load configuration from the config file
fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}

/// Load API configuration from the process environment and the default
/// config file.
pub fn load_api_config() -> ApiConfig {
    load_api_config_with(
        |name| std::env::var(name).ok(),
        get_config_file_path().as_deref(),
    )
}

/// Load API configuration with priority:
/// 1. Environment variables (`LEDGER_API_URL`, `LEDGER_DATA_FILE`)
/// 2. Config file
/// 3. Default values
pub fn load_api_config_with<E>(env: E, config_path: Option<&Path>) -> ApiConfig
where
    E: Fn(&str) -> Option<String>,
{
    let mut config = ApiConfig::default();
    let file = config_path.and_then(load_config_file).unwrap_or_default();

    if let Some(api) = file.api {
        if let Some(url) = api.base_url.as_deref().and_then(normalize_url) {
            tracing::info!("Using API URL from config file: {}", url);
            config.base_url = url;
            config.source = ConfigSource::ConfigFile;
        }
        if let Some(secs) = api.timeout_secs.filter(|s| *s > 0) {
            config.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(patterns) = file.auth.and_then(|a| a.exempt_paths) {
        config.exempt_paths = patterns;
    }

    config.data_file = file.storage.and_then(|s| s.path);

    if let Some(url) = env(ENV_API_URL).as_deref().and_then(normalize_url) {
        tracing::info!("Using API URL from environment variable: {}", url);
        config.base_url = url;
        config.source = ConfigSource::Environment;
    }

    if let Some(path) = env(ENV_DATA_FILE).filter(|p| !p.trim().is_empty()) {
        config.data_file = Some(PathBuf::from(path.trim()));
    }

    if config.source == ConfigSource::Default {
        tracing::debug!("Using default API URL: {}", config.base_url);
    }

    config
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/ledger/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Ledger Client Configuration
# Place this file at: ~/.config/ledger/config.toml

[api]
# Base URL of the ledger API
# Default: http://localhost:8000/api
# base_url = "https://ledger.example.com/api"
# timeout_secs = 30

[auth]
# Requests whose path contains one of these never carry a bearer token
# exempt_paths = ["login"]

[storage]
# Where session credentials and category lists are kept
# path = "/var/lib/ledger/preferences.json"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn write_config(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), content).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let config = load_api_config_with(env_from(&[]), None);
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.source, ConfigSource::Default);
        assert_eq!(config.exempt_paths, vec!["login".to_string()]);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.data_file.is_none());
    }

    #[test]
    fn test_config_file() {
        let dir = write_config(
            r#"
[api]
base_url = "https://ledger.example.com/api/"
timeout_secs = 5

[auth]
exempt_paths = ["login", "register"]

[storage]
path = "/tmp/ledger-prefs.json"
"#,
        );
        let config = load_api_config_with(env_from(&[]), Some(dir.path().join("config.toml").as_path()));

        assert_eq!(config.base_url, "https://ledger.example.com/api");
        assert_eq!(config.source, ConfigSource::ConfigFile);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.exempt_paths, vec!["login", "register"]);
        assert_eq!(config.data_file, Some(PathBuf::from("/tmp/ledger-prefs.json")));
    }

    #[test]
    fn test_environment_wins_over_file() {
        let dir = write_config("[api]\nbase_url = \"https://file.example.com/api\"\n");
        let config = load_api_config_with(
            env_from(&[
                (ENV_API_URL, "  https://env.example.com/api// "),
                (ENV_DATA_FILE, "/srv/prefs.json"),
            ]),
            Some(dir.path().join("config.toml").as_path()),
        );

        assert_eq!(config.base_url, "https://env.example.com/api");
        assert_eq!(config.source, ConfigSource::Environment);
        assert_eq!(config.data_file, Some(PathBuf::from("/srv/prefs.json")));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let dir = write_config("[api]\nbase_url = \"   \"\n");
        let config = load_api_config_with(
            env_from(&[(ENV_API_URL, "")]),
            Some(dir.path().join("config.toml").as_path()),
        );
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.source, ConfigSource::Default);
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = write_config("[api\nbase_url = ");
        let config = load_api_config_with(env_from(&[]), Some(dir.path().join("config.toml").as_path()));
        assert_eq!(config.source, ConfigSource::Default);
    }

    #[test]
    fn test_example_config_parses() {
        let parsed: Result<ConfigFile, _> = toml::from_str(&generate_example_config());
        assert!(parsed.is_ok());
    }
}
