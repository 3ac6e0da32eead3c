use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const CONFIG_DIR: &str = ".storefront";

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Backend addresses and request settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Defaults to `<base_url>/admin`
    #[serde(default)]
    pub admin_base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ApiConfig {
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn admin_base_url(&self) -> String {
        match &self.admin_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}/admin", self.base_url()),
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

/// Where the persisted session lives
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| user_dir().join("session"))
    }
}

/// Per-run JSONL transcripts
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TranscriptConfig {
    /// Defaults to on
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl TranscriptConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| user_dir().join("transcripts"))
    }
}

/// `~/.storefront`, or `./.storefront` when there is no home directory
fn user_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.storefront/config.local.toml) > project (.storefront/config.toml)
    /// > user (~/.storefront/config.toml) > built-in defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(CONFIG_DIR).join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Should be gitignored
        let local_config = Path::new(CONFIG_DIR).join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority where set)
    pub fn merge(&mut self, other: Config) {
        if other.api.base_url.is_some() {
            self.api.base_url = other.api.base_url;
        }
        if other.api.admin_base_url.is_some() {
            self.api.admin_base_url = other.api.admin_base_url;
        }
        if other.api.timeout_ms.is_some() {
            self.api.timeout_ms = other.api.timeout_ms;
        }
        if other.session.dir.is_some() {
            self.session.dir = other.session.dir;
        }
        if other.transcript.dir.is_some() {
            self.transcript.dir = other.transcript.dir;
        }
        if other.transcript.enabled.is_some() {
            self.transcript.enabled = other.transcript.enabled;
        }
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, url) in [
            ("api.base_url", self.api.base_url()),
            ("api.admin_base_url", self.api.admin_base_url()),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("Expected an http(s) URL, got '{}'", url),
                });
            }
        }

        if self.api.timeout_ms() == 0 {
            errors.push(ValidationError {
                field: "api.timeout_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url(), "http://localhost:8000/api");
        assert_eq!(config.api.admin_base_url(), "http://localhost:8000/api/admin");
        assert_eq!(config.api.timeout_ms(), 30_000);
        assert!(config.transcript.enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_admin_root_follows_base_url() {
        let mut config = Config::default();
        config.api.base_url = Some("https://shop.example.com/api/".to_string());
        assert_eq!(
            config.api.admin_base_url(),
            "https://shop.example.com/api/admin"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://shop.example.com/api"
timeout_ms = 5000

[transcript]
enabled = false
"#,
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api.base_url(), "https://shop.example.com/api");
        assert_eq!(config.api.timeout_ms(), 5000);
        assert!(!config.transcript.enabled());
    }

    #[test]
    fn test_merge_prefers_set_values() {
        let mut base = Config::default();
        base.api.base_url = Some("http://a/api".to_string());
        base.api.timeout_ms = Some(1000);

        let mut other = Config::default();
        other.api.admin_base_url = Some("http://b/admin".to_string());
        other.session.dir = Some(PathBuf::from("/tmp/s"));
        base.merge(other);

        assert_eq!(base.api.base_url(), "http://a/api");
        assert_eq!(base.api.admin_base_url(), "http://b/admin");
        assert_eq!(base.api.timeout_ms(), 1000);
        assert_eq!(base.session.dir(), PathBuf::from("/tmp/s"));
    }

    #[test]
    fn test_higher_layer_can_reenable_transcripts() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&user, "[transcript]\nenabled = false\n").unwrap();
        std::fs::write(&local, "[transcript]\nenabled = true\n").unwrap();

        let mut config = Config::default();
        config.merge(Config::load_from(&user).unwrap());
        assert!(!config.transcript.enabled());
        config.merge(Config::load_from(&local).unwrap());
        assert!(config.transcript.enabled());
    }

    #[test]
    fn test_unset_layer_keeps_transcript_setting() {
        let mut config = Config::default();
        config.transcript.enabled = Some(false);
        config.merge(Config::default());
        assert!(!config.transcript.enabled());
    }

    #[test]
    fn test_validate_bad_url_and_timeout() {
        let mut config = Config::default();
        config.api.base_url = Some("localhost:8000/api".to_string());
        config.api.timeout_ms = Some(0);
        let errors = config.validate().unwrap_err();
        // admin root is derived from the bad base URL
        assert_eq!(errors.len(), 3);
        assert!(errors[0].field.contains("base_url"));
        assert!(errors[2].message.contains("greater than 0"));
    }
}
