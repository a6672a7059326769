use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::services::canvas::DRAG_THRESHOLD;
use crate::services::layout::LayoutConfig;
use crate::services::notifications::{MAX_VISIBLE, NOTIFICATION_TIMEOUT};

pub const ENV_API_URL: &str = "TASKMAP_API_URL";
pub const ENV_API_TOKEN: &str = "TASKMAP_API_TOKEN";
pub const ENV_DB_PATH: &str = "TASKMAP_DB";
pub const ENV_PROJECT: &str = "TASKMAP_PROJECT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Project opened on startup
    pub project_id: String,

    /// Pointer travel, in pixels, before a press on a node becomes a drag
    pub drag_threshold: f64,

    pub layout: LayoutConfig,

    pub notifications: NotificationConfig,

    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub timeout_ms: u64,
    pub max_visible: usize,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: NOTIFICATION_TIMEOUT.as_millis() as u64,
            max_visible: MAX_VISIBLE,
        }
    }
}

/// Where tasks and dependencies are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Sqlite { path: String },
    Http { base_url: String, token: Option<String> },
}

impl BackendConfig {
    /// Database path or base URL. Never includes the token.
    pub fn location(&self) -> &str {
        match self {
            BackendConfig::Sqlite { path } => path,
            BackendConfig::Http { base_url, .. } => base_url,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskmap")
            .join("taskmap.db");
        BackendConfig::Sqlite {
            path: path.to_string_lossy().into_owned(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            project_id: "default".to_string(),
            drag_threshold: DRAG_THRESHOLD,
            layout: LayoutConfig::default(),
            notifications: NotificationConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Load configuration from the user's config directory, writing the
    /// defaults on first run, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            default_config
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded editor configuration");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Values from `lookup` win over the file. An API URL switches the
    /// backend to HTTP; a database path switches it to SQLite.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(project_id) = lookup(ENV_PROJECT) {
            self.project_id = project_id;
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.backend = BackendConfig::Sqlite { path };
        }
        if let Some(base_url) = lookup(ENV_API_URL) {
            let token = match &self.backend {
                BackendConfig::Http { token, .. } => token.clone(),
                BackendConfig::Sqlite { .. } => None,
            };
            self.backend = BackendConfig::Http { base_url, token };
        }
        if let Some(new_token) = lookup(ENV_API_TOKEN)
            && let BackendConfig::Http { token, .. } = &mut self.backend
        {
            *token = Some(new_token);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("taskmap").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::layout::LayoutDirection;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.notifications.timeout(), Duration::from_millis(5000));
        assert_eq!(config.notifications.max_visible, 5);
        assert!(matches!(config.backend, BackendConfig::Sqlite { .. }));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskmap").join("config.toml");

        let mut config = EditorConfig::default();
        config.layout.direction = LayoutDirection::TopToBottom;
        config.backend = BackendConfig::Http {
            base_url: "https://tasks.example.com/api".into(),
            token: Some("secret".into()),
        };
        config.save_to(&path).unwrap();

        assert_eq!(EditorConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "project_id = \"launch\"\n\n[notifications]\ntimeout_ms = 2000\n",
        )
        .unwrap();

        let config = EditorConfig::load_from(&path).unwrap();
        assert_eq!(config.project_id, "launch");
        assert_eq!(config.notifications.timeout_ms, 2000);
        assert_eq!(config.notifications.max_visible, MAX_VISIBLE);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://localhost:3000"),
            (ENV_API_TOKEN, "t0k3n"),
            (ENV_PROJECT, "p-42"),
        ]);

        let mut config = EditorConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.project_id, "p-42");
        assert_eq!(
            config.backend,
            BackendConfig::Http {
                base_url: "http://localhost:3000".into(),
                token: Some("t0k3n".into()),
            }
        );
        assert_eq!(config.backend.location(), "http://localhost:3000");
    }

    #[test]
    fn test_token_without_url_is_ignored_for_sqlite() {
        let mut config = EditorConfig::default();
        config.apply_overrides(|key| (key == ENV_API_TOKEN).then(|| "t".to_string()));
        assert!(matches!(config.backend, BackendConfig::Sqlite { .. }));
    }
}
