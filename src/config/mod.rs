use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Journey";
const APP_NAME: &str = "journey";

pub const CONFIG_ENV: &str = "JOURNEY_CONFIG";
pub const DATA_ENV: &str = "JOURNEY_DATA";
pub const TOKEN_ENV: &str = "JOURNEY_TOKEN";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            self.write_default_config(&default_cfg)?;
            default_cfg.post_load();
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub cache_db_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let cache_db_path = data_root.join("cache.db");

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            cache_db_path,
            log_dir,
            state_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("journey.log")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub auto_save: AutoSaveConfig,
    pub cache: CacheOptions,
    pub editor: EditorOptions,
}

impl AppConfig {
    fn post_load(&mut self) {
        if let Ok(token) = env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.api.token = Some(token.trim().to_string());
            }
        }
        if self.auto_save.interval_ms == 0 {
            tracing::warn!("autosave interval of 0ms is not allowed, using default");
            self.auto_save.interval_ms = AutoSaveConfig::default().interval_ms;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server root; `/api` is appended when missing.
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            timeout_secs: 15,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Delay before restored rich-text content is injected into the editor
    pub restore_delay_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 500,
            restore_delay_ms: 100,
        }
    }
}

impl AutoSaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn restore_delay(&self) -> Duration {
        Duration::from_millis(self.restore_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Byte budget for all cached snapshots (0 = unlimited)
    pub quota_bytes: u64,
    pub wal_autocheckpoint: u32,
    pub busy_timeout_ms: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            quota_bytes: 5 * 1024 * 1024,
            wal_autocheckpoint: 1000,
            busy_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub tick_rate_ms: u64,
    pub toast_ms: u64,
    pub default_notebook: Option<i64>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            tick_rate_ms: 100,
            toast_ms: 3000,
            default_notebook: None,
        }
    }
}

impl EditorOptions {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(10))
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        let state_dir = base.join("state");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            cache_db_path: data_dir.join("cache.db"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    #[test]
    fn load_or_init_writes_defaults_on_first_run() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::from_paths(temp_paths(&temp));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.auto_save.interval_ms, 500);
        assert_eq!(cfg.auto_save.restore_delay_ms, 100);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.api.base_url, cfg.api.base_url);
        Ok(())
    }

    #[test]
    fn partial_config_falls_back_to_section_defaults() -> Result<()> {
        let cfg: AppConfig = toml::from_str(
            r#"
            [auto_save]
            interval_ms = 250

            [editor]
            default_notebook = 7
            "#,
        )?;
        assert_eq!(cfg.auto_save.interval_ms, 250);
        assert!(cfg.auto_save.enabled);
        assert_eq!(cfg.editor.default_notebook, Some(7));
        assert_eq!(cfg.cache.quota_bytes, 5 * 1024 * 1024);
        Ok(())
    }
}
