// src/config.rs
//! Runtime settings: built-in defaults, optional TOML file, env overrides
//! (env wins). `.env` loading happens in `main` before this runs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const ENV_CONFIG_PATH: &str = "EXTRACTOR_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/extractor.toml";

const DEFAULT_MODEL: &str = "doubao-1.5-vision-lite";
const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listen address for the HTTP server.
    pub bind_addr: String,
    /// JSON file holding all daily records.
    pub records_path: String,
    /// Directory of static UI files; missing dir just serves 404s.
    pub ui_dir: String,
    /// Cap on in-flight vision calls per batch.
    pub max_concurrency: usize,
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Bearer token for the Ark endpoint. Empty means unconfigured.
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub connect_timeout_secs: u64,
    /// Whole-call timeout; vision replies for dense screenshots are slow.
    pub request_timeout_secs: u64,
    pub max_completion_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            records_path: crate::store::DEFAULT_RECORDS_PATH.to_string(),
            ui_dir: "ui".to_string(),
            max_concurrency: 4,
            vision: VisionConfig::default(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            max_completion_tokens: 8192,
        }
    }
}

impl Settings {
    /// Load settings: defaults, then the TOML file if one exists
    /// ($EXTRACTOR_CONFIG_PATH or `config/extractor.toml`), then env vars.
    pub fn load() -> Result<Self> {
        let mut settings = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(Path::new(&p))?,
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load_from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: Settings = toml::from_str(&data)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Ok(v) = env::var("RECORDS_PATH") {
            self.records_path = v;
        }
        if let Ok(v) = env::var("UI_DIR") {
            self.ui_dir = v;
        }
        if let Ok(v) = env::var("EXTRACT_MAX_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.max_concurrency = n,
                _ => tracing::warn!(
                    value = %v,
                    "EXTRACT_MAX_CONCURRENCY is not a positive integer, keeping {}",
                    self.max_concurrency
                ),
            }
        }
        if let Ok(v) = env::var("DOUBAO_API_KEY") {
            self.vision.api_key = v;
        }
        if let Ok(v) = env::var("DOUBAO_MODEL") {
            self.vision.model = v;
        }
        if let Ok(v) = env::var("DOUBAO_BASE_URL") {
            self.vision.base_url = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_ark() {
        let s = Settings::default();
        assert_eq!(s.vision.model, "doubao-1.5-vision-lite");
        assert_eq!(s.vision.base_url, "https://ark.cn-beijing.volces.com/api/v3");
        assert!(s.vision.api_key.is_empty());
        assert_eq!(s.max_concurrency, 4);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let toml = r#"
            bind_addr = "127.0.0.1:8080"

            [vision]
            model = "doubao-1.5-vision-pro"
        "#;
        let s: Settings = toml::from_str(toml).expect("parse");
        assert_eq!(s.bind_addr, "127.0.0.1:8080");
        assert_eq!(s.vision.model, "doubao-1.5-vision-pro");
        // Untouched fields keep their defaults.
        assert_eq!(s.records_path, "data/daily_records.json");
        assert_eq!(s.vision.request_timeout_secs, 120);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_file_and_defaults() {
        env::set_var("DOUBAO_API_KEY", "k-123");
        env::set_var("DOUBAO_MODEL", "doubao-1.5-vision-pro");
        env::set_var("EXTRACT_MAX_CONCURRENCY", "2");
        env::remove_var(ENV_CONFIG_PATH);

        let s = Settings::load().expect("load");
        assert_eq!(s.vision.api_key, "k-123");
        assert_eq!(s.vision.model, "doubao-1.5-vision-pro");
        assert_eq!(s.max_concurrency, 2);

        env::remove_var("DOUBAO_API_KEY");
        env::remove_var("DOUBAO_MODEL");
        env::remove_var("EXTRACT_MAX_CONCURRENCY");
    }

    #[serial_test::serial]
    #[test]
    fn bad_concurrency_value_keeps_previous() {
        env::set_var("EXTRACT_MAX_CONCURRENCY", "zero");
        let mut s = Settings::default();
        s.apply_env();
        assert_eq!(s.max_concurrency, 4);
        env::remove_var("EXTRACT_MAX_CONCURRENCY");
    }

    #[serial_test::serial]
    #[test]
    fn explicit_config_file_is_honored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("extractor.toml");
        fs::write(&path, "bind_addr = \"127.0.0.1:9999\"\n").expect("write");
        env::set_var(ENV_CONFIG_PATH, path.display().to_string());
        env::remove_var("BIND_ADDR");

        let s = Settings::load().expect("load");
        assert_eq!(s.bind_addr, "127.0.0.1:9999");

        env::remove_var(ENV_CONFIG_PATH);
    }
}
