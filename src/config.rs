use crate::analyzer::{
    AnalysisSettings, DEFAULT_KMEANS_RESTARTS, DEFAULT_KMEANS_SEED, DEFAULT_MIN_DAYS_WITH_MOOD,
    DEFAULT_MODERATE_THRESHOLD, DEFAULT_STRONG_THRESHOLD,
};
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".MoodMirror";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub report_dir: PathBuf,
    pub db_path: PathBuf,
    pub min_days_with_mood: usize,
    pub moderate_threshold: f64,
    pub strong_threshold: f64,
    pub kmeans_seed: u64,
    pub kmeans_restarts: usize,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            report_dir: default_report_dir(),
            db_path: root.join("db").join("moodmirror.db"),
            min_days_with_mood: DEFAULT_MIN_DAYS_WITH_MOOD,
            moderate_threshold: DEFAULT_MODERATE_THRESHOLD,
            strong_threshold: DEFAULT_STRONG_THRESHOLD,
            kmeans_seed: DEFAULT_KMEANS_SEED,
            kmeans_restarts: DEFAULT_KMEANS_RESTARTS,
            ai_enabled: true,
            ai_api_key: None,
            ai_api_base_url: "https://api.openai.com/v1".to_string(),
            ai_model: "gpt-4o-mini".to_string(),
            ai_timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.display()
            )
        })?;

        Ok(())
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            min_days_with_mood: self.min_days_with_mood,
            moderate_threshold: self.moderate_threshold,
            strong_threshold: self.strong_threshold,
            kmeans_seed: self.kmeans_seed,
            kmeans_restarts: self.kmeans_restarts,
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);
        let previous = self.clone();

        match normalized {
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "min_days_with_mood" => {
                self.min_days_with_mood = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("min_days_with_mood must be a number"))?;
            }
            "moderate_threshold" => {
                self.moderate_threshold = parse_threshold("moderate_threshold", value)?;
            }
            "strong_threshold" => {
                self.strong_threshold = parse_threshold("strong_threshold", value)?;
            }
            "kmeans_seed" => {
                self.kmeans_seed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("kmeans_seed must be a non-negative number"))?;
            }
            "kmeans_restarts" => {
                self.kmeans_restarts = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("kmeans_restarts must be a number"))?;
            }
            "ai_enabled" => {
                self.ai_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("ai_enabled must be true/false"))?;
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(5);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: report_dir|report.dir, db_path|db.path, min_days_with_mood|analysis.min_days, moderate_threshold|analysis.moderate_threshold, strong_threshold|analysis.strong_threshold, kmeans_seed|kmeans.seed, kmeans_restarts|kmeans.restarts, ai_enabled|ai.enabled, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_model|ai.model, ai_timeout_seconds|ai.timeout_seconds"
                );
            }
        }

        if let Err(error) = self.analysis_settings().validate() {
            *self = previous;
            return Err(error.into());
        }

        if normalized == "report_dir" {
            fs::create_dir_all(&self.report_dir).with_context(|| {
                format!(
                    "Failed to create report directory: {}",
                    self.report_dir.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "report_dir" => Some(self.report_dir.display().to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "min_days_with_mood" => Some(self.min_days_with_mood.to_string()),
            "moderate_threshold" => Some(self.moderate_threshold.to_string()),
            "strong_threshold" => Some(self.strong_threshold.to_string()),
            "kmeans_seed" => Some(self.kmeans_seed.to_string()),
            "kmeans_restarts" => Some(self.kmeans_restarts.to_string()),
            "ai_enabled" => Some(self.ai_enabled.to_string()),
            "ai_api_key" => Some(
                self.ai_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "report_dir" | "report.dir" => "report_dir",
        "db_path" | "db.path" => "db_path",
        "min_days_with_mood" | "analysis.min_days" => "min_days_with_mood",
        "moderate_threshold" | "analysis.moderate_threshold" => "moderate_threshold",
        "strong_threshold" | "analysis.strong_threshold" => "strong_threshold",
        "kmeans_seed" | "kmeans.seed" => "kmeans_seed",
        "kmeans_restarts" | "kmeans.restarts" => "kmeans_restarts",
        "ai_enabled" | "ai.enabled" => "ai_enabled",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_model" | "ai.model" => "ai_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        _ => key,
    }
}

fn parse_threshold(name: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| anyhow!("{name} must be a number"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("MoodMirror")
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn dotted_aliases_set_analysis_values() {
        let mut config = Config::default();
        config.set_value("analysis.min_days", "4").expect("min days");
        config.set_value("kmeans.seed", "7").expect("seed");

        assert_eq!(config.analysis_settings().min_days_with_mood, 4);
        assert_eq!(config.get_value("kmeans_seed").as_deref(), Some("7"));
    }

    #[test]
    fn invalid_analysis_values_are_rolled_back() {
        let mut config = Config::default();

        assert!(config.set_value("analysis.min_days", "9").is_err());
        assert!(config.set_value("analysis.strong_threshold", "0.2").is_err());
        assert_eq!(config.min_days_with_mood, 3);
        assert_eq!(config.strong_threshold, 1.0);
    }

    #[test]
    fn api_key_is_masked() {
        let mut config = Config::default();
        assert_eq!(config.get_value("ai.api_key").as_deref(), Some("not_set"));

        config.set_value("ai.api_key", "sk-secret").expect("key");
        assert_eq!(config.get_value("ai.api_key").as_deref(), Some("***set***"));
    }

    #[test]
    fn partial_config_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"min_days_with_mood": 5}"#).expect("partial config");

        assert_eq!(config.min_days_with_mood, 5);
        assert_eq!(config.kmeans_restarts, 10);
        assert!(config.ai_enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut config = Config::default();
        assert!(config.set_value("report.time", "23:30").is_err());
        assert_eq!(config.get_value("report.time"), None);
    }
}
