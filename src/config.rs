use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub sql_model: ModelConfig,

    pub ui_model: ModelConfig,

    pub pipeline: PipelineConfig,

    pub safety: SafetyConfig,

    pub data_models: DataModelsConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    pub log_format: LogFormat,

    /// Controls whether internal error details reach API callers.
    pub environment: Environment,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/promptboard.db".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            environment: Environment::Production,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Upper bound on the work done before a response starts (validation,
    /// SQL generation, query execution). Streaming bodies are not covered.
    pub request_timeout_seconds: u64,

    /// Largest accepted multipart upload, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            request_timeout_seconds: 120,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Connection settings for an OpenAI-compatible chat-completions endpoint.
///
/// `base_url` and `model` are required whenever the section is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Optional schema text placed in the SQL system prompts. When unset the
    /// schema is read from the database at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_description: Option<String>,
}

impl ModelConfig {
    fn sql_default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4.1-nano".to_string(),
            temperature: Some(0.0),
            schema_description: None,
        }
    }

    fn ui_default() -> Self {
        Self {
            base_url: "https://api.thesys.dev/v1/embed".to_string(),
            api_key: None,
            model: "c1-nightly".to_string(),
            temperature: None,
            schema_description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sequential SQL generation attempts before a render fails.
    pub max_retries: u32,

    /// Bound on a single model call (SQL completion or UI stream start).
    pub model_timeout_seconds: u64,

    /// Longest silence tolerated between two UI stream chunks.
    pub stream_idle_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            model_timeout_seconds: 60,
            stream_idle_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub case_sensitive: bool,

    pub min_prompt_length: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            min_prompt_length: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataModelsConfig {
    /// Tables hidden from the data-model endpoints and refused in generated SQL.
    pub protected_tables: Vec<String>,

    pub page_size: u64,
}

impl Default for DataModelsConfig {
    fn default() -> Self {
        Self {
            protected_tables: vec![
                "users".to_string(),
                "widgets".to_string(),
                "seaql_migrations".to_string(),
            ],
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "promptboard".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            sql_model: ModelConfig::sql_default(),
            ui_model: ModelConfig::ui_default(),
            pipeline: PipelineConfig::default(),
            safety: SafetyConfig::default(),
            data_models: DataModelsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies `.env` and
    /// environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Overrides file values with secrets and endpoints from the environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Some(env) = lookup("PROMPTBOARD_ENV") {
            match env.to_ascii_lowercase().as_str() {
                "development" | "dev" => self.general.environment = Environment::Development,
                "production" | "prod" => self.general.environment = Environment::Production,
                other => tracing::warn!(value = other, "Ignoring unknown PROMPTBOARD_ENV"),
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.sql_model.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.sql_model.base_url = url;
        }
        if let Some(key) = lookup("THESYS_API_KEY") {
            self.ui_model.api_key = Some(key);
        }
        if let Some(url) = lookup("THESYS_BASE_URL") {
            self.ui_model.base_url = url;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("promptboard").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".promptboard").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_retries == 0 {
            anyhow::bail!("pipeline.max_retries must be at least 1");
        }

        if self.pipeline.model_timeout_seconds == 0
            || self.pipeline.stream_idle_timeout_seconds == 0
        {
            anyhow::bail!("pipeline timeouts must be greater than zero");
        }

        if self.data_models.page_size == 0 {
            anyhow::bail!("data_models.page_size must be greater than zero");
        }

        for (name, model) in [("sql_model", &self.sql_model), ("ui_model", &self.ui_model)] {
            if model.base_url.trim().is_empty() {
                anyhow::bail!("{name}.base_url cannot be empty");
            }
            url::Url::parse(&model.base_url)
                .with_context(|| format!("{name}.base_url is not a valid URL"))?;
            if model.model.trim().is_empty() {
                anyhow::bail!("{name}.model cannot be empty");
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn is_protected_table(&self, table: &str) -> bool {
        self.data_models
            .protected_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table))
    }
}
