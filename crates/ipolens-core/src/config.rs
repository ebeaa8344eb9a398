use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseConfig {
    /// SQLite database path. ":memory:" keeps everything in RAM.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/ipolens.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens.
    pub jwt_secret: String,
    /// Token lifetime in hours.
    #[serde(default = "AuthConfig::default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Analyses a non-premium account may run before the paywall.
    #[serde(default = "AuthConfig::default_free_analysis_limit")]
    pub free_analysis_limit: u32,
}

impl AuthConfig {
    fn default_token_ttl_hours() -> i64 {
        24
    }

    fn default_free_analysis_limit() -> u32 {
        3
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "ipo-lens-secret-key".into(),
            token_ttl_hours: Self::default_token_ttl_hours(),
            free_analysis_limit: Self::default_free_analysis_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeminiConfig {
    /// API key. Usually supplied via GEMINI_API_KEY rather than a file.
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Enable Google Search grounding for report synthesis.
    #[serde(default = "GeminiConfig::default_grounding")]
    pub grounding: bool,
}

impl GeminiConfig {
    fn default_grounding() -> bool {
        true
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-pro".into(),
            timeout_secs: 120,
            max_retries: 3,
            grounding: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gemini: GeminiConfig,
}

impl Settings {
    pub fn default_env() -> String {
        env::var("IPOLENS_ENV").unwrap_or_else(|_| "development".into())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.server.host.trim().is_empty(),
            "server.host cannot be empty"
        );
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(
            !self.database.path.trim().is_empty(),
            "database.path cannot be empty"
        );
        anyhow::ensure!(
            !self.auth.jwt_secret.trim().is_empty(),
            "auth.jwt_secret cannot be empty"
        );
        anyhow::ensure!(
            self.auth.token_ttl_hours > 0,
            "auth.token_ttl_hours must be > 0"
        );
        anyhow::ensure!(
            !self.gemini.model.trim().is_empty(),
            "gemini.model cannot be empty"
        );
        Ok(())
    }
}

/// Loads layered settings: built-in defaults, then `default.toml` and
/// `{env}.toml` from the config directory, then `IPOLENS__*` environment
/// overrides, then `GEMINI_API_KEY`.
#[derive(Debug)]
pub struct ConfigManager {
    settings: Settings,
    env: String,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_env(None)
    }

    pub fn with_env(env_override: Option<String>) -> Result<Self> {
        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let config_dir = Self::default_config_dir();
        let settings = Self::load_from_sources(&config_dir, &env_name)?;
        settings.validate()?;
        Ok(Self {
            settings,
            env: env_name,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Priority order: ~/.ipolens/ if it exists, then ./config/, then cwd.
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".ipolens");
            if user_dir.exists() {
                info!("Using config directory: {:?}", user_dir);
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("Using config directory: {:?}", project_config);
            return project_config;
        }

        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let builder = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(cfg::Environment::with_prefix("IPOLENS").separator("__"));

        let mut settings: Settings = builder
            .build()
            .context("failed to assemble configuration sources")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        // The key is conventionally set through the vendor's own variable.
        if settings.gemini.api_key.is_empty() {
            if let Ok(key) = env::var("GEMINI_API_KEY") {
                settings.gemini.api_key = key;
            }
        }

        Ok(settings)
    }
}
