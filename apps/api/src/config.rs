use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::analysis::engine::EngineConfig;
use crate::llm_client::registry::ProvidersConfig;
use crate::llm_client::{anthropic, gemini, openai, ProviderConfig};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub provider_timeout: Duration,
    pub provider_max_retries: u32,
    pub acceptance_threshold: u32,
    pub question_count: usize,
    pub stage_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_model: env_or("GEMINI_MODEL_NAME", gemini::DEFAULT_MODEL),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL_NAME", openai::DEFAULT_MODEL),
            openai_base_url: optional_env("OPENAI_BASE_URL"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_model: env_or("ANTHROPIC_MODEL_NAME", anthropic::DEFAULT_MODEL),
            provider_timeout: Duration::from_secs(parse_env("PROVIDER_TIMEOUT_SECS", 120)?),
            provider_max_retries: parse_env("PROVIDER_MAX_RETRIES", 3)?,
            acceptance_threshold: parse_env("ACCEPTANCE_THRESHOLD", 75)?,
            question_count: parse_env("QUESTION_COUNT", 5)?,
            stage_timeout: Duration::from_secs(parse_env("STAGE_TIMEOUT_SECS", 180)?),
            temperature: parse_env("TEMPERATURE", 0.7)?,
            max_tokens: parse_env("MAX_TOKENS", 4096)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Range checks that parsing alone cannot express.
    fn validate(&self) -> Result<()> {
        if self.acceptance_threshold > 100 {
            bail!(
                "ACCEPTANCE_THRESHOLD must be between 0 and 100, got {}",
                self.acceptance_threshold
            );
        }
        if self.question_count == 0 {
            bail!("QUESTION_COUNT must be at least 1");
        }
        if self.stage_timeout.is_zero() {
            bail!("STAGE_TIMEOUT_SECS must be at least 1");
        }
        Ok(())
    }

    /// Only backends with an API key are configured.
    pub fn providers(&self) -> ProvidersConfig {
        let provider = |key: &Option<String>, model: &str| {
            key.as_ref().map(|k| {
                ProviderConfig::new(k.clone(), model)
                    .with_timeout(self.provider_timeout)
                    .with_max_retries(self.provider_max_retries)
            })
        };

        ProvidersConfig {
            gemini: provider(&self.gemini_api_key, &self.gemini_model),
            openai: provider(&self.openai_api_key, &self.openai_model).map(|c| {
                match &self.openai_base_url {
                    Some(url) => c.with_base_url(url.clone()),
                    None => c,
                }
            }),
            anthropic: provider(&self.anthropic_api_key, &self.anthropic_model),
            primary_timeout: Some(self.engine().primary_budget()),
        }
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            acceptance_threshold: self.acceptance_threshold,
            question_count: self.question_count,
            stage_timeout: self.stage_timeout,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
