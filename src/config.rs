use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::ai_providers::AiProviderType;
use crate::ai_service::DEFAULT_MAX_ATTEMPTS;
use crate::prompts::LanguagePair;
use crate::retry::RetryPolicy;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub learning: LearningConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Generative-AI provider and invocation settings
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub provider: AiProviderType,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Total calls per invocation, first attempt included
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

/// Which language is studied and which one explanations are written in
#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    pub target_language: String,
    pub native_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            ai: AiConfig::from_env()?,
            learning: LearningConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data).
    /// Call once a subscriber is installed.
    pub fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            ai_provider = ?self.ai.provider,
            ai_model = ?self.ai.model,
            ai_api_key_masked = %mask_sensitive_data(&self.ai.api_key),
            ai_max_attempts = self.ai.max_attempts,
            languages = %format!("{} -> {}", self.learning.target_language, self.learning.native_language),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    pub fn validate(&self) -> Result<()> {
        if let Err(e) = self.check_required() {
            log_validation!(failure, "configuration", error = e);
            return Err(e);
        }

        if self.ai.api_key.is_empty() || self.ai.api_key == "your-api-key" {
            warn!("AI API key appears to be placeholder or empty - AI features may not work");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }

    fn check_required(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.ai.max_attempts == 0 {
            return Err(anyhow!("AI_MAX_ATTEMPTS must be at least 1"));
        }

        if self.learning.target_language.trim().is_empty()
            || self.learning.native_language.trim().is_empty()
        {
            return Err(anyhow!("TARGET_LANGUAGE and NATIVE_LANGUAGE must not be empty"));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:language_tutor.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("AI_API_KEY").unwrap_or_else(|_| "your-api-key".to_string());
        let base_url = env::var("AI_BASE_URL").ok();
        let model = env::var("AI_MODEL").ok();

        let provider_str = env::var("AI_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = AiProviderType::parse(&provider_str).unwrap_or_else(|| {
            info!("Unknown AI provider '{}', defaulting to Gemini", provider_str);
            AiProviderType::Gemini
        });

        let max_attempts = parse_env("AI_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let backoff_base_ms = parse_env("AI_BACKOFF_BASE_MS", 1000u64)?;

        Ok(AiConfig {
            provider,
            api_key,
            base_url,
            model,
            max_attempts,
            backoff_base_ms,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.backoff_base_ms))
    }
}

impl LearningConfig {
    fn from_env() -> Result<Self> {
        let defaults = LanguagePair::default();
        let target_language = env::var("TARGET_LANGUAGE").unwrap_or(defaults.target);
        let native_language = env::var("NATIVE_LANGUAGE").unwrap_or(defaults.native);

        Ok(LearningConfig {
            target_language,
            native_language,
        })
    }

    pub fn language_pair(&self) -> LanguagePair {
        LanguagePair {
            target: self.target_language.clone(),
            native: self.native_language.clone(),
        }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,language_tutor=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
            },
            ai: AiConfig {
                provider: AiProviderType::Gemini,
                api_key: "AIza-valid-key".to_string(),
                base_url: None,
                model: None,
                max_attempts: 3,
                backoff_base_ms: 1000,
            },
            learning: LearningConfig {
                target_language: "Spanish".to_string(),
                native_language: "English".to_string(),
            },
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        }
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:language_tutor.db"), "sqli***r.db");
        assert_eq!(mask_sensitive_data("sk-1234567890abcdef"), "sk-1***cdef");
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        let mut invalid_port = config.clone();
        invalid_port.server.port = 0;
        assert!(invalid_port.validate().is_err());

        let mut no_attempts = config.clone();
        no_attempts.ai.max_attempts = 0;
        assert!(no_attempts.validate().is_err());

        let mut postgres = config.clone();
        postgres.database.url = "postgres://localhost/tutor".to_string();
        assert!(postgres.validate().is_err());

        let mut no_language = config;
        no_language.learning.native_language = " ".to_string();
        assert!(no_language.validate().is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_configuration_summary_masks_secrets() {
        let mut config = valid_config();
        config.ai.api_key = "AIzaSECRET-KEY-123".to_string();

        let output = capture_logs(|| config.log_configuration_summary());

        assert!(output.contains("Configuration summary"));
        assert!(output.contains("AIza***-123"));
        assert!(!output.contains("AIzaSECRET-KEY-123"));
    }

    #[test]
    fn test_validation_failure_is_logged() {
        let mut config = valid_config();
        config.ai.max_attempts = 0;

        let mut result = Ok(());
        let output = capture_logs(|| result = config.validate());

        assert!(result.is_err());
        assert!(output.contains("Validation failed"));
        assert!(output.contains("AI_MAX_ATTEMPTS must be at least 1"));

        let output = capture_logs(|| valid_config().validate().unwrap());
        assert!(output.contains("Validation completed"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = valid_config();
        config.ai.backoff_base_ms = 250;

        let policy = config.ai.retry_policy();
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(250));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_language_pair_from_config() {
        let pair = valid_config().learning.language_pair();
        assert_eq!(pair, LanguagePair::default());
    }
}
