use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub services: ServicesConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Base URLs of the external mock data services the tools call.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub payment_api_url: String,
    pub infrastructure_api_url: String,
    pub document_api_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// End-to-end deadline the orchestrator facade enforces per request.
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    /// Deterministic in-process backend; requires no credentials.
    Offline,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Offline => "offline",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "offline" => Ok(Self::Offline),
            other => Err(ConfigError::Validation(format!(
                "llm.provider must be one of `anthropic`, `openai`, `offline` (got `{other}`)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "logging.format must be one of `compact`, `pretty`, `json` (got `{other}`)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub payment_api_url: Option<String>,
    pub infrastructure_api_url: Option<String>,
    pub document_api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated `${{...}}` interpolation in config file")]
    UnterminatedInterpolation,
    #[error("invalid value for `{var}`: {message}")]
    InvalidEnvValue { var: String, message: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    services: Option<ServicesPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    payment_api_url: Option<String>,
    infrastructure_api_url: Option<String>,
    document_api_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: None,
                model: "claude-3-5-sonnet-20241022".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            services: ServicesConfig {
                payment_api_url: "http://localhost:9000".to_string(),
                infrastructure_api_url: "http://localhost:8000".to_string(),
                document_api_url: "http://localhost:8000".to_string(),
                timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file (if any), then
    /// `DISPATCH_*` environment variables, then programmatic overrides.
    /// Validation runs last so a bad provider or credential fails at startup,
    /// never at first inference.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let resolved_path = resolve_config_path(options.config_path.as_deref());
        match (&resolved_path, options.require_file, options.config_path) {
            (Some(path), _, _) => config.apply_patch(read_patch(path)?)?,
            (None, true, explicit) => {
                return Err(ConfigError::MissingConfigFile(
                    explicit.unwrap_or_else(|| PathBuf::from("dispatch.toml")),
                ));
            }
            (None, false, _) => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider.parse()?;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(SecretString::from(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(services) = patch.services {
            if let Some(payment_api_url) = services.payment_api_url {
                self.services.payment_api_url = payment_api_url;
            }
            if let Some(infrastructure_api_url) = services.infrastructure_api_url {
                self.services.infrastructure_api_url = infrastructure_api_url;
            }
            if let Some(document_api_url) = services.document_api_url {
                self.services.document_api_url = document_api_url;
            }
            if let Some(timeout_secs) = services.timeout_secs {
                self.services.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(request_timeout_secs) = server.request_timeout_secs {
                self.server.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DISPATCH_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("DISPATCH_LLM_API_KEY") {
            self.llm.api_key = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("DISPATCH_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("DISPATCH_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("DISPATCH_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("DISPATCH_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("DISPATCH_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("DISPATCH_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("DISPATCH_PAYMENT_API_URL") {
            self.services.payment_api_url = value;
        }
        if let Some(value) = read_env("DISPATCH_INFRASTRUCTURE_API_URL") {
            self.services.infrastructure_api_url = value;
        }
        if let Some(value) = read_env("DISPATCH_DOCUMENT_API_URL") {
            self.services.document_api_url = value;
        }
        if let Some(value) = read_env("DISPATCH_SERVICES_TIMEOUT_SECS") {
            self.services.timeout_secs = parse_u64("DISPATCH_SERVICES_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DISPATCH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DISPATCH_SERVER_PORT") {
            self.server.port = parse_u16("DISPATCH_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DISPATCH_SERVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs =
                parse_u64("DISPATCH_SERVER_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DISPATCH_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("DISPATCH_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(SecretString::from(api_key));
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(payment_api_url) = overrides.payment_api_url {
            self.services.payment_api_url = payment_api_url;
        }
        if let Some(infrastructure_api_url) = overrides.infrastructure_api_url {
            self.services.infrastructure_api_url = infrastructure_api_url;
        }
        if let Some(document_api_url) = overrides.document_api_url {
            self.services.document_api_url = document_api_url;
        }
        if let Some(request_timeout_secs) = overrides.request_timeout_secs {
            self.server.request_timeout_secs = request_timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_services(&self.services)?;
        validate_server(&self.server)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("dispatch.toml"), PathBuf::from("config/dispatch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.provider.requires_api_key() {
        let missing = llm
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(format!(
                "llm.api_key is required for provider `{}`. Set DISPATCH_LLM_API_KEY or use the `offline` provider.",
                llm.provider
            )));
        }
    }

    Ok(())
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    for (field, url) in [
        ("services.payment_api_url", &services.payment_api_url),
        ("services.infrastructure_api_url", &services.infrastructure_api_url),
        ("services.document_api_url", &services.document_api_url),
    ] {
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "{field} must be an http(s) URL (got `{trimmed}`)"
            )));
        }
    }

    if services.timeout_secs == 0 || services.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "services.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.request_timeout_secs == 0 || server.request_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "server.request_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(var: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|error| ConfigError::InvalidEnvValue {
        var: var.to_string(),
        message: error.to_string(),
    })
}

fn parse_u32(var: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|error| ConfigError::InvalidEnvValue {
        var: var.to_string(),
        message: error.to_string(),
    })
}

fn parse_u16(var: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|error| ConfigError::InvalidEnvValue {
        var: var.to_string(),
        message: error.to_string(),
    })
}
