use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Effective application configuration.
///
/// Load precedence: defaults, then `stayfinder.toml` (or
/// `config/stayfinder.toml`), then environment variables, then programmatic
/// overrides, then validation. The hosted-service variables keep their
/// conventional unprefixed names (`PROJECT_ENDPOINT`, `MODEL_DEPLOYMENT_NAME`,
/// `MSI_ENDPOINT`); everything ambient uses the `STAYFINDER_` prefix.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub project: ProjectConfig,
    pub credential: CredentialConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ProjectConfig {
    /// Remote service endpoint, e.g. `https://<project>.services.ai.azure.com`.
    pub endpoint: String,
    pub model_deployment: String,
    pub api_version: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CredentialConfig {
    pub strategy: CredentialStrategy,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStrategy {
    /// Chained developer credential sources (environment, CLI session).
    DefaultChain,
    /// Platform-managed identity, selected automatically when `MSI_ENDPOINT`
    /// is present in the environment.
    ManagedIdentity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub model_deployment: Option<String>,
    pub credential_strategy: Option<CredentialStrategy>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
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
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                endpoint: String::new(),
                model_deployment: "gpt-4.1-mini".to_string(),
                api_version: "2025-04-01-preview".to_string(),
                request_timeout_secs: 60,
            },
            credential: CredentialConfig { strategy: CredentialStrategy::DefaultChain },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8088,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for CredentialStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" | "default_chain" => Ok(Self::DefaultChain),
            "managed_identity" | "msi" => Ok(Self::ManagedIdentity),
            other => Err(ConfigError::Validation(format!(
                "unsupported credential strategy `{other}` (expected default|managed_identity)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        let mut strategy_from_file = false;
        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            strategy_from_file =
                patch.credential.as_ref().is_some_and(|credential| credential.strategy.is_some());
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("stayfinder.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        let strategy_from_env = config.apply_env_overrides()?;

        // MSI_ENDPOINT presence toggles managed identity unless the strategy
        // was pinned by file, env, or overrides.
        if !strategy_from_file && !strategy_from_env && read_env("MSI_ENDPOINT").is_some() {
            config.credential.strategy = CredentialStrategy::ManagedIdentity;
        }

        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(project) = patch.project {
            if let Some(endpoint) = project.endpoint {
                self.project.endpoint = endpoint;
            }
            if let Some(model_deployment) = project.model_deployment {
                self.project.model_deployment = model_deployment;
            }
            if let Some(api_version) = project.api_version {
                self.project.api_version = api_version;
            }
            if let Some(request_timeout_secs) = project.request_timeout_secs {
                self.project.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(credential) = patch.credential {
            if let Some(strategy) = credential.strategy {
                self.credential.strategy = strategy;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
    }

    /// Returns whether the credential strategy was set explicitly via env.
    fn apply_env_overrides(&mut self) -> Result<bool, ConfigError> {
        if let Some(value) = read_env("PROJECT_ENDPOINT") {
            self.project.endpoint = value;
        }
        if let Some(value) = read_env("MODEL_DEPLOYMENT_NAME") {
            self.project.model_deployment = value;
        }
        if let Some(value) = read_env("STAYFINDER_PROJECT_API_VERSION") {
            self.project.api_version = value;
        }
        if let Some(value) = read_env("STAYFINDER_REQUEST_TIMEOUT_SECS") {
            self.project.request_timeout_secs =
                parse_u64("STAYFINDER_REQUEST_TIMEOUT_SECS", &value)?;
        }

        let mut strategy_from_env = false;
        if let Some(value) = read_env("STAYFINDER_CREDENTIAL_STRATEGY") {
            self.credential.strategy = value.parse()?;
            strategy_from_env = true;
        }

        if let Some(value) = read_env("STAYFINDER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STAYFINDER_SERVER_PORT") {
            self.server.port = parse_u16("STAYFINDER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("STAYFINDER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STAYFINDER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("STAYFINDER_LOGGING_LEVEL").or_else(|| read_env("STAYFINDER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STAYFINDER_LOGGING_FORMAT").or_else(|| read_env("STAYFINDER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(strategy_from_env)
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.project.endpoint = endpoint;
        }
        if let Some(model_deployment) = overrides.model_deployment {
            self.project.model_deployment = model_deployment;
        }
        if let Some(credential_strategy) = overrides.credential_strategy {
            self.credential.strategy = credential_strategy;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_project(&self.project)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("stayfinder.toml"), PathBuf::from("config/stayfinder.toml")]
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

fn validate_project(project: &ProjectConfig) -> Result<(), ConfigError> {
    let endpoint = project.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Validation(
            "project.endpoint is required. Set PROJECT_ENDPOINT to your project endpoint, e.g. https://<project>.services.ai.azure.com".to_string(),
        ));
    }
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "project.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if project.model_deployment.trim().is_empty() {
        return Err(ConfigError::Validation(
            "project.model_deployment must not be empty".to_string(),
        ));
    }

    if project.request_timeout_secs == 0 || project.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "project.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    project: Option<ProjectPatch>,
    credential: Option<CredentialPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectPatch {
    endpoint: Option<String>,
    model_deployment: Option<String>,
    api_version: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CredentialPatch {
    strategy: Option<CredentialStrategy>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, CredentialStrategy, LoadOptions, LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn endpoint_is_required() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["PROJECT_ENDPOINT", "MSI_ENDPOINT"]);

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected validation failure without an endpoint".to_string()),
            Err(error) => error,
        };

        let mentions_endpoint = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("project.endpoint")
        );
        ensure(mentions_endpoint, "validation failure should mention project.endpoint")
    }

    #[test]
    fn env_vars_use_conventional_hosted_service_names() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROJECT_ENDPOINT", "https://example.services.ai.azure.com");
        env::set_var("MODEL_DEPLOYMENT_NAME", "gpt-4.1");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.project.endpoint == "https://example.services.ai.azure.com",
                "endpoint should come from PROJECT_ENDPOINT",
            )?;
            ensure(
                config.project.model_deployment == "gpt-4.1",
                "model deployment should come from MODEL_DEPLOYMENT_NAME",
            )?;
            Ok(())
        })();

        clear_vars(&["PROJECT_ENDPOINT", "MODEL_DEPLOYMENT_NAME"]);
        result
    }

    #[test]
    fn model_deployment_defaults_when_unset() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROJECT_ENDPOINT", "https://example.services.ai.azure.com");
        clear_vars(&["MODEL_DEPLOYMENT_NAME", "MSI_ENDPOINT"]);

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.project.model_deployment == "gpt-4.1-mini",
                "model deployment should default to gpt-4.1-mini",
            )
        })();

        clear_vars(&["PROJECT_ENDPOINT"]);
        result
    }

    #[test]
    fn msi_endpoint_presence_selects_managed_identity() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROJECT_ENDPOINT", "https://example.services.ai.azure.com");
        env::set_var("MSI_ENDPOINT", "http://169.254.169.254/msi");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.credential.strategy == CredentialStrategy::ManagedIdentity,
                "MSI_ENDPOINT presence should select managed identity",
            )
        })();

        clear_vars(&["PROJECT_ENDPOINT", "MSI_ENDPOINT"]);
        result
    }

    #[test]
    fn explicit_strategy_wins_over_msi_detection() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROJECT_ENDPOINT", "https://example.services.ai.azure.com");
        env::set_var("MSI_ENDPOINT", "http://169.254.169.254/msi");
        env::set_var("STAYFINDER_CREDENTIAL_STRATEGY", "default");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.credential.strategy == CredentialStrategy::DefaultChain,
                "explicit strategy should win over MSI detection",
            )
        })();

        clear_vars(&["PROJECT_ENDPOINT", "MSI_ENDPOINT", "STAYFINDER_CREDENTIAL_STRATEGY"]);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        clear_vars(&["PROJECT_ENDPOINT", "MSI_ENDPOINT"]);
        env::set_var("TEST_PROJECT_ENDPOINT", "https://interp.services.ai.azure.com");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stayfinder.toml");
            fs::write(
                &path,
                r#"
[project]
endpoint = "${TEST_PROJECT_ENDPOINT}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.project.endpoint == "https://interp.services.ai.azure.com",
                "endpoint should be interpolated from the environment",
            )
        })();

        clear_vars(&["TEST_PROJECT_ENDPOINT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PROJECT_ENDPOINT", "https://from-env.services.ai.azure.com");
        clear_vars(&["MSI_ENDPOINT"]);

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stayfinder.toml");
            fs::write(
                &path,
                r#"
[project]
endpoint = "https://from-file.services.ai.azure.com"
model_deployment = "gpt-4o-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    model_deployment: Some("gpt-4o-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.project.endpoint == "https://from-env.services.ai.azure.com",
                "env endpoint should win over file",
            )?;
            ensure(
                config.project.model_deployment == "gpt-4o-from-override",
                "override model deployment should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PROJECT_ENDPOINT"]);
        result
    }

    #[test]
    fn non_http_endpoint_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["PROJECT_ENDPOINT", "MSI_ENDPOINT"]);

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                endpoint: Some("ftp://example.com".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure for ftp endpoint".to_string()),
            Err(error) => error,
        };

        let mentions_scheme = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("http://")
        );
        ensure(mentions_scheme, "validation failure should mention the expected scheme")
    }
}
