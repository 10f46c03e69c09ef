use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub teamwork: TeamworkConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub signing_secret: SecretString,
}

/// Credentials and endpoint for the HR backend's operations API.
#[derive(Clone, Debug)]
pub struct TeamworkConfig {
    pub base_url: String,
    pub portal: String,
    pub code: String,
    pub username: String,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub teamwork_base_url: Option<String>,
    pub teamwork_portal: Option<String>,
    pub teamwork_code: Option<String>,
    pub teamwork_username: Option<String>,
    pub teamwork_password: Option<String>,
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
            slack: SlackConfig {
                bot_token: String::new().into(),
                signing_secret: String::new().into(),
            },
            teamwork: TeamworkConfig {
                base_url: String::new(),
                portal: String::new(),
                code: String::new(),
                username: String::new(),
                password: String::new().into(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                health_check_port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leavelink.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token_value);
            }
            if let Some(signing_secret_value) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret_value);
            }
        }

        if let Some(teamwork) = patch.teamwork {
            if let Some(base_url) = teamwork.base_url {
                self.teamwork.base_url = base_url;
            }
            if let Some(portal) = teamwork.portal {
                self.teamwork.portal = portal;
            }
            if let Some(code) = teamwork.code {
                self.teamwork.code = code;
            }
            if let Some(username) = teamwork.username {
                self.teamwork.username = username;
            }
            if let Some(password_value) = teamwork.password {
                self.teamwork.password = secret_value(password_value);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
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

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEAVELINK_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("LEAVELINK_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }

        if let Some(value) = read_env("LEAVELINK_TEAMWORK_URL") {
            self.teamwork.base_url = value;
        }
        if let Some(value) = read_env("LEAVELINK_TEAMWORK_PORTAL") {
            self.teamwork.portal = value;
        }
        if let Some(value) = read_env("LEAVELINK_TEAMWORK_CODE") {
            self.teamwork.code = value;
        }
        if let Some(value) = read_env("LEAVELINK_TEAMWORK_USERNAME") {
            self.teamwork.username = value;
        }
        if let Some(value) = read_env("LEAVELINK_TEAMWORK_PASSWORD") {
            self.teamwork.password = secret_value(value);
        }

        if let Some(value) = read_env("LEAVELINK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEAVELINK_SERVER_PORT") {
            self.server.port = parse_u16("LEAVELINK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEAVELINK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("LEAVELINK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("LEAVELINK_LOGGING_LEVEL").or_else(|| read_env("LEAVELINK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEAVELINK_LOGGING_FORMAT").or_else(|| read_env("LEAVELINK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(base_url) = overrides.teamwork_base_url {
            self.teamwork.base_url = base_url;
        }
        if let Some(portal) = overrides.teamwork_portal {
            self.teamwork.portal = portal;
        }
        if let Some(code) = overrides.teamwork_code {
            self.teamwork.code = code;
        }
        if let Some(username) = overrides.teamwork_username {
            self.teamwork.username = username;
        }
        if let Some(password) = overrides.teamwork_password {
            self.teamwork.password = secret_value(password);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_teamwork(&self.teamwork)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leavelink.toml"), PathBuf::from("config/leavelink.toml")]
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if slack.signing_secret.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information".to_string()
        ));
    }

    Ok(())
}

fn validate_teamwork(teamwork: &TeamworkConfig) -> Result<(), ConfigError> {
    let base_url = teamwork.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation("teamwork.base_url must be an http(s) URL".to_string()));
    }

    for (key, value) in [
        ("teamwork.portal", teamwork.portal.as_str()),
        ("teamwork.code", teamwork.code.as_str()),
        ("teamwork.username", teamwork.username.as_str()),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }

    if teamwork.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation("teamwork.password must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
    }
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation("server.health_check_port must be non-zero".to_string()));
    }
    if server.health_check_port == server.port {
        return Err(ConfigError::Validation(
            "server.health_check_port must differ from server.port".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    match logging.level.trim().to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "logging.level `{other}` is not one of trace|debug|info|warn|error"
        ))),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    teamwork: Option<TeamworkPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    signing_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TeamworkPatch {
    base_url: Option<String>,
    portal: Option<String>,
    code: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            slack_bot_token: Some("xoxb-test".to_string()),
            slack_signing_secret: Some("shhh".to_string()),
            teamwork_base_url: Some("https://hr.example.com".to_string()),
            teamwork_portal: Some("acme".to_string()),
            teamwork_code: Some("ops".to_string()),
            teamwork_username: Some("bridge-bot".to_string()),
            teamwork_password: Some("hunter2".to_string()),
            log_level: None,
        }
    }

    #[test]
    fn load_succeeds_with_complete_overrides() {
        let config = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("config should load");

        assert_eq!(config.teamwork.portal, "acme");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn rejects_app_level_token_with_hint() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("xapp-wrong".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .expect_err("app-level token should be rejected");

        let message = error.to_string();
        assert!(message.contains("xoxb-"));
        assert!(message.contains("app-level token"));
    }

    #[test]
    fn rejects_missing_teamwork_credentials() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                teamwork_password: Some(String::new()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .expect_err("blank password should be rejected");

        assert!(matches!(error, ConfigError::Validation(_)));
        assert!(error.to_string().contains("teamwork.password"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                teamwork_base_url: Some("ftp://hr.example.com".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .expect_err("non-http URL should be rejected");

        assert!(error.to_string().contains("teamwork.base_url"));
    }

    #[test]
    fn config_file_patch_and_interpolation_are_applied() {
        std::env::set_var("LEAVELINK_TEST_INTERP_PORTAL", "interp-portal");

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[teamwork]
portal = "${{LEAVELINK_TEST_INTERP_PORTAL}}"

[server]
port = 4000

[logging]
level = "debug"
format = "json"
"#
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides { teamwork_portal: None, ..valid_overrides() },
        })
        .expect("config should load from file");

        assert_eq!(config.teamwork.portal, "interp-portal");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        std::env::remove_var("LEAVELINK_TEST_INTERP_PORTAL");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("does/not/exist.toml".into()),
            require_file: true,
            overrides: valid_overrides(),
        })
        .expect_err("missing required file should fail");

        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn secrets_are_not_exposed_by_default_config() {
        let config = AppConfig::default();
        assert!(config.slack.bot_token.expose_secret().is_empty());
        assert!(config.teamwork.password.expose_secret().is_empty());
    }

    #[test]
    fn unsupported_log_format_is_rejected() {
        let error = "yaml".parse::<LogFormat>().expect_err("unknown format");
        assert!(error.to_string().contains("compact|pretty|json"));
    }
}
