use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use leavelink_core::config::{AppConfig, ConfigError, LoadOptions};
use leavelink_slack::client::{SlackError, SlackWebClient};
use leavelink_slack::events::{dispatcher_with, EventDispatcher};
use leavelink_teamwork::{TeamworkClient, TransportError};

use crate::vto::VtoService;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<EventDispatcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack client initialization failed: {0}")]
    Slack(#[source] SlackError),
    #[error("teamwork client initialization failed: {0}")]
    Teamwork(#[source] TransportError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let gateway =
        Arc::new(SlackWebClient::new(config.slack.bot_token.clone()).map_err(BootstrapError::Slack)?);
    let teamwork = Arc::new(
        TeamworkClient::new(config.teamwork.clone()).map_err(BootstrapError::Teamwork)?,
    );
    let service = Arc::new(VtoService::new(gateway, teamwork));

    let dispatcher = Arc::new(dispatcher_with(service.clone(), service));
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        "event dispatcher assembled"
    );

    Ok(Application { config, dispatcher })
}

#[cfg(test)]
mod tests {
    use leavelink_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

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
    fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("invalid-token".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("xoxb-"));
    }

    #[test]
    fn bootstrap_assembles_the_full_handler_set() {
        let app = bootstrap(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.dispatcher.handler_count(), 6);
        assert_eq!(app.config.teamwork.portal, "acme");
    }
}
