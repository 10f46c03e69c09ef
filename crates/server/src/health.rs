use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use leavelink_core::config::AppConfig;

#[derive(Clone)]
pub struct HealthState {
    config: AppConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub configuration: HealthCheck,
    pub checked_at: String,
}

pub fn router(config: AppConfig) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { config })
}

pub async fn spawn(bind_address: &str, port: u16, config: AppConfig) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(health_error) = axum::serve(listener, router(config)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %health_error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let configuration = configuration_check(&state.config);
    let ready = configuration.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "leavelink-server runtime initialized".to_string(),
        },
        configuration,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn configuration_check(config: &AppConfig) -> HealthCheck {
    match config.validate() {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: format!("slack and teamwork credentials present for {}", config.teamwork.base_url),
        },
        Err(validation_error) => HealthCheck {
            status: "degraded",
            detail: format!("configuration invalid: {validation_error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use leavelink_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::health::{health, HealthState};

    fn valid_config() -> AppConfig {
        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("xoxb-test".to_string()),
                slack_signing_secret: Some("shhh".to_string()),
                teamwork_base_url: Some("https://hr.example.com".to_string()),
                teamwork_portal: Some("acme".to_string()),
                teamwork_code: Some("ops".to_string()),
                teamwork_username: Some("bridge-bot".to_string()),
                teamwork_password: Some("hunter2".to_string()),
                log_level: None,
            },
            ..LoadOptions::default()
        })
        .expect("config should load")
    }

    #[tokio::test]
    async fn health_is_ready_with_a_valid_configuration() {
        let (status, Json(payload)) = health(State(HealthState { config: valid_config() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.configuration.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_degrades_when_the_configuration_is_incomplete() {
        let (status, Json(payload)) =
            health(State(HealthState { config: AppConfig::default() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.configuration.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
