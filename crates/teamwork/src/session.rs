use std::fmt;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use leavelink_core::config::TeamworkConfig;

/// Credentials issued by `/api/ops/auth`. A session is a plain value: it is
/// obtained by an explicit authenticate call and threaded through each
/// backend request by the caller. Nothing holds it ambiently.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub api_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest {
    #[serde(rename = "Request")]
    pub request: AuthCredentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthCredentials {
    pub portal: String,
    pub code: String,
    pub username: String,
    pub password: String,
}

impl AuthRequest {
    pub fn from_config(config: &TeamworkConfig) -> Self {
        Self {
            request: AuthCredentials {
                portal: config.portal.clone(),
                code: config.code.clone(),
                username: config.username.clone(),
                password: config.password.expose_secret().to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, rename = "APIToken")]
    pub api_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Session;

    #[test]
    fn debug_output_redacts_the_api_token() {
        let session = Session {
            session_id: "sess-1".to_string(),
            api_token: "extremely-secret".to_string(),
        };

        let rendered = format!("{session:?}");
        assert!(rendered.contains("sess-1"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("extremely-secret"));
    }
}
