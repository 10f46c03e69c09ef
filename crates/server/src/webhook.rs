//! Inbound webhook endpoints.
//!
//! Slack delivers two streams: Events API callbacks (`/slack/events`, JSON)
//! and interactivity payloads (`/slack/interactions`, a urlencoded form with
//! a `payload` field). Both are authenticated against the signing secret on
//! the raw body before anything is parsed.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use leavelink_slack::events::{
    parse_event_callback, parse_interaction_payload, EventContext, EventDispatcher, HandlerResult,
};
use leavelink_slack::signature::verify_signature;

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<EventDispatcher>,
    pub signing_secret: SecretString,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/slack/events", post(events))
        .route("/slack/interactions", post(interactions))
        .with_state(state)
}

fn check_signature(
    state: &WebhookState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), Response> {
    let header = |name: &'static str| {
        headers.get(name).and_then(|value| value.to_str().ok()).ok_or_else(|| {
            warn!(event_name = "ingress.slack.header_missing", header = name, "rejecting request");
            (StatusCode::UNAUTHORIZED, format!("missing {name} header")).into_response()
        })
    };

    let timestamp = header("x-slack-request-timestamp")?;
    let signature = header("x-slack-signature")?;

    verify_signature(
        state.signing_secret.expose_secret(),
        timestamp,
        body,
        signature,
        Utc::now().timestamp(),
    )
    .map_err(|error| {
        warn!(
            event_name = "ingress.slack.signature_rejected",
            error = %error,
            "rejecting request"
        );
        (StatusCode::UNAUTHORIZED, error.to_string()).into_response()
    })
}

async fn events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = check_signature(&state, &headers, &body) {
        return rejection;
    }

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(error) => {
            warn!(event_name = "ingress.slack.bad_event_body", error = %error, "rejecting request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // Slack's endpoint handshake.
    if parsed.get("type").and_then(Value::as_str) == Some("url_verification") {
        let challenge = parsed.get("challenge").cloned().unwrap_or(Value::Null);
        return Json(json!({ "challenge": challenge })).into_response();
    }

    let event = match parse_event_callback(&parsed) {
        Ok(event) => event,
        Err(error) => {
            warn!(event_name = "ingress.slack.bad_event", error = %error, "rejecting request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let ctx = EventContext { correlation_id: Uuid::new_v4().to_string() };
    info!(
        event_name = "ingress.slack.event_received",
        correlation_id = %ctx.correlation_id,
        event_type = ?event.event_type(),
        "received events api callback"
    );

    // Slack retries non-200 deliveries; processing failures are logged and
    // acknowledged.
    if let Err(dispatch_error) = state.dispatcher.dispatch(&event, &ctx).await {
        error!(
            event_name = "ingress.slack.event_failed",
            correlation_id = %ctx.correlation_id,
            error = %dispatch_error,
            "event processing failed"
        );
    }
    StatusCode::OK.into_response()
}

async fn interactions(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = check_signature(&state, &headers, &body) {
        return rejection;
    }

    let raw = match std::str::from_utf8(&body) {
        Ok(raw) => raw,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let payload = match extract_payload(raw) {
        Some(payload) => payload,
        None => {
            warn!(event_name = "ingress.slack.payload_missing", "rejecting interaction");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let parsed: Value = match serde_json::from_str(&payload) {
        Ok(value) => value,
        Err(error) => {
            warn!(event_name = "ingress.slack.bad_payload", error = %error, "rejecting interaction");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let event = match parse_interaction_payload(&parsed) {
        Ok(event) => event,
        Err(error) => {
            warn!(event_name = "ingress.slack.bad_interaction", error = %error, "rejecting interaction");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let ctx = EventContext { correlation_id: Uuid::new_v4().to_string() };
    info!(
        event_name = "ingress.slack.interaction_received",
        correlation_id = %ctx.correlation_id,
        event_type = ?event.event_type(),
        "received interactivity payload"
    );

    match state.dispatcher.dispatch(&event, &ctx).await {
        Ok(result) => render_result(result),
        Err(dispatch_error) => {
            error!(
                event_name = "ingress.slack.interaction_failed",
                correlation_id = %ctx.correlation_id,
                error = %dispatch_error,
                "interaction processing failed"
            );
            StatusCode::OK.into_response()
        }
    }
}

fn render_result(result: HandlerResult) -> Response {
    match result {
        HandlerResult::Ack | HandlerResult::Ignored => StatusCode::OK.into_response(),
        HandlerResult::Clear => Json(json!({ "response_action": "clear" })).into_response(),
        HandlerResult::FieldErrors(errors) => {
            let mut fields = Map::new();
            for (block_id, message) in errors {
                fields.insert(block_id, Value::String(message));
            }
            Json(json!({ "response_action": "errors", "errors": fields })).into_response()
        }
    }
}

/// Pulls the JSON out of Slack's `payload=<urlencoded>` form body. Spaces
/// arrive as `+`, which `urlencoding::decode` does not translate.
fn extract_payload(body: &str) -> Option<String> {
    for pair in body.split('&') {
        if let Some(value) = pair.strip_prefix("payload=") {
            let value = value.replace('+', "%20");
            return urlencoding::decode(&value).ok().map(|decoded| decoded.into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use leavelink_slack::events::default_dispatcher;
    use leavelink_slack::signature::sign;

    use super::{extract_payload, router, WebhookState};

    const SECRET: &str = "test-signing-secret";

    fn test_router() -> axum::Router {
        router(WebhookState {
            dispatcher: Arc::new(default_dispatcher()),
            signing_secret: SECRET.to_string().into(),
        })
    }

    fn signed_request(path: &str, body: String) -> Request<Body> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign(SECRET, timestamp, body.as_bytes());
        Request::builder()
            .method("POST")
            .uri(path)
            .header("x-slack-request-timestamp", timestamp.to_string())
            .header("x-slack-signature", signature)
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn form_encode(payload: &Value) -> String {
        format!("payload={}", urlencoding::encode(&payload.to_string()))
    }

    #[tokio::test]
    async fn url_verification_echoes_the_challenge() {
        let body = json!({ "type": "url_verification", "challenge": "c-123" }).to_string();
        let response = test_router()
            .oneshot(signed_request("/slack/events", body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["challenge"], "c-123");
    }

    #[tokio::test]
    async fn unsigned_requests_are_rejected() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let body = json!({ "type": "url_verification", "challenge": "c-123" }).to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slack/events")
                    .header("x-slack-request-timestamp", timestamp.to_string())
                    .header("x-slack-signature", "v0=deadbeef")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inverted_window_submission_returns_field_errors() {
        let metadata = json!({
            "thread_ts": "1730000000.100000",
            "message_ts": "1730000000.600000",
            "response_url": "https://hooks.slack.com/actions/T1/123/abc",
            "message_mention": "U1",
            "channel_id": "C1"
        });
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "callback_id": "leave-request-submission",
                "private_metadata": metadata.to_string(),
                "state": {
                    "values": {
                        "vto_start_time_input": {
                            "vto_start_time": { "selected_date_time": 1_700_003_600 }
                        },
                        "vto_end_time_input": {
                            "vto_end_time": { "selected_date_time": 1_700_000_000 }
                        }
                    }
                }
            }
        });

        let response = test_router()
            .oneshot(signed_request("/slack/interactions", form_encode(&payload)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["response_action"], "errors");
        assert!(value["errors"]["vto_start_time_input"].is_string());
        assert!(value["errors"]["vto_end_time_input"].is_string());
    }

    #[tokio::test]
    async fn valid_submission_clears_the_modal() {
        let metadata = json!({
            "thread_ts": "1730000000.100000",
            "message_ts": "1730000000.600000",
            "response_url": "https://hooks.slack.com/actions/T1/123/abc",
            "message_mention": "U1",
            "channel_id": "C1"
        });
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "callback_id": "leave-request-submission",
                "private_metadata": metadata.to_string(),
                "state": {
                    "values": {
                        "vto_start_time_input": {
                            "vto_start_time": { "selected_date_time": 1_700_000_000 }
                        },
                        "vto_end_time_input": {
                            "vto_end_time": { "selected_date_time": 1_700_003_600 }
                        }
                    }
                }
            }
        });

        let response = test_router()
            .oneshot(signed_request("/slack/interactions", form_encode(&payload)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["response_action"], "clear");
    }

    #[tokio::test]
    async fn unrelated_events_are_acknowledged() {
        let body = json!({
            "type": "event_callback",
            "event": { "type": "app_home_opened" }
        })
        .to_string();

        let response = test_router()
            .oneshot(signed_request("/slack/events", body))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn payload_extraction_decodes_plus_and_percent_escapes() {
        let body = "payload=%7B%22type%22%3A%22shortcut%22%2C%22text%22%3A%22a+b%22%7D";
        let decoded = extract_payload(body).expect("payload");
        assert_eq!(decoded, "{\"type\":\"shortcut\",\"text\":\"a b\"}");

        assert_eq!(extract_payload("ssl_check=1"), None);
    }
}
