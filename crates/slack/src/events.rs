//! Event model and dispatch for the VTO workflow.
//!
//! Two delivery shapes feed this module: Events API callbacks (the
//! `workflow_step_execute` runtime event) and interactivity payloads (the
//! step configuration flow, the *Open VTO form* button and both view
//! submissions). Parsing produces a [`SlackEvent`]; the [`EventDispatcher`]
//! routes it to a handler, which delegates the actual work to a service
//! trait so the webhook layer and tests can swap implementations.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::blocks::{
    CHANNEL_INPUT_ACTION_ID, CHANNEL_INPUT_BLOCK_ID, CONFIG_VIEW_CALLBACK_ID,
    END_INPUT_ACTION_ID, END_INPUT_BLOCK_ID, MESSAGE_LINK_INPUT_ACTION_ID,
    MESSAGE_LINK_INPUT_BLOCK_ID, OPEN_FORM_ACTION_ID, RECIPIENT_INPUT_ACTION_ID,
    RECIPIENT_INPUT_BLOCK_ID, START_INPUT_ACTION_ID, START_INPUT_BLOCK_ID,
    VTO_FORM_CALLBACK_ID, WORKFLOW_STEP_CALLBACK_ID,
};

/// Field errors returned when the picked window is inverted. The wording
/// matches the form labels, one message per input.
pub const START_BEFORE_END_ERROR: &str = "This cannot be more than or equal to the VTO End Time.";
pub const END_AFTER_START_ERROR: &str = "This cannot be less than or equal to the VTO Start Time.";

/// Field errors returned when the backend reports a conflicting request.
pub const CONFLICT_START_ERROR: &str = "Conflicted with other request, Try again.";
pub const CONFLICT_END_ERROR: &str = "Conflicted with other request, Try again.";

#[derive(Clone, Debug, PartialEq)]
pub enum SlackEvent {
    WorkflowStepEdit(WorkflowStepEditEvent),
    ConfigViewSubmission(ConfigViewSubmissionEvent),
    WorkflowStepExecute(WorkflowStepExecuteEvent),
    OpenFormAction(OpenFormActionEvent),
    LeaveFormSubmission(LeaveFormSubmissionEvent),
    Shortcut { callback_id: String, trigger_id: String },
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::WorkflowStepEdit(_) => SlackEventType::WorkflowStepEdit,
            Self::ConfigViewSubmission(_) => SlackEventType::ConfigViewSubmission,
            Self::WorkflowStepExecute(_) => SlackEventType::WorkflowStepExecute,
            Self::OpenFormAction(_) => SlackEventType::OpenFormAction,
            Self::LeaveFormSubmission(_) => SlackEventType::LeaveFormSubmission,
            Self::Shortcut { .. } => SlackEventType::Shortcut,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    WorkflowStepEdit,
    ConfigViewSubmission,
    WorkflowStepExecute,
    OpenFormAction,
    LeaveFormSubmission,
    Shortcut,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowStepEditEvent {
    pub trigger_id: String,
    pub workflow_step_edit_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigViewSubmissionEvent {
    pub workflow_step_edit_id: String,
    pub recipient: String,
    pub channel_source: String,
    pub message_link: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowStepExecuteEvent {
    pub workflow_step_execute_id: String,
    pub recipient: String,
    pub channel_source: String,
    pub message_link: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFormActionEvent {
    pub trigger_id: String,
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub response_url: String,
    pub message_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaveFormSubmissionEvent {
    pub user_id: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
    pub metadata: FormMetadata,
}

/// Thread context carried through the modal's `private_metadata`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormMetadata {
    pub thread_ts: String,
    pub message_ts: String,
    pub response_url: String,
    pub message_mention: String,
    pub channel_id: String,
}

impl FormMetadata {
    pub fn to_json(&self) -> String {
        // A struct of strings cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self, EventParseError> {
        serde_json::from_str(raw).map_err(|error| EventParseError::Metadata(error.to_string()))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("missing field `{0}` in slack payload")]
    MissingField(&'static str),
    #[error("malformed private metadata: {0}")]
    Metadata(String),
}

fn str_field<'a>(value: &'a Value, pointer: &str, name: &'static str) -> Result<&'a str, EventParseError> {
    value.pointer(pointer).and_then(Value::as_str).ok_or(EventParseError::MissingField(name))
}

fn i64_field(value: &Value, pointer: &str, name: &'static str) -> Result<i64, EventParseError> {
    value.pointer(pointer).and_then(Value::as_i64).ok_or(EventParseError::MissingField(name))
}

/// Parses an interactivity payload (the decoded JSON carried in the
/// `payload` form field).
pub fn parse_interaction_payload(payload: &Value) -> Result<SlackEvent, EventParseError> {
    let payload_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();

    match payload_type {
        "workflow_step_edit" => {
            let callback_id = str_field(payload, "/callback_id", "callback_id")?;
            if callback_id != WORKFLOW_STEP_CALLBACK_ID {
                return Ok(SlackEvent::Unsupported {
                    event_type: format!("workflow_step_edit:{callback_id}"),
                });
            }
            Ok(SlackEvent::WorkflowStepEdit(WorkflowStepEditEvent {
                trigger_id: str_field(payload, "/trigger_id", "trigger_id")?.to_string(),
                workflow_step_edit_id: str_field(
                    payload,
                    "/workflow_step/workflow_step_edit_id",
                    "workflow_step_edit_id",
                )?
                .to_string(),
            }))
        }
        "view_submission" => parse_view_submission(payload),
        "block_actions" => parse_block_actions(payload),
        "shortcut" => Ok(SlackEvent::Shortcut {
            callback_id: str_field(payload, "/callback_id", "callback_id")?.to_string(),
            trigger_id: payload
                .pointer("/trigger_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => Ok(SlackEvent::Unsupported { event_type: other.to_string() }),
    }
}

fn parse_view_submission(payload: &Value) -> Result<SlackEvent, EventParseError> {
    let callback_id = str_field(payload, "/view/callback_id", "view.callback_id")?;

    match callback_id {
        CONFIG_VIEW_CALLBACK_ID => {
            let values = "/view/state/values";
            let input = |block: &str, action: &str| format!("{values}/{block}/{action}/value");
            Ok(SlackEvent::ConfigViewSubmission(ConfigViewSubmissionEvent {
                workflow_step_edit_id: str_field(
                    payload,
                    "/workflow_step/workflow_step_edit_id",
                    "workflow_step_edit_id",
                )?
                .to_string(),
                recipient: str_field(
                    payload,
                    &input(RECIPIENT_INPUT_BLOCK_ID, RECIPIENT_INPUT_ACTION_ID),
                    "vto_form_receipient",
                )?
                .to_string(),
                channel_source: str_field(
                    payload,
                    &input(CHANNEL_INPUT_BLOCK_ID, CHANNEL_INPUT_ACTION_ID),
                    "vto_channel_id",
                )?
                .to_string(),
                message_link: str_field(
                    payload,
                    &input(MESSAGE_LINK_INPUT_BLOCK_ID, MESSAGE_LINK_INPUT_ACTION_ID),
                    "vto_message_link",
                )?
                .to_string(),
            }))
        }
        VTO_FORM_CALLBACK_ID => {
            let metadata_raw =
                str_field(payload, "/view/private_metadata", "view.private_metadata")?;
            let values = "/view/state/values";
            Ok(SlackEvent::LeaveFormSubmission(LeaveFormSubmissionEvent {
                user_id: str_field(payload, "/user/id", "user.id")?.to_string(),
                start_epoch: i64_field(
                    payload,
                    &format!(
                        "{values}/{START_INPUT_BLOCK_ID}/{START_INPUT_ACTION_ID}/selected_date_time"
                    ),
                    "vto_start_time",
                )?,
                end_epoch: i64_field(
                    payload,
                    &format!(
                        "{values}/{END_INPUT_BLOCK_ID}/{END_INPUT_ACTION_ID}/selected_date_time"
                    ),
                    "vto_end_time",
                )?,
                metadata: FormMetadata::from_json(metadata_raw)?,
            }))
        }
        other => Ok(SlackEvent::Unsupported { event_type: format!("view_submission:{other}") }),
    }
}

fn parse_block_actions(payload: &Value) -> Result<SlackEvent, EventParseError> {
    let action_id = payload
        .pointer("/actions/0/action_id")
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingField("actions[0].action_id"))?;

    if action_id != OPEN_FORM_ACTION_ID {
        return Ok(SlackEvent::Unsupported { event_type: format!("block_actions:{action_id}") });
    }

    Ok(SlackEvent::OpenFormAction(OpenFormActionEvent {
        trigger_id: str_field(payload, "/trigger_id", "trigger_id")?.to_string(),
        channel_id: str_field(payload, "/container/channel_id", "container.channel_id")?
            .to_string(),
        message_ts: str_field(payload, "/container/message_ts", "container.message_ts")?
            .to_string(),
        thread_ts: payload
            .pointer("/container/thread_ts")
            .and_then(Value::as_str)
            .map(str::to_string),
        response_url: str_field(payload, "/response_url", "response_url")?.to_string(),
        message_text: payload
            .pointer("/message/blocks/0/text/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }))
}

/// Parses an Events API callback body. Only `workflow_step_execute` is
/// meaningful to this bridge.
pub fn parse_event_callback(body: &Value) -> Result<SlackEvent, EventParseError> {
    let event_type = body.pointer("/event/type").and_then(Value::as_str).unwrap_or_default();
    if event_type != "workflow_step_execute" {
        return Ok(SlackEvent::Unsupported { event_type: event_type.to_string() });
    }

    let step = "/event/workflow_step";
    let input = |name: &str| format!("{step}/inputs/{name}/value");
    Ok(SlackEvent::WorkflowStepExecute(WorkflowStepExecuteEvent {
        workflow_step_execute_id: str_field(
            body,
            &format!("{step}/workflow_step_execute_id"),
            "workflow_step_execute_id",
        )?
        .to_string(),
        recipient: str_field(body, &input("vtoFormReceipient"), "vtoFormReceipient")?.to_string(),
        channel_source: str_field(body, &input("vtoChannelSource"), "vtoChannelSource")?
            .to_string(),
        message_link: str_field(body, &input("vtoMessageLink"), "vtoMessageLink")?.to_string(),
    }))
}

/// Extracts the first `<@U...>` mention from a message text.
pub fn extract_mention(text: &str) -> Option<String> {
    let start = text.find("<@")? + 2;
    let end = text[start..].find('>')? + start;
    let mention = &text[start..end];
    (!mention.is_empty()).then(|| mention.to_string())
}

/// Recovers a message timestamp from a permalink. The final path segment
/// (`p1730000000600000`) is digits only; the dot sits before the last six.
pub fn message_ts_from_link(link: &str) -> Option<String> {
    let path = link.split('?').next().unwrap_or(link);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let digits: String = segment.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 6 {
        return None;
    }
    let (seconds, fraction) = digits.split_at(digits.len() - 6);
    Some(format!("{seconds}.{fraction}"))
}

/// Workflow-builder variables arrive wrapped in formatting; channel ids are
/// reduced to their alphanumeric core.
pub fn sanitize_channel_id(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// What the webhook layer renders back to Slack for a handled event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Plain acknowledgement (empty 200).
    Ack,
    /// `response_action: clear` - close the modal stack.
    Clear,
    /// `response_action: errors` - field-level errors keyed by block id.
    FieldErrors(Vec<(String, String)>),
    Ignored,
}

/// Service verdict for a leave form submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionReply {
    /// Submission finished (successfully or reported in-channel); clear the
    /// modal.
    Cleared,
    /// Keep the modal open with errors on the two time inputs.
    FieldErrors { start: String, end: String },
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] EventParseError),
    #[error("slack api failure: {0}")]
    Slack(String),
    #[error("hr backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// Configuration-time and runtime behavior of the workflow step.
#[async_trait]
pub trait WorkflowStepService: Send + Sync {
    async fn open_config_view(
        &self,
        event: &WorkflowStepEditEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;

    async fn save_config(
        &self,
        event: &ConfigViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;

    async fn run_step(
        &self,
        event: &WorkflowStepExecuteEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

/// The leave request flow: opening the form and processing a submission.
#[async_trait]
pub trait LeaveRequestService: Send + Sync {
    async fn open_leave_form(
        &self,
        event: &OpenFormActionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;

    async fn submit_leave_form(
        &self,
        event: &LeaveFormSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<SubmissionReply, EventHandlerError>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired to no-op services, used as a scaffold and in tests.
pub fn default_dispatcher() -> EventDispatcher {
    let workflow = Arc::new(NoopWorkflowStepService);
    let leave = Arc::new(NoopLeaveRequestService);
    dispatcher_with(workflow, leave)
}

/// Builds the full handler set around concrete services.
pub fn dispatcher_with(
    workflow: Arc<dyn WorkflowStepService>,
    leave: Arc<dyn LeaveRequestService>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(WorkflowStepEditHandler { service: workflow.clone() });
    dispatcher.register(ConfigViewHandler { service: workflow.clone() });
    dispatcher.register(WorkflowStepExecuteHandler { service: workflow });
    dispatcher.register(OpenFormHandler { service: leave.clone() });
    dispatcher.register(LeaveFormHandler { service: leave });
    dispatcher.register(ShortcutHandler);
    dispatcher
}

pub struct WorkflowStepEditHandler {
    service: Arc<dyn WorkflowStepService>,
}

#[async_trait]
impl EventHandler for WorkflowStepEditHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::WorkflowStepEdit
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::WorkflowStepEdit(event) = event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.open_config_view(event, ctx).await?;
        Ok(HandlerResult::Ack)
    }
}

pub struct ConfigViewHandler {
    service: Arc<dyn WorkflowStepService>,
}

#[async_trait]
impl EventHandler for ConfigViewHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ConfigViewSubmission
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ConfigViewSubmission(event) = event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.save_config(event, ctx).await?;
        Ok(HandlerResult::Ack)
    }
}

pub struct WorkflowStepExecuteHandler {
    service: Arc<dyn WorkflowStepService>,
}

#[async_trait]
impl EventHandler for WorkflowStepExecuteHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::WorkflowStepExecute
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::WorkflowStepExecute(event) = event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.run_step(event, ctx).await?;
        Ok(HandlerResult::Ack)
    }
}

pub struct OpenFormHandler {
    service: Arc<dyn LeaveRequestService>,
}

#[async_trait]
impl EventHandler for OpenFormHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::OpenFormAction
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::OpenFormAction(event) = event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.open_leave_form(event, ctx).await?;
        Ok(HandlerResult::Ack)
    }
}

pub struct LeaveFormHandler {
    service: Arc<dyn LeaveRequestService>,
}

#[async_trait]
impl EventHandler for LeaveFormHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::LeaveFormSubmission
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::LeaveFormSubmission(event) = event else {
            return Ok(HandlerResult::Ignored);
        };

        // Window validation happens before the service runs, so an inverted
        // window never reaches the network.
        if event.start_epoch >= event.end_epoch {
            return Ok(HandlerResult::FieldErrors(vec![
                (START_INPUT_BLOCK_ID.to_string(), START_BEFORE_END_ERROR.to_string()),
                (END_INPUT_BLOCK_ID.to_string(), END_AFTER_START_ERROR.to_string()),
            ]));
        }

        let reply = self.service.submit_leave_form(event, ctx).await?;
        Ok(match reply {
            SubmissionReply::Cleared => HandlerResult::Clear,
            SubmissionReply::FieldErrors { start, end } => HandlerResult::FieldErrors(vec![
                (START_INPUT_BLOCK_ID.to_string(), start),
                (END_INPUT_BLOCK_ID.to_string(), end),
            ]),
        })
    }
}

/// The shortcut is registered but intentionally inert.
pub struct ShortcutHandler;

#[async_trait]
impl EventHandler for ShortcutHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Shortcut
    }

    async fn handle(
        &self,
        event: &SlackEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Shortcut { callback_id, .. } = event else {
            return Ok(HandlerResult::Ignored);
        };
        info!(
            event_name = "ingress.slack.shortcut_ignored",
            callback_id = %callback_id,
            correlation_id = %ctx.correlation_id,
            "shortcut acknowledged without action"
        );
        Ok(HandlerResult::Ack)
    }
}

#[derive(Default)]
pub struct NoopWorkflowStepService;

#[async_trait]
impl WorkflowStepService for NoopWorkflowStepService {
    async fn open_config_view(
        &self,
        _event: &WorkflowStepEditEvent,
        _ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }

    async fn save_config(
        &self,
        _event: &ConfigViewSubmissionEvent,
        _ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }

    async fn run_step(
        &self,
        _event: &WorkflowStepExecuteEvent,
        _ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopLeaveRequestService;

#[async_trait]
impl LeaveRequestService for NoopLeaveRequestService {
    async fn open_leave_form(
        &self,
        _event: &OpenFormActionEvent,
        _ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }

    async fn submit_leave_form(
        &self,
        _event: &LeaveFormSubmissionEvent,
        _ctx: &EventContext,
    ) -> Result<SubmissionReply, EventHandlerError> {
        Ok(SubmissionReply::Cleared)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::{
        default_dispatcher, dispatcher_with, extract_mention, message_ts_from_link,
        parse_event_callback, parse_interaction_payload, sanitize_channel_id, EventContext,
        EventHandlerError, FormMetadata, HandlerResult, LeaveFormSubmissionEvent,
        LeaveRequestService, NoopWorkflowStepService, OpenFormActionEvent, SlackEvent,
        SubmissionReply, END_AFTER_START_ERROR, START_BEFORE_END_ERROR,
    };

    fn metadata() -> FormMetadata {
        FormMetadata {
            thread_ts: "1730000000.100000".to_string(),
            message_ts: "1730000000.600000".to_string(),
            response_url: "https://hooks.slack.com/actions/T1/123/abc".to_string(),
            message_mention: "U2MENTION".to_string(),
            channel_id: "C1".to_string(),
        }
    }

    fn leave_form_payload(start: i64, end: i64) -> serde_json::Value {
        json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "callback_id": "leave-request-submission",
                "private_metadata": metadata().to_json(),
                "state": {
                    "values": {
                        "vto_start_time_input": {
                            "vto_start_time": { "selected_date_time": start }
                        },
                        "vto_end_time_input": {
                            "vto_end_time": { "selected_date_time": end }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn parses_workflow_step_edit_payload() {
        let payload = json!({
            "type": "workflow_step_edit",
            "callback_id": "leave_request",
            "trigger_id": "trig-1",
            "workflow_step": { "workflow_step_edit_id": "edit-1" }
        });

        let event = parse_interaction_payload(&payload).expect("parse");
        let SlackEvent::WorkflowStepEdit(edit) = event else {
            panic!("expected workflow step edit, got {event:?}");
        };
        assert_eq!(edit.trigger_id, "trig-1");
        assert_eq!(edit.workflow_step_edit_id, "edit-1");
    }

    #[test]
    fn parses_config_view_submission() {
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "workflow_step": { "workflow_step_edit_id": "edit-2" },
            "view": {
                "callback_id": "vto_workflow_view",
                "state": {
                    "values": {
                        "vto_form_receipient_input": {
                            "vto_form_receipient": { "value": "{{reactor_email}}" }
                        },
                        "vto_channel_id_input": {
                            "vto_channel_id": { "value": "{{channel}}" }
                        },
                        "vto_message_link_input": {
                            "vto_message_link": { "value": "{{message_link}}" }
                        }
                    }
                }
            }
        });

        let event = parse_interaction_payload(&payload).expect("parse");
        let SlackEvent::ConfigViewSubmission(config) = event else {
            panic!("expected config submission, got {event:?}");
        };
        assert_eq!(config.workflow_step_edit_id, "edit-2");
        assert_eq!(config.recipient, "{{reactor_email}}");
    }

    #[test]
    fn parses_leave_form_submission_with_metadata() {
        let event =
            parse_interaction_payload(&leave_form_payload(1_700_000_000, 1_700_003_600))
                .expect("parse");

        let SlackEvent::LeaveFormSubmission(submission) = event else {
            panic!("expected leave form submission, got {event:?}");
        };
        assert_eq!(submission.user_id, "U1");
        assert_eq!(submission.start_epoch, 1_700_000_000);
        assert_eq!(submission.metadata, metadata());
    }

    #[test]
    fn parses_open_form_block_action() {
        let payload = json!({
            "type": "block_actions",
            "trigger_id": "trig-3",
            "response_url": "https://hooks.slack.com/actions/T1/456/def",
            "container": {
                "channel_id": "C1",
                "message_ts": "1730000000.600000",
                "thread_ts": "1730000000.100000"
            },
            "message": {
                "blocks": [
                    { "type": "section", "text": { "type": "mrkdwn", "text": "Hello <@U2MENTION>!" } }
                ]
            },
            "actions": [ { "action_id": "open-leave-request-form", "value": "open-leave-request-form" } ]
        });

        let event = parse_interaction_payload(&payload).expect("parse");
        let SlackEvent::OpenFormAction(action) = event else {
            panic!("expected open form action, got {event:?}");
        };
        assert_eq!(action.channel_id, "C1");
        assert_eq!(action.thread_ts.as_deref(), Some("1730000000.100000"));
        assert_eq!(extract_mention(&action.message_text).as_deref(), Some("U2MENTION"));
    }

    #[test]
    fn unknown_block_action_is_unsupported() {
        let payload = json!({
            "type": "block_actions",
            "actions": [ { "action_id": "something-else" } ]
        });

        let event = parse_interaction_payload(&payload).expect("parse");
        assert!(matches!(event, SlackEvent::Unsupported { .. }));
    }

    #[test]
    fn parses_workflow_step_execute_callback() {
        let body = json!({
            "type": "event_callback",
            "event": {
                "type": "workflow_step_execute",
                "workflow_step": {
                    "workflow_step_execute_id": "exec-1",
                    "inputs": {
                        "vtoFormReceipient": { "value": "jordan.diaz@example.com" },
                        "vtoChannelSource": { "value": "#C9QK01H2N" },
                        "vtoMessageLink": { "value": "https://ws.slack.com/archives/C9QK01H2N/p1730000000600000" }
                    }
                }
            }
        });

        let event = parse_event_callback(&body).expect("parse");
        let SlackEvent::WorkflowStepExecute(execute) = event else {
            panic!("expected step execute, got {event:?}");
        };
        assert_eq!(execute.workflow_step_execute_id, "exec-1");
        assert_eq!(sanitize_channel_id(&execute.channel_source), "C9QK01H2N");
        assert_eq!(
            message_ts_from_link(&execute.message_link).as_deref(),
            Some("1730000000.600000")
        );
    }

    #[test]
    fn message_link_without_digits_is_rejected() {
        assert_eq!(message_ts_from_link("https://ws.slack.com/archives/CHAN/"), None);
        assert_eq!(message_ts_from_link("p123456"), None);
    }

    #[test]
    fn mention_extraction_handles_missing_and_nested_markers() {
        assert_eq!(extract_mention("no mentions here"), None);
        assert_eq!(extract_mention("Hi <@U42>, welcome"), Some("U42".to_string()));
    }

    struct RecordingLeaveService {
        submissions: AtomicUsize,
        reply: SubmissionReply,
    }

    impl RecordingLeaveService {
        fn new(reply: SubmissionReply) -> Arc<Self> {
            Arc::new(Self { submissions: AtomicUsize::new(0), reply })
        }
    }

    #[async_trait]
    impl LeaveRequestService for RecordingLeaveService {
        async fn open_leave_form(
            &self,
            _event: &OpenFormActionEvent,
            _ctx: &EventContext,
        ) -> Result<(), EventHandlerError> {
            Ok(())
        }

        async fn submit_leave_form(
            &self,
            _event: &LeaveFormSubmissionEvent,
            _ctx: &EventContext,
        ) -> Result<SubmissionReply, EventHandlerError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn inverted_window_is_rejected_before_the_service_runs() {
        let service = RecordingLeaveService::new(SubmissionReply::Cleared);
        let dispatcher =
            dispatcher_with(Arc::new(NoopWorkflowStepService), service.clone());

        let event = parse_interaction_payload(&leave_form_payload(1_700_003_600, 1_700_000_000))
            .expect("parse");
        let result =
            dispatcher.dispatch(&event, &EventContext::default()).await.expect("dispatch");

        let HandlerResult::FieldErrors(errors) = result else {
            panic!("expected field errors, got {result:?}");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].1, START_BEFORE_END_ERROR);
        assert_eq!(errors[1].1, END_AFTER_START_ERROR);
        assert_eq!(service.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn equal_start_and_end_is_also_rejected() {
        let service = RecordingLeaveService::new(SubmissionReply::Cleared);
        let dispatcher =
            dispatcher_with(Arc::new(NoopWorkflowStepService), service.clone());

        let event = parse_interaction_payload(&leave_form_payload(1_700_000_000, 1_700_000_000))
            .expect("parse");
        let result =
            dispatcher.dispatch(&event, &EventContext::default()).await.expect("dispatch");

        assert!(matches!(result, HandlerResult::FieldErrors(_)));
        assert_eq!(service.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_window_reaches_the_service_exactly_once() {
        let service = RecordingLeaveService::new(SubmissionReply::Cleared);
        let dispatcher =
            dispatcher_with(Arc::new(NoopWorkflowStepService), service.clone());

        let event = parse_interaction_payload(&leave_form_payload(1_700_000_000, 1_700_003_600))
            .expect("parse");
        let result =
            dispatcher.dispatch(&event, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Clear);
        assert_eq!(service.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn service_field_errors_map_to_both_time_inputs() {
        let service = RecordingLeaveService::new(SubmissionReply::FieldErrors {
            start: "Conflicted with other request, Try again.".to_string(),
            end: "Conflicted with other request, Try again.".to_string(),
        });
        let dispatcher =
            dispatcher_with(Arc::new(NoopWorkflowStepService), service.clone());

        let event = parse_interaction_payload(&leave_form_payload(1_700_000_000, 1_700_003_600))
            .expect("parse");
        let result =
            dispatcher.dispatch(&event, &EventContext::default()).await.expect("dispatch");

        let HandlerResult::FieldErrors(errors) = result else {
            panic!("expected field errors, got {result:?}");
        };
        assert_eq!(errors[0].0, "vto_start_time_input");
        assert_eq!(errors[1].0, "vto_end_time_input");
    }

    #[tokio::test]
    async fn default_dispatcher_registers_the_full_handler_set() {
        let dispatcher = default_dispatcher();
        assert_eq!(dispatcher.handler_count(), 6);

        let result = dispatcher
            .dispatch(
                &SlackEvent::Shortcut {
                    callback_id: "leave-request-shortcut".to_string(),
                    trigger_id: "trig-9".to_string(),
                },
                &EventContext::default(),
            )
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ack);
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let dispatcher = default_dispatcher();
        let result = dispatcher
            .dispatch(
                &SlackEvent::Unsupported { event_type: "app_home_opened".to_string() },
                &EventContext::default(),
            )
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }
}
