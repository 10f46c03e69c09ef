//! The VTO submission service: everything between a parsed Slack event and
//! the HR backend.
//!
//! Implements both service traits from `leavelink-slack`. Workflow-step
//! events drive the configuration/prompt flow; a form submission runs the
//! full pipeline: resolve the requester, rebase the window into the
//! employee's location timezone, have the backend compute the daily-hour
//! breakdown, then submit and report the verdict back into the thread.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::json;
use tracing::{info, warn};

use leavelink_core::{
    default_location, find_vto_leave_type, normalize, parse_location_offset, DraftParams,
    LeaveRequest, SubmissionEvent, SubmissionState,
};
use leavelink_slack::blocks::{
    submission_failure_message, unregistered_employee_message, vto_form_view, vto_prompt_message,
    vto_success_message, workflow_config_view, MessageTemplate,
};
use leavelink_slack::client::{
    OutgoingMessage, SlackGateway, WorkflowStepCompletion, WorkflowStepUpdate,
};
use leavelink_slack::events::{
    extract_mention, message_ts_from_link, sanitize_channel_id, ConfigViewSubmissionEvent,
    EventContext, EventHandlerError, EventParseError, FormMetadata, LeaveFormSubmissionEvent,
    LeaveRequestService, OpenFormActionEvent, SubmissionReply, WorkflowStepEditEvent,
    WorkflowStepExecuteEvent, WorkflowStepService, CONFLICT_END_ERROR, CONFLICT_START_ERROR,
};
use leavelink_teamwork::{Session, TeamworkClient};

const SUCCESS_ICON_URL: &str =
    "https://convorelay.com/wp-content/uploads/2023/01/convo_bot_success_512.png";
const ERROR_ICON_URL: &str =
    "https://convorelay.com/wp-content/uploads/2023/01/convo_bot_error_512.png";

/// Human-readable rendering used in the success message.
const DISPLAY_TIME_FORMAT: &str = "%A, %B %d %Y %I:%M%p";

pub struct VtoService {
    slack: Arc<dyn SlackGateway>,
    teamwork: Arc<TeamworkClient>,
}

fn slack_failure(error: leavelink_slack::client::SlackError) -> EventHandlerError {
    EventHandlerError::Slack(error.to_string())
}

fn backend_failure(error: leavelink_teamwork::TeamworkError) -> EventHandlerError {
    EventHandlerError::Backend(error.to_string())
}

impl VtoService {
    pub fn new(slack: Arc<dyn SlackGateway>, teamwork: Arc<TeamworkClient>) -> Self {
        Self { slack, teamwork }
    }

    async fn post_thread_message(
        &self,
        metadata: &FormMetadata,
        message: MessageTemplate,
        username: &str,
        icon_url: &str,
    ) -> Result<(), EventHandlerError> {
        self.slack
            .post_message(&OutgoingMessage {
                channel: metadata.channel_id.clone(),
                thread_ts: Some(metadata.thread_ts.clone()),
                text: message.fallback_text.clone(),
                blocks: Some(message.blocks),
                username: Some(username.to_string()),
                icon_url: Some(icon_url.to_string()),
            })
            .await
            .map_err(slack_failure)?;
        Ok(())
    }

    /// Deletes the prompt message when the submitter is the user it was
    /// addressed to. Best effort: a failed delete never fails the flow.
    async fn delete_prompt_if_own(&self, event: &LeaveFormSubmissionEvent) {
        if event.user_id != event.metadata.message_mention {
            return;
        }
        if let Err(error) = self
            .slack
            .delete_message(&event.metadata.channel_id, &event.metadata.message_ts)
            .await
        {
            warn!(
                event_name = "egress.slack.prompt_delete_failed",
                channel_id = %event.metadata.channel_id,
                error = %error,
                "could not delete the form prompt"
            );
        }
    }

    /// Reports a non-retryable submission failure into the thread and
    /// clears the modal.
    async fn report_failure(
        &self,
        event: &LeaveFormSubmissionEvent,
        ctx: &EventContext,
        detail: &str,
    ) -> Result<SubmissionReply, EventHandlerError> {
        warn!(
            event_name = "vto.submission.failed",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            detail,
            "leave submission aborted"
        );
        self.post_thread_message(
            &event.metadata,
            submission_failure_message(&event.user_id, detail),
            "Error",
            ERROR_ICON_URL,
        )
        .await?;
        Ok(SubmissionReply::Cleared)
    }
}

#[async_trait]
impl WorkflowStepService for VtoService {
    async fn open_config_view(
        &self,
        event: &WorkflowStepEditEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        info!(
            event_name = "vto.workflow.config_opened",
            correlation_id = %ctx.correlation_id,
            workflow_step_edit_id = %event.workflow_step_edit_id,
            "opening workflow configuration view"
        );
        self.slack
            .open_view(&event.trigger_id, &workflow_config_view())
            .await
            .map_err(slack_failure)
    }

    async fn save_config(
        &self,
        event: &ConfigViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let update = WorkflowStepUpdate {
            workflow_step_edit_id: event.workflow_step_edit_id.clone(),
            inputs: json!({
                "vtoFormReceipient": { "value": event.recipient },
                "vtoChannelSource": { "value": event.channel_source },
                "vtoMessageLink": { "value": event.message_link },
            }),
            outputs: json!([
                { "name": "vtoFormReceipient", "type": "text", "label": "VTO Form Receipient" },
                { "name": "vtoChannelSource", "type": "text", "label": "Channel Source" },
                { "name": "vtoMessageLink", "type": "text", "label": "Message Link" },
            ]),
        };

        info!(
            event_name = "vto.workflow.config_saved",
            correlation_id = %ctx.correlation_id,
            workflow_step_edit_id = %event.workflow_step_edit_id,
            "saving workflow step inputs"
        );
        self.slack.update_workflow_step(&update).await.map_err(slack_failure)
    }

    async fn run_step(
        &self,
        event: &WorkflowStepExecuteEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let channel = sanitize_channel_id(&event.channel_source);
        let message_id = message_ts_from_link(&event.message_link)
            .ok_or(EventParseError::MissingField("vtoMessageLink"))?;

        let user =
            self.slack.lookup_user_by_email(&event.recipient).await.map_err(slack_failure)?;

        let prompt = vto_prompt_message(&user.id, &message_id);
        self.slack
            .post_message(&OutgoingMessage {
                channel,
                thread_ts: Some(message_id.clone()),
                text: prompt.fallback_text.clone(),
                blocks: Some(prompt.blocks),
                username: Some("Teamwork Bot".to_string()),
                icon_url: None,
            })
            .await
            .map_err(slack_failure)?;

        self.slack
            .complete_workflow_step(&WorkflowStepCompletion {
                workflow_step_execute_id: event.workflow_step_execute_id.clone(),
                outputs: json!({
                    "vtoFormReceipient": event.recipient,
                    "vtoChannelSource": event.channel_source,
                    "vtoMessageLink": event.message_link,
                }),
            })
            .await
            .map_err(slack_failure)?;

        info!(
            event_name = "vto.workflow.step_completed",
            correlation_id = %ctx.correlation_id,
            workflow_step_execute_id = %event.workflow_step_execute_id,
            "form prompt posted and step completed"
        );
        Ok(())
    }
}

#[async_trait]
impl LeaveRequestService for VtoService {
    async fn open_leave_form(
        &self,
        event: &OpenFormActionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let metadata = FormMetadata {
            thread_ts: event
                .thread_ts
                .clone()
                .unwrap_or_else(|| event.message_ts.clone()),
            message_ts: event.message_ts.clone(),
            response_url: event.response_url.clone(),
            message_mention: extract_mention(&event.message_text).unwrap_or_default(),
            channel_id: event.channel_id.clone(),
        };

        let now = Utc::now().timestamp();
        let initial_start = now - now.rem_euclid(3600);
        let initial_end = initial_start + 3600;

        info!(
            event_name = "vto.form.opened",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            "opening the VTO request form"
        );
        self.slack
            .open_view(
                &event.trigger_id,
                &vto_form_view(initial_start, initial_end, metadata.to_json()),
            )
            .await
            .map_err(slack_failure)
    }

    async fn submit_leave_form(
        &self,
        event: &LeaveFormSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<SubmissionReply, EventHandlerError> {
        let user = self.slack.user_info(&event.user_id).await.map_err(slack_failure)?;
        let Some(email) = user.email.clone() else {
            return self.report_failure(event, ctx, "your Slack profile has no email address").await;
        };

        // The session is a value owned by this invocation; the client
        // refreshes it through the slot on expiry.
        let mut session: Option<Session> = None;

        let employees = self
            .teamwork
            .employee_by_email(&mut session, &email)
            .await
            .map_err(backend_failure)?;
        let Some(employee) = employees.into_iter().next() else {
            info!(
                event_name = "vto.submission.unregistered",
                correlation_id = %ctx.correlation_id,
                user_id = %event.user_id,
                "requester is not a registered employee"
            );
            self.delete_prompt_if_own(event).await;
            self.post_thread_message(
                &event.metadata,
                unregistered_employee_message(&event.user_id),
                "Error",
                ERROR_ICON_URL,
            )
            .await?;
            return Ok(SubmissionReply::Cleared);
        };

        let locations = self
            .teamwork
            .employee_locations(&mut session, employee.id)
            .await
            .map_err(backend_failure)?;
        let Some(location) = default_location(&locations) else {
            return self
                .report_failure(event, ctx, "no default location is configured for your employee record")
                .await;
        };

        let detail =
            self.teamwork.location(&mut session, location.business_id).await.map_err(backend_failure)?;
        let Some(label) = detail.time_zone.clone().or_else(|| location.time_zone.clone()) else {
            return self
                .report_failure(event, ctx, "your default location has no timezone configured")
                .await;
        };
        let destination = match parse_location_offset(&label) {
            Ok(offset) => offset,
            Err(error) => {
                return self.report_failure(event, ctx, &error.to_string()).await;
            }
        };

        let start = normalize(event.start_epoch, user.tz_offset_secs, destination)
            .map_err(|error| EventHandlerError::Backend(error.to_string()))?;
        let end = normalize(event.end_epoch, user.tz_offset_secs, destination)
            .map_err(|error| EventHandlerError::Backend(error.to_string()))?;

        let types = self.teamwork.leave_types(&mut session).await.map_err(backend_failure)?;
        let Some(vto_type) = find_vto_leave_type(&types).cloned() else {
            return self
                .report_failure(event, ctx, "the VTO leave type is not configured in Teamwork")
                .await;
        };

        let mut leave = LeaveRequest::draft(DraftParams {
            employee_id: employee.id,
            employee_name: employee.full_name.clone(),
            leave_type: vto_type,
            start,
            end,
            submitted_on: Utc::now().date_naive(),
        });
        if let Err(invariant) = leave.validate() {
            return self.report_failure(event, ctx, &invariant.to_string()).await;
        }

        let lifecycle = |error: leavelink_core::DomainError| {
            EventHandlerError::Backend(format!("submission lifecycle: {error}"))
        };

        let day_hours =
            self.teamwork.calc_daily_hours(&mut session, &leave).await.map_err(backend_failure)?;
        leave.merge_day_hours(day_hours);
        let state =
            SubmissionState::Draft.transition(SubmissionEvent::HoursComputed).map_err(lifecycle)?;

        let state = state.transition(SubmissionEvent::Dispatched).map_err(lifecycle)?;
        let outcome = self
            .teamwork
            .post_leave(&mut session, employee.id, &leave)
            .await
            .map_err(backend_failure)?;

        match outcome {
            leavelink_teamwork::LeaveSubmissionOutcome::Accepted => {
                let state =
                    state.transition(SubmissionEvent::BackendAccepted).map_err(lifecycle)?;
                info!(
                    event_name = "vto.submission.accepted",
                    correlation_id = %ctx.correlation_id,
                    employee_id = employee.id,
                    state = ?state,
                    "leave request accepted"
                );

                self.delete_prompt_if_own(event).await;
                let (start_display, end_display) =
                    requester_display_times(event, user.tz_offset_secs);
                self.post_thread_message(
                    &event.metadata,
                    vto_success_message(&event.user_id, &start_display, &end_display),
                    "Success",
                    SUCCESS_ICON_URL,
                )
                .await?;
                Ok(SubmissionReply::Cleared)
            }
            leavelink_teamwork::LeaveSubmissionOutcome::Conflicted => {
                let state =
                    state.transition(SubmissionEvent::BackendConflicted).map_err(lifecycle)?;
                info!(
                    event_name = "vto.submission.conflicted",
                    correlation_id = %ctx.correlation_id,
                    employee_id = employee.id,
                    state = ?state,
                    "leave request conflicted; returning field errors"
                );
                Ok(SubmissionReply::FieldErrors {
                    start: CONFLICT_START_ERROR.to_string(),
                    end: CONFLICT_END_ERROR.to_string(),
                })
            }
            leavelink_teamwork::LeaveSubmissionOutcome::Rejected { status } => {
                let state = state
                    .transition(SubmissionEvent::BackendRejected { status })
                    .map_err(lifecycle)?;
                warn!(
                    event_name = "vto.submission.rejected",
                    correlation_id = %ctx.correlation_id,
                    employee_id = employee.id,
                    status,
                    state = ?state,
                    "leave request rejected by the backend"
                );
                self.report_failure(
                    event,
                    ctx,
                    &format!("the HR backend rejected the request (status {status})"),
                )
                .await
            }
        }
    }
}

/// The success message shows the window as the requester picked it, in
/// their own offset.
fn requester_display_times(
    event: &LeaveFormSubmissionEvent,
    tz_offset_secs: i32,
) -> (String, String) {
    let render = |epoch: i64| -> String {
        FixedOffset::east_opt(tz_offset_secs)
            .and_then(|offset| {
                normalize(epoch, tz_offset_secs, offset).ok().map(|instant: DateTime<FixedOffset>| {
                    instant.format(DISPLAY_TIME_FORMAT).to_string()
                })
            })
            .unwrap_or_else(|| epoch.to_string())
    };
    (render(event.start_epoch), render(event.end_epoch))
}
