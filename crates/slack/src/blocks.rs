//! Block Kit payload builders for the VTO flow: messages, input blocks and
//! the two views (workflow-step configuration and the request form modal).

use serde::{Deserialize, Serialize};

/// Action id of the *Open VTO form* button.
pub const OPEN_FORM_ACTION_ID: &str = "open-leave-request-form";
/// Callback id of the workflow-step configuration view.
pub const CONFIG_VIEW_CALLBACK_ID: &str = "vto_workflow_view";
/// Callback id of the VTO request form modal.
pub const VTO_FORM_CALLBACK_ID: &str = "leave-request-submission";
/// Callback id the workflow-step edit action arrives under.
pub const WORKFLOW_STEP_CALLBACK_ID: &str = "leave_request";
/// Callback id of the (stubbed) global shortcut.
pub const SHORTCUT_CALLBACK_ID: &str = "leave-request-shortcut";

pub const START_INPUT_BLOCK_ID: &str = "vto_start_time_input";
pub const END_INPUT_BLOCK_ID: &str = "vto_end_time_input";
pub const START_INPUT_ACTION_ID: &str = "vto_start_time";
pub const END_INPUT_ACTION_ID: &str = "vto_end_time";

pub const RECIPIENT_INPUT_BLOCK_ID: &str = "vto_form_receipient_input";
pub const CHANNEL_INPUT_BLOCK_ID: &str = "vto_channel_id_input";
pub const MESSAGE_LINK_INPUT_BLOCK_ID: &str = "vto_message_link_input";
pub const RECIPIENT_INPUT_ACTION_ID: &str = "vto_form_receipient";
pub const CHANNEL_INPUT_ACTION_ID: &str = "vto_channel_id";
pub const MESSAGE_LINK_INPUT_ACTION_ID: &str = "vto_message_link";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
    },
    Datetimepicker {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_date_time: Option<i64>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
    },
    Actions {
        block_id: String,
        elements: Vec<ButtonElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Input {
        block_id: String,
        element: InputElement,
        label: TextObject,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section(mut self, block_id: impl Into<String>, text: TextObject) -> Self {
        self.blocks.push(Block::Section { block_id: block_id.into(), text });
        self
    }

    pub fn actions(mut self, block_id: impl Into<String>, elements: Vec<ButtonElement>) -> Self {
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Modal,
    WorkflowStep,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: ViewKind,
    pub callback_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<TextObject>,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<String>,
}

fn input_block(block_id: &str, element: InputElement, label: &str) -> Block {
    Block::Input {
        block_id: block_id.to_string(),
        element,
        label: TextObject::plain(label),
    }
}

/// Configuration view shown when the workflow step is added or edited in
/// the workflow builder.
pub fn workflow_config_view() -> ModalView {
    ModalView {
        kind: ViewKind::WorkflowStep,
        callback_id: CONFIG_VIEW_CALLBACK_ID.to_string(),
        title: None,
        submit: None,
        close: None,
        blocks: vec![
            Block::Section {
                block_id: "vto_config_header".to_string(),
                text: TextObject::plain("VTO Request Trigger Setting"),
            },
            input_block(
                RECIPIENT_INPUT_BLOCK_ID,
                InputElement::PlainTextInput { action_id: RECIPIENT_INPUT_ACTION_ID.to_string() },
                "Place the person who reacted with email address in here please.",
            ),
            input_block(
                CHANNEL_INPUT_BLOCK_ID,
                InputElement::PlainTextInput { action_id: CHANNEL_INPUT_ACTION_ID.to_string() },
                "Place the channel variable where the react was used in please.",
            ),
            input_block(
                MESSAGE_LINK_INPUT_BLOCK_ID,
                InputElement::PlainTextInput {
                    action_id: MESSAGE_LINK_INPUT_ACTION_ID.to_string(),
                },
                "Place \"Link to message reacted on\" variable in here please.",
            ),
        ],
        private_metadata: None,
    }
}

/// The VTO request form. Pickers are seeded by the caller (current hour and
/// current hour + 1); `private_metadata` carries the originating thread
/// context through the round-trip.
pub fn vto_form_view(
    initial_start: i64,
    initial_end: i64,
    private_metadata: String,
) -> ModalView {
    ModalView {
        kind: ViewKind::Modal,
        callback_id: VTO_FORM_CALLBACK_ID.to_string(),
        title: Some(TextObject::plain("VTO Request Form")),
        submit: Some(TextObject::plain("Submit")),
        close: Some(TextObject::plain("Cancel")),
        blocks: vec![
            input_block(
                START_INPUT_BLOCK_ID,
                InputElement::Datetimepicker {
                    action_id: START_INPUT_ACTION_ID.to_string(),
                    initial_date_time: Some(initial_start),
                },
                "VTO Start Time",
            ),
            input_block(
                END_INPUT_BLOCK_ID,
                InputElement::Datetimepicker {
                    action_id: END_INPUT_ACTION_ID.to_string(),
                    initial_date_time: Some(initial_end),
                },
                "VTO End Time",
            ),
        ],
        private_metadata: Some(private_metadata),
    }
}

/// Thread message prompting the mentioned user to open the request form.
pub fn vto_prompt_message(user_id: &str, message_id: &str) -> MessageTemplate {
    MessageBuilder::new("Click button to open a leave request form.")
        .section(
            "vto_prompt",
            TextObject::mrkdwn(format!(
                "Hello <@{user_id}>!\nTo submit your VTO, Please fill out this form."
            )),
        )
        .actions(
            message_id,
            vec![ButtonElement::new(OPEN_FORM_ACTION_ID, "Open VTO form")
                .value(OPEN_FORM_ACTION_ID)],
        )
        .build()
}

pub fn vto_success_message(
    user_id: &str,
    start_display: &str,
    end_display: &str,
) -> MessageTemplate {
    let text = format!(
        "VTO Submission from <@{user_id}> completed:\n*VTO Start Time:* \n{start_display}\n*VTO End Time:* \n{end_display}"
    );
    MessageBuilder::new(format!(
        "VTO Submission from <@{user_id}> completed:\nVTO Start Time:\n{start_display}\nVTO End Time: \n{end_display}"
    ))
    .section("vto_success", TextObject::mrkdwn(text))
    .build()
}

pub fn unregistered_employee_message(user_id: &str) -> MessageTemplate {
    let text = format!(
        "Sorry, <@{user_id}>, you cannot request VTO because you are not a registered employee in the Teamwork system. Please contact the admin for help."
    );
    MessageBuilder::new(text.clone()).section("vto_unregistered", TextObject::mrkdwn(text)).build()
}

pub fn submission_failure_message(user_id: &str, detail: &str) -> MessageTemplate {
    let text = format!(
        "Sorry, <@{user_id}>, your VTO request could not be submitted: {detail}. Please try again or contact the admin for help."
    );
    MessageBuilder::new(text.clone()).section("vto_failure", TextObject::mrkdwn(text)).build()
}
