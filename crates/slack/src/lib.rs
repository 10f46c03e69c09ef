//! Slack interface for the leavelink bridge.
//!
//! - **Block Kit** (`blocks`) - message and view builders for the VTO flow
//! - **Events** (`events`) - payload parsing, the event dispatcher and the
//!   service traits handlers delegate to
//! - **Web API** (`client`) - the [`client::SlackGateway`] seam and its
//!   reqwest implementation
//! - **Signatures** (`signature`) - signing-secret verification for inbound
//!   webhooks
//!
//! The bridge runs over plain HTTPS webhooks: Slack delivers workflow-step
//! events and interactivity payloads to the server crate, which parses them
//! here and routes them through [`events::EventDispatcher`].

pub mod blocks;
pub mod client;
pub mod events;
pub mod signature;
