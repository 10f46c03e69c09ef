//! HR backend ("Teamwork") integration.
//!
//! This crate owns the session-authenticated HTTP client for the leave
//! endpoints:
//! - **Session** (`session`) - credential exchange, session values
//! - **Client** (`client`) - transport seam, sentinel detection, bounded
//!   reauthentication
//! - **Endpoints** (`endpoints`) - typed wrappers for employee lookup,
//!   locations, leave types, daily-hour calculation and leave submission
//!
//! Sessions are explicit values threaded through each call; the only retry
//! behavior is the bounded reauthentication loop in
//! [`client::TeamworkClient::call_with_reauth`].

pub mod client;
pub mod endpoints;
pub mod session;

pub use client::{
    BackendRequest, BackendResponse, HttpTransport, Method, TeamworkClient, TeamworkError,
    TeamworkTransport, TransportError, MAX_SESSION_ATTEMPTS, SESSION_TIMEOUT_SENTINEL,
};
pub use endpoints::LeaveSubmissionOutcome;
pub use session::Session;
