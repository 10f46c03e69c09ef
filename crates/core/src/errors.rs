use thiserror::Error;

use crate::domain::leave::{SubmissionEvent, SubmissionState};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid submission transition from {from:?} on {event:?}")]
    InvalidSubmissionTransition { from: SubmissionState, event: SubmissionEvent },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
