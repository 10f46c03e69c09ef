//! Core domain for the leavelink bridge.
//!
//! Holds everything the integration shares that does no I/O:
//! - **Config** (`config`) - toml + `LEAVELINK_*` env loading with validation
//! - **Domain** (`domain`) - leave request contract, employees, submission lifecycle
//! - **Timezone** (`timezone`) - offset-label parsing and timestamp rebasing

pub mod config;
pub mod domain;
pub mod errors;
pub mod timezone;

pub use domain::employee::{default_location, Employee, EmployeeLocation, LocationDetail};
pub use domain::leave::{
    find_vto_leave_type, DayHour, DraftParams, EmployeeRef, LeaveRequest, LeaveType,
    SubmissionEvent, SubmissionState, VTO_LEAVE_CODE, VTO_LEAVE_TITLE,
};
pub use errors::DomainError;
pub use timezone::{
    format_leave_timestamp, normalize, parse_location_offset, TimezoneError,
    LEAVE_TIMESTAMP_FORMAT,
};
