//! Typed wrappers over the leave-management endpoints.
//!
//! Each wrapper threads the caller's session slot through
//! [`TeamworkClient::call_with_reauth`] and decodes the backend's response
//! shape. Only [`TeamworkClient::post_leave`] interprets HTTP statuses
//! itself: 409 is the backend's leave-conflict verdict, not a failure of
//! the call.

use serde_json::Value;
use tracing::{debug, info};

use leavelink_core::{DayHour, Employee, EmployeeLocation, LeaveRequest, LeaveType, LocationDetail};

use crate::client::{Method, TeamworkClient, TeamworkError};
use crate::session::Session;

/// Backend verdict for a submitted leave request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaveSubmissionOutcome {
    /// HTTP 200: the leave request was created.
    Accepted,
    /// HTTP 409: the window conflicts with an existing request; nothing was
    /// created.
    Conflicted,
    /// Any other non-2xx status.
    Rejected { status: u16 },
}

impl TeamworkClient {
    /// Looks up employees whose email contains `email`. Zero rows means the
    /// requester is not registered in the HR system.
    pub async fn employee_by_email(
        &self,
        session: &mut Option<Session>,
        email: &str,
    ) -> Result<Vec<Employee>, TeamworkError> {
        let endpoint = "/api/employees/list";
        let filter = format!("Email~contains~'{email}'");
        let body = self
            .get(
                session,
                endpoint,
                &[("sort", ""), ("page", "1"), ("group", ""), ("filter", filter.as_str())],
            )
            .await?;
        let rows = body.get("Data").cloned().unwrap_or(Value::Array(Vec::new()));
        let employees: Vec<Employee> = Self::decode(endpoint, rows)?;

        debug!(
            event_name = "teamwork.employee.lookup",
            matches = employees.len(),
            "employee lookup completed"
        );
        Ok(employees)
    }

    /// Location assignments for an employee; the default one carries the
    /// timezone label used to rebase leave timestamps.
    pub async fn employee_locations(
        &self,
        session: &mut Option<Session>,
        employee_id: i64,
    ) -> Result<Vec<EmployeeLocation>, TeamworkError> {
        let endpoint = format!("/api/employees/{employee_id}/locations");
        let body = self.get(session, &endpoint, &[]).await?;
        Self::decode(&endpoint, body)
    }

    pub async fn location(
        &self,
        session: &mut Option<Session>,
        business_id: i64,
    ) -> Result<LocationDetail, TeamworkError> {
        let endpoint = format!("/api/locations/{business_id}");
        let body = self.get(session, &endpoint, &[]).await?;
        Self::decode(&endpoint, body)
    }

    pub async fn leave_types(
        &self,
        session: &mut Option<Session>,
    ) -> Result<Vec<LeaveType>, TeamworkError> {
        let endpoint = "/api/leave/leavetypes";
        let body = self.get(session, endpoint, &[]).await?;
        Self::decode(endpoint, body)
    }

    /// Asks the backend to compute the per-day hour breakdown for a draft.
    pub async fn calc_daily_hours(
        &self,
        session: &mut Option<Session>,
        leave: &LeaveRequest,
    ) -> Result<Vec<DayHour>, TeamworkError> {
        let endpoint = "/api/leave/calcdailyhours/";
        let payload = serde_json::to_value(leave).map_err(|error| {
            TeamworkError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                detail: format!("leave request serialization failed: {error}"),
            }
        })?;

        let response =
            self.request(session, Method::Put, endpoint, Some(payload), &[]).await?;
        if !response.is_success() {
            return Err(TeamworkError::Status {
                status: response.status,
                endpoint: endpoint.to_string(),
            });
        }
        Self::decode(endpoint, response.body)
    }

    /// Submits the finished leave request for `employee_id`.
    pub async fn post_leave(
        &self,
        session: &mut Option<Session>,
        employee_id: i64,
        leave: &LeaveRequest,
    ) -> Result<LeaveSubmissionOutcome, TeamworkError> {
        let endpoint = format!("/api/leave/post/{employee_id}");
        let payload = serde_json::to_value(leave).map_err(|error| {
            TeamworkError::UnexpectedResponse {
                endpoint: endpoint.clone(),
                detail: format!("leave request serialization failed: {error}"),
            }
        })?;
        let response = self
            .request(
                session,
                Method::Put,
                &endpoint,
                Some(payload),
                &[("validatedOnServer", "false")],
            )
            .await?;
        let outcome = match response.status {
            status if (200..300).contains(&status) => LeaveSubmissionOutcome::Accepted,
            409 => LeaveSubmissionOutcome::Conflicted,
            status => LeaveSubmissionOutcome::Rejected { status },
        };

        info!(
            event_name = "teamwork.leave.submitted",
            employee_id,
            status = response.status,
            outcome = ?outcome,
            "leave submission completed"
        );
        Ok(outcome)
    }
}
