//! Leave request contract and submission lifecycle.
//!
//! [`LeaveRequest`] mirrors the HR backend's leave JSON shape field for
//! field: the draft is built from form input, enriched with the backend's
//! per-day hour breakdown, then submitted. Nothing is persisted locally;
//! the struct lives for one webhook invocation.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::timezone::{format_leave_timestamp, LEAVE_TIMESTAMP_FORMAT};

/// Leave-type title the bridge submits against.
pub const VTO_LEAVE_TITLE: &str = "VTO: Slack";
/// Leave-type code equivalent of [`VTO_LEAVE_TITLE`].
pub const VTO_LEAVE_CODE: &str = "VTOSLACK";

/// Request window for `MaxDate`, measured from the submission date.
const MAX_REQUEST_WINDOW_DAYS: i64 = 365 * 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeaveType {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Finds the VTO leave type among the backend's configured types.
pub fn find_vto_leave_type(types: &[LeaveType]) -> Option<&LeaveType> {
    types
        .iter()
        .find(|entry| entry.title == VTO_LEAVE_TITLE || entry.code.as_deref() == Some(VTO_LEAVE_CODE))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmployeeRef {
    pub id: i64,
    pub title: String,
}

/// One day of the backend-computed hour breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DayHour {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub count: Option<f64>,
    pub value: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// The backend's leave-request record. Field names follow the wire contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LeaveRequest {
    pub id: Option<i64>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub days: i64,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub type_id: i64,
    pub type_name: Option<String>,
    pub conflicts: i64,
    pub hours: f64,
    pub calculated_hours: f64,
    pub balance: String,
    pub status: i64,
    pub status_text: Option<String>,
    pub status_display: Option<String>,
    pub time_hours: f64,
    pub time_task_id: i64,
    pub emp_id: i64,
    pub emp_name: Option<String>,
    pub notes: Option<String>,
    pub employees: Vec<EmployeeRef>,
    pub leave_types: Vec<LeaveType>,
    pub accrual_balances: Vec<serde_json::Value>,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
    pub max_days: i64,
    pub max_hours: f64,
    pub save_entered: bool,
    pub can_edit: bool,
    pub can_cancel: bool,
    pub can_delete: bool,
    pub can_remove_cancel: bool,
    pub balance_is_days: bool,
    pub over_balance: bool,
    pub comment_required: bool,
    pub is_leave_management: bool,
    pub is_all_day: bool,
    pub created: Option<String>,
    pub can_grant: bool,
    pub can_request: bool,
    pub can_deny: bool,
    pub has_policy: bool,
    pub messages: Option<String>,
    pub quota_check: Option<String>,
    pub limit_check: Option<String>,
    pub styles: Option<String>,
    pub day_hours: Vec<DayHour>,
}

impl Default for LeaveRequest {
    fn default() -> Self {
        Self {
            id: None,
            start: None,
            end: None,
            days: 0,
            start_time: None,
            end_time: None,
            type_id: 0,
            type_name: None,
            conflicts: 0,
            hours: 0.0,
            calculated_hours: 0.0,
            balance: "N/A".to_string(),
            status: 0,
            status_text: None,
            status_display: None,
            time_hours: 0.0,
            time_task_id: 0,
            emp_id: 0,
            emp_name: None,
            notes: None,
            employees: Vec::new(),
            leave_types: Vec::new(),
            accrual_balances: Vec::new(),
            min_date: None,
            max_date: None,
            max_days: 0,
            max_hours: 0.0,
            save_entered: false,
            can_edit: true,
            can_cancel: false,
            can_delete: false,
            can_remove_cancel: false,
            balance_is_days: false,
            over_balance: false,
            comment_required: false,
            is_leave_management: false,
            is_all_day: false,
            created: None,
            can_grant: false,
            can_request: false,
            can_deny: false,
            has_policy: true,
            messages: None,
            quota_check: None,
            limit_check: None,
            styles: None,
            day_hours: Vec::new(),
        }
    }
}

/// Inputs for a draft leave request, already resolved against the backend
/// (employee id, leave type) and rebased into the location's offset.
#[derive(Clone, Debug)]
pub struct DraftParams {
    pub employee_id: i64,
    pub employee_name: String,
    pub leave_type: LeaveType,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub submitted_on: NaiveDate,
}

impl LeaveRequest {
    /// Builds the initial draft from form input. The `DayHours` seed row is
    /// what the calc-daily-hours endpoint expects before it fills in the
    /// real breakdown.
    pub fn draft(params: DraftParams) -> Self {
        let start_date = params.start.date_naive().format("%Y-%m-%dT00:00:00").to_string();
        let end_date = params.end.date_naive().format("%Y-%m-%dT00:00:00").to_string();
        let max_date = params.submitted_on + chrono::Duration::days(MAX_REQUEST_WINDOW_DAYS);

        Self {
            emp_id: params.employee_id,
            emp_name: Some(params.employee_name.clone()),
            employees: vec![EmployeeRef { id: params.employee_id, title: params.employee_name }],
            start: Some(start_date.clone()),
            end: Some(end_date),
            start_time: Some(format_leave_timestamp(&params.start)),
            end_time: Some(format_leave_timestamp(&params.end)),
            type_id: params.leave_type.id,
            type_name: Some(params.leave_type.title.clone()),
            leave_types: vec![params.leave_type],
            min_date: Some(params.submitted_on.format("%Y-%m-%dT00:00:00").to_string()),
            max_date: Some(max_date.format("%Y-%m-%dT00:00:00").to_string()),
            day_hours: vec![DayHour {
                date: Some(start_date),
                count: None,
                value: 1.0,
                description: None,
                id: 0,
                title: None,
            }],
            ..Self::default()
        }
    }

    /// Replaces the per-day hour breakdown with the backend-computed one.
    /// Every other field is left untouched.
    pub fn merge_day_hours(&mut self, day_hours: Vec<DayHour>) {
        self.day_hours = day_hours;
    }

    /// Enforces the `Start < End` invariant on the rebased timestamps.
    pub fn validate(&self) -> Result<(), DomainError> {
        let parse = |field: &str, value: &Option<String>| {
            let raw = value.as_deref().ok_or_else(|| {
                DomainError::InvariantViolation(format!("{field} is not populated"))
            })?;
            DateTime::parse_from_str(raw, LEAVE_TIMESTAMP_FORMAT).map_err(|_| {
                DomainError::InvariantViolation(format!("{field} `{raw}` is not a leave timestamp"))
            })
        };

        let start = parse("StartTime", &self.start_time)?;
        let end = parse("EndTime", &self.end_time)?;
        if start >= end {
            return Err(DomainError::InvariantViolation(
                "leave request start must precede its end".to_string(),
            ));
        }

        Ok(())
    }
}

/// Submission lifecycle:
/// `Draft -> HoursCalculated -> Submitted -> {Accepted | Conflicted | Rejected}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    Draft,
    HoursCalculated,
    Submitted,
    Accepted,
    Conflicted,
    Rejected { status: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionEvent {
    HoursComputed,
    Dispatched,
    BackendAccepted,
    BackendConflicted,
    BackendRejected { status: u16 },
}

impl SubmissionState {
    pub fn transition(self, event: SubmissionEvent) -> Result<Self, DomainError> {
        match (&self, &event) {
            (Self::Draft, SubmissionEvent::HoursComputed) => Ok(Self::HoursCalculated),
            (Self::HoursCalculated, SubmissionEvent::Dispatched) => Ok(Self::Submitted),
            (Self::Submitted, SubmissionEvent::BackendAccepted) => Ok(Self::Accepted),
            (Self::Submitted, SubmissionEvent::BackendConflicted) => Ok(Self::Conflicted),
            (Self::Submitted, SubmissionEvent::BackendRejected { status }) => {
                Ok(Self::Rejected { status: *status })
            }
            _ => Err(DomainError::InvalidSubmissionTransition { from: self, event }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Conflicted | Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    use crate::errors::DomainError;

    use super::{
        find_vto_leave_type, DayHour, DraftParams, LeaveRequest, LeaveType, SubmissionEvent,
        SubmissionState,
    };

    fn draft_fixture() -> LeaveRequest {
        let offset = FixedOffset::east_opt(-5 * 3600).expect("offset");
        LeaveRequest::draft(DraftParams {
            employee_id: 4821,
            employee_name: "Jordan Diaz".to_string(),
            leave_type: LeaveType {
                id: 7,
                title: "VTO: Slack".to_string(),
                code: Some("VTOSLACK".to_string()),
            },
            start: offset.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap(),
            end: offset.with_ymd_and_hms(2024, 3, 12, 17, 0, 0).unwrap(),
            submitted_on: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        })
    }

    #[test]
    fn draft_resolves_employee_type_and_window() {
        let draft = draft_fixture();

        assert_eq!(draft.emp_id, 4821);
        assert_eq!(draft.type_id, 7);
        assert_eq!(draft.employees.len(), 1);
        assert_eq!(draft.start_time.as_deref(), Some("2024-03-12T09:00:00-0500"));
        assert_eq!(draft.end_time.as_deref(), Some("2024-03-12T17:00:00-0500"));
        assert_eq!(draft.min_date.as_deref(), Some("2024-03-10T00:00:00"));
        assert_eq!(draft.max_date.as_deref(), Some("2026-03-10T00:00:00"));
        assert_eq!(draft.day_hours.len(), 1);
        assert_eq!(draft.day_hours[0].date.as_deref(), Some("2024-03-12T00:00:00"));
    }

    #[test]
    fn serializes_with_backend_field_names() {
        let draft = draft_fixture();
        let value = serde_json::to_value(&draft).expect("serialize");

        assert_eq!(value["EmpId"], 4821);
        assert_eq!(value["TypeId"], 7);
        assert_eq!(value["Balance"], "N/A");
        assert_eq!(value["CanEdit"], true);
        assert_eq!(value["HasPolicy"], true);
        assert!(value["DayHours"].is_array());
        assert_eq!(value["Employees"][0]["Title"], "Jordan Diaz");
    }

    #[test]
    fn merge_day_hours_preserves_every_other_field() {
        let mut draft = draft_fixture();
        let before = draft.clone();

        draft.merge_day_hours(vec![
            DayHour {
                date: Some("2024-03-12T00:00:00".to_string()),
                count: Some(1.0),
                value: 8.0,
                description: None,
                id: 101,
                title: None,
            },
            DayHour {
                date: Some("2024-03-13T00:00:00".to_string()),
                count: Some(1.0),
                value: 4.0,
                description: None,
                id: 102,
                title: None,
            },
        ]);

        assert_eq!(draft.day_hours.len(), 2);

        let mut restored = draft.clone();
        restored.day_hours = before.day_hours.clone();
        assert_eq!(restored, before);
    }

    #[test]
    fn merge_survives_a_serialize_round_trip() {
        let mut draft = draft_fixture();
        draft.merge_day_hours(vec![DayHour {
            date: Some("2024-03-12T00:00:00".to_string()),
            count: Some(1.0),
            value: 8.0,
            description: None,
            id: 101,
            title: None,
        }]);

        let raw = serde_json::to_string(&draft).expect("serialize");
        let round_tripped: LeaveRequest = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(round_tripped, draft);
    }

    #[test]
    fn validate_accepts_ordered_window_and_rejects_inverted_one() {
        let draft = draft_fixture();
        draft.validate().expect("ordered window should validate");

        let mut inverted = draft.clone();
        inverted.start_time = draft.end_time.clone();
        inverted.end_time = draft.start_time.clone();
        let error = inverted.validate().expect_err("inverted window should fail");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn validate_rejects_equal_start_and_end() {
        let mut draft = draft_fixture();
        draft.end_time = draft.start_time.clone();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn finds_vto_type_by_title_or_code() {
        let types = vec![
            LeaveType { id: 1, title: "Vacation".to_string(), code: Some("VAC".to_string()) },
            LeaveType { id: 2, title: "Voluntary".to_string(), code: Some("VTOSLACK".to_string()) },
        ];
        assert_eq!(find_vto_leave_type(&types).map(|t| t.id), Some(2));

        let by_title =
            vec![LeaveType { id: 3, title: "VTO: Slack".to_string(), code: None }];
        assert_eq!(find_vto_leave_type(&by_title).map(|t| t.id), Some(3));

        assert!(find_vto_leave_type(&[]).is_none());
    }

    #[test]
    fn submission_follows_the_expected_lifecycle() {
        let state = SubmissionState::Draft
            .transition(SubmissionEvent::HoursComputed)
            .and_then(|state| state.transition(SubmissionEvent::Dispatched))
            .and_then(|state| state.transition(SubmissionEvent::BackendAccepted))
            .expect("lifecycle should complete");

        assert_eq!(state, SubmissionState::Accepted);
        assert!(state.is_terminal());
    }

    #[test]
    fn submission_records_conflict_and_rejection_outcomes() {
        let submitted = SubmissionState::HoursCalculated
            .transition(SubmissionEvent::Dispatched)
            .expect("dispatch");

        let conflicted =
            submitted.clone().transition(SubmissionEvent::BackendConflicted).expect("conflict");
        assert_eq!(conflicted, SubmissionState::Conflicted);

        let rejected = submitted
            .transition(SubmissionEvent::BackendRejected { status: 500 })
            .expect("rejection");
        assert_eq!(rejected, SubmissionState::Rejected { status: 500 });
    }

    #[test]
    fn submission_blocks_skipping_hour_calculation() {
        let error = SubmissionState::Draft
            .transition(SubmissionEvent::Dispatched)
            .expect_err("draft cannot dispatch directly");
        assert!(matches!(error, DomainError::InvalidSubmissionTransition { .. }));
    }
}
