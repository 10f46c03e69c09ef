use serde::{Deserialize, Serialize};

/// HR backend representation of a person, as returned by the employee list
/// endpoint. Lookup is keyed by email; `id` is the key every subsequent
/// leave call requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Employee {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub employee_number: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
}

/// One row of an employee's location assignments. The default location's
/// business record carries the timezone label leave timestamps are rebased
/// into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmployeeLocation {
    pub business_id: i64,
    pub is_default: bool,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationDetail {
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Picks the employee's default location, if any is flagged.
pub fn default_location(locations: &[EmployeeLocation]) -> Option<&EmployeeLocation> {
    locations.iter().find(|location| location.is_default)
}

#[cfg(test)]
mod tests {
    use super::{default_location, Employee, EmployeeLocation};

    #[test]
    fn deserializes_employee_rows_from_backend_payload() {
        let raw = r#"{
            "Id": 4821,
            "FullName": "Jordan Diaz",
            "Email": "jordan.diaz@example.com",
            "EmployeeNumber": "E-4821",
            "LocationName": "Richmond HQ",
            "SomethingTheBackendAdded": true
        }"#;

        let employee: Employee = serde_json::from_str(raw).expect("employee should deserialize");
        assert_eq!(employee.id, 4821);
        assert_eq!(employee.full_name, "Jordan Diaz");
        assert_eq!(employee.email.as_deref(), Some("jordan.diaz@example.com"));
    }

    #[test]
    fn default_location_prefers_the_flagged_row() {
        let locations = vec![
            EmployeeLocation { business_id: 10, is_default: false, time_zone: None },
            EmployeeLocation {
                business_id: 22,
                is_default: true,
                time_zone: Some("(UTC-05:00) Eastern Time (US & Canada)".to_string()),
            },
        ];

        let found = default_location(&locations).expect("default location");
        assert_eq!(found.business_id, 22);
    }

    #[test]
    fn default_location_is_none_when_nothing_is_flagged() {
        let locations =
            vec![EmployeeLocation { business_id: 10, is_default: false, time_zone: None }];
        assert!(default_location(&locations).is_none());
    }
}
