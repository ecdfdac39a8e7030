//! The insurance holder entity, its create input and the update allow-list.

use crate::{
    clock::age_on,
    error::{HolderError, HolderResult},
    types::{HolderId, PolicyStatus, DATE_FORMAT},
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored holder as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceHolder {
    pub id: HolderId,
    pub ci: String,
    pub name: String,
    pub phone: String,
    pub other_phone: Option<String>,
    pub fixed_phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub client_id: Option<String>,
    pub insurance_company: Option<String>,
    pub policy_number: Option<String>,
    pub policy_type: Option<String>,
    pub policy_status: String,
    pub policy_start_date: Option<String>,
    pub policy_end_date: Option<String>,
    pub coverage_type: Option<String>,
    pub max_coverage_amount: Option<f64>,
    pub used_coverage_amount: f64,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub is_active: bool,
    /// Linked patients, from the relationship table.
    pub total_patients: Option<i64>,
    /// No backing table; always absent.
    pub total_cases: Option<i64>,
    #[serde(rename = "created_at")]
    pub created_at: String,
    #[serde(rename = "updated_at")]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patients: Option<Vec<LinkedPatient>>,
}

/// A patient linked to a holder through the relationship table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedPatient {
    pub id: String,
    pub ci: Option<String>,
    pub name: String,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub relationship_type: String,
    pub is_primary: bool,
}

/// Relationship label used when a holder is registered as its own patient.
pub const HOLDER_RELATIONSHIP: &str = "Titular";

/// Create input. Required fields are optional here so that a missing one
/// yields a field-level validation message instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NewHolder {
    pub ci: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub other_phone: Option<String>,
    pub fixed_phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub client_id: Option<String>,
    pub insurance_company: Option<String>,
    pub policy_number: Option<String>,
    pub policy_type: Option<String>,
    pub policy_status: Option<String>,
    pub policy_start_date: Option<String>,
    pub policy_end_date: Option<String>,
    pub coverage_type: Option<String>,
    pub max_coverage_amount: Option<f64>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub create_as_patient: Option<bool>,
}

impl NewHolder {
    /// Convenience constructor with the three required fields.
    pub fn new(ci: &str, name: &str, phone: &str) -> Self {
        Self {
            ci: Some(ci.to_string()),
            name: Some(name.to_string()),
            phone: Some(phone.to_string()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: PolicyStatus) -> Self {
        self.policy_status = Some(status.as_str().to_string());
        self
    }

    /// Trim, validate and apply defaults. Every failing field is reported at once.
    pub fn normalize(self, today: NaiveDate) -> HolderResult<NewHolder> {
        let mut errors = BTreeMap::new();
        let mut out = NewHolder::default();

        for (key, value, slot) in [
            ("ci", self.ci, &mut out.ci),
            ("name", self.name, &mut out.name),
            ("phone", self.phone, &mut out.phone),
        ] {
            match clean(value) {
                Some(v) => *slot = Some(v),
                None => {
                    errors.insert(key.to_string(), "This field is required".to_string());
                }
            }
        }

        out.email = clean(self.email);
        if let Some(email) = &out.email {
            if !email.contains('@') {
                errors.insert("email".into(), "Invalid email address".into());
            }
        }

        let birth = check_date("birthDate", clean(self.birth_date), &mut errors);
        let start = check_date("policyStartDate", clean(self.policy_start_date), &mut errors);
        let end = check_date("policyEndDate", clean(self.policy_end_date), &mut errors);
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                errors.insert(
                    "policyEndDate".into(),
                    "Policy end date precedes its start date".into(),
                );
            }
        }
        out.birth_date = birth.map(|d| d.format(DATE_FORMAT).to_string());
        out.policy_start_date = start.map(|d| d.format(DATE_FORMAT).to_string());
        out.policy_end_date = end.map(|d| d.format(DATE_FORMAT).to_string());

        out.age = match (self.age, birth) {
            (Some(age), _) if age < 0 => {
                errors.insert("age".into(), "Age cannot be negative".into());
                None
            }
            (Some(age), _) => Some(age),
            (None, Some(birth)) => Some(age_on(birth, today)),
            (None, None) => None,
        };

        out.policy_status = match clean(self.policy_status) {
            None => Some(PolicyStatus::Activo.as_str().to_string()),
            Some(s) if PolicyStatus::parse(&s).is_some() => Some(s),
            Some(s) => {
                errors.insert("policyStatus".into(), format!("Unknown policy status '{s}'"));
                None
            }
        };

        if let Some(amount) = self.max_coverage_amount {
            if !amount.is_finite() || amount < 0.0 {
                errors.insert(
                    "maxCoverageAmount".into(),
                    "Coverage amount must be a non-negative number".into(),
                );
            }
        }
        out.max_coverage_amount = self.max_coverage_amount;

        out.policy_type = clean(self.policy_type).or_else(|| Some("Individual".to_string()));
        out.other_phone = clean(self.other_phone);
        out.fixed_phone = clean(self.fixed_phone);
        out.gender = clean(self.gender);
        out.address = clean(self.address);
        out.city = clean(self.city);
        out.state = clean(self.state);
        out.client_id = clean(self.client_id);
        out.insurance_company = clean(self.insurance_company);
        out.policy_number = clean(self.policy_number);
        out.coverage_type = clean(self.coverage_type);
        out.emergency_contact = clean(self.emergency_contact);
        out.emergency_phone = clean(self.emergency_phone);
        out.blood_type = clean(self.blood_type);
        out.allergies = clean(self.allergies);
        out.medical_history = clean(self.medical_history);
        out.create_as_patient = Some(self.create_as_patient.unwrap_or(true));

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(HolderError::Validation { fields: errors })
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_date(
    key: &str,
    value: Option<String>,
    errors: &mut BTreeMap<String, String>,
) -> Option<NaiveDate> {
    let raw = value?;
    match NaiveDate::parse_from_str(&raw, DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert(key.to_string(), format!("Expected a YYYY-MM-DD date, got '{raw}'"));
            None
        }
    }
}

// ── Update allow-list ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    RequiredText,
    Text,
    Email,
    Date,
    Age,
    Amount,
    RequiredAmount,
    Flag,
    Status,
}

/// Every column a caller may change. Column names are fixed here and
/// never taken from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HolderField {
    Ci,
    Name,
    Phone,
    OtherPhone,
    FixedPhone,
    Email,
    BirthDate,
    Age,
    Gender,
    Address,
    City,
    State,
    ClientId,
    InsuranceCompany,
    PolicyNumber,
    PolicyType,
    PolicyStatus,
    PolicyStartDate,
    PolicyEndDate,
    CoverageType,
    MaxCoverageAmount,
    UsedCoverageAmount,
    EmergencyContact,
    EmergencyPhone,
    BloodType,
    Allergies,
    MedicalHistory,
    IsActive,
}

impl HolderField {
    pub const ALL: [HolderField; 28] = [
        Self::Ci,
        Self::Name,
        Self::Phone,
        Self::OtherPhone,
        Self::FixedPhone,
        Self::Email,
        Self::BirthDate,
        Self::Age,
        Self::Gender,
        Self::Address,
        Self::City,
        Self::State,
        Self::ClientId,
        Self::InsuranceCompany,
        Self::PolicyNumber,
        Self::PolicyType,
        Self::PolicyStatus,
        Self::PolicyStartDate,
        Self::PolicyEndDate,
        Self::CoverageType,
        Self::MaxCoverageAmount,
        Self::UsedCoverageAmount,
        Self::EmergencyContact,
        Self::EmergencyPhone,
        Self::BloodType,
        Self::Allergies,
        Self::MedicalHistory,
        Self::IsActive,
    ];

    /// Column name; identical to the JSON key.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Ci => "ci",
            Self::Name => "name",
            Self::Phone => "phone",
            Self::OtherPhone => "otherPhone",
            Self::FixedPhone => "fixedPhone",
            Self::Email => "email",
            Self::BirthDate => "birthDate",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Address => "address",
            Self::City => "city",
            Self::State => "state",
            Self::ClientId => "clientId",
            Self::InsuranceCompany => "insuranceCompany",
            Self::PolicyNumber => "policyNumber",
            Self::PolicyType => "policyType",
            Self::PolicyStatus => "policyStatus",
            Self::PolicyStartDate => "policyStartDate",
            Self::PolicyEndDate => "policyEndDate",
            Self::CoverageType => "coverageType",
            Self::MaxCoverageAmount => "maxCoverageAmount",
            Self::UsedCoverageAmount => "usedCoverageAmount",
            Self::EmergencyContact => "emergencyContact",
            Self::EmergencyPhone => "emergencyPhone",
            Self::BloodType => "bloodType",
            Self::Allergies => "allergies",
            Self::MedicalHistory => "medicalHistory",
            Self::IsActive => "isActive",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == key)
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Ci | Self::Name | Self::Phone => FieldKind::RequiredText,
            Self::Email => FieldKind::Email,
            Self::BirthDate | Self::PolicyStartDate | Self::PolicyEndDate => FieldKind::Date,
            Self::Age => FieldKind::Age,
            Self::MaxCoverageAmount => FieldKind::Amount,
            Self::UsedCoverageAmount => FieldKind::RequiredAmount,
            Self::IsActive => FieldKind::Flag,
            Self::PolicyStatus => FieldKind::Status,
            _ => FieldKind::Text,
        }
    }

    /// Convert one JSON value into the bound SQL value for this column.
    fn to_sql(self, value: &serde_json::Value) -> Result<Value, String> {
        use serde_json::Value as J;
        let kind = self.kind();
        if value.is_null() {
            return match kind {
                FieldKind::RequiredText
                | FieldKind::RequiredAmount
                | FieldKind::Flag
                | FieldKind::Status => Err("This field cannot be null".into()),
                _ => Ok(Value::Null),
            };
        }
        match kind {
            FieldKind::RequiredText | FieldKind::Text | FieldKind::Email => {
                let J::String(s) = value else {
                    return Err("Expected a string".into());
                };
                let s = s.trim();
                match kind {
                    FieldKind::RequiredText if s.is_empty() => {
                        Err("This field is required".into())
                    }
                    FieldKind::Email if !s.is_empty() && !s.contains('@') => {
                        Err("Invalid email address".into())
                    }
                    _ if s.is_empty() => Ok(Value::Null),
                    _ => Ok(Value::Text(s.to_string())),
                }
            }
            FieldKind::Date => {
                let J::String(s) = value else {
                    return Err("Expected a YYYY-MM-DD date".into());
                };
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .map(|d| Value::Text(d.format(DATE_FORMAT).to_string()))
                    .map_err(|_| format!("Expected a YYYY-MM-DD date, got '{s}'"))
            }
            FieldKind::Age => match value.as_i64() {
                Some(n) if n >= 0 => Ok(Value::Integer(n)),
                Some(_) => Err("Age cannot be negative".into()),
                None => Err("Expected a whole number".into()),
            },
            FieldKind::Amount | FieldKind::RequiredAmount => match value.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => Ok(Value::Real(n)),
                _ => Err("Coverage amount must be a non-negative number".into()),
            },
            FieldKind::Flag => match value {
                J::Bool(b) => Ok(Value::Integer(i64::from(*b))),
                J::Number(n) if n.as_i64() == Some(0) || n.as_i64() == Some(1) => {
                    Ok(Value::Integer(n.as_i64().unwrap_or(0)))
                }
                _ => Err("Expected true or false".into()),
            },
            FieldKind::Status => match value.as_str().map(str::trim) {
                Some(s) if PolicyStatus::parse(s).is_some() => Ok(Value::Text(s.to_string())),
                Some(s) => Err(format!("Unknown policy status '{s}'")),
                None => Err("Expected a string".into()),
            },
        }
    }
}

/// A validated partial update: allow-listed columns with bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct HolderPatch {
    changes: Vec<(HolderField, Value)>,
}

impl HolderPatch {
    /// Build from an arbitrary JSON object. `id` is ignored; any other key
    /// outside the allow-list is a validation error.
    pub fn from_json(body: &serde_json::Map<String, serde_json::Value>) -> HolderResult<Self> {
        let mut errors = BTreeMap::new();
        let mut changes = Vec::new();
        for (key, value) in body {
            if key == "id" {
                continue;
            }
            let Some(field) = HolderField::from_key(key) else {
                errors.insert(key.clone(), "This field cannot be updated".to_string());
                continue;
            };
            match field.to_sql(value) {
                Ok(v) => changes.push((field, v)),
                Err(msg) => {
                    errors.insert(key.clone(), msg);
                }
            }
        }
        if !errors.is_empty() {
            return Err(HolderError::Validation { fields: errors });
        }
        if changes.is_empty() {
            return Err(HolderError::invalid("body", "No fields to update"));
        }
        changes.sort_by_key(|(field, _)| *field);
        Ok(Self { changes })
    }

    /// A new birth date recomputes `age`, unless the patch sets `age` itself.
    pub fn with_derived_age(mut self, today: NaiveDate) -> Self {
        if self.touches(HolderField::Age) {
            return self;
        }
        let birth = self
            .text(HolderField::BirthDate)
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok());
        if let Some(birth) = birth {
            self.changes
                .push((HolderField::Age, Value::Integer(age_on(birth, today))));
            self.changes.sort_by_key(|(field, _)| *field);
        }
        self
    }

    pub fn changes(&self) -> &[(HolderField, Value)] {
        &self.changes
    }

    pub fn touches(&self, field: HolderField) -> bool {
        self.changes.iter().any(|(f, _)| *f == field)
    }

    /// New value for `field`, when the patch sets it to text.
    pub fn text(&self, field: HolderField) -> Option<&str> {
        self.changes.iter().find_map(|(f, v)| match v {
            Value::Text(s) if *f == field => Some(s.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn obj(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let err = NewHolder::default().normalize(today()).unwrap_err();
        let fields = err.field_messages().unwrap();
        assert!(fields.contains_key("ci"));
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("phone"));
    }

    #[test]
    fn whitespace_only_required_field_is_missing() {
        let err = NewHolder::new("  ", "Ana", "0414").normalize(today()).unwrap_err();
        assert!(err.field_messages().unwrap().contains_key("ci"));
    }

    #[test]
    fn defaults_are_applied_on_create() {
        let h = NewHolder::new(" V-1 ", "Ana", "0414").normalize(today()).unwrap();
        assert_eq!(h.ci.as_deref(), Some("V-1"));
        assert_eq!(h.policy_status.as_deref(), Some("Activo"));
        assert_eq!(h.policy_type.as_deref(), Some("Individual"));
        assert_eq!(h.create_as_patient, Some(true));
    }

    #[test]
    fn age_is_derived_from_birth_date() {
        let mut h = NewHolder::new("V-1", "Ana", "0414");
        h.birth_date = Some("1990-06-02".into());
        let h = h.normalize(today()).unwrap();
        assert_eq!(h.age, Some(34));
    }

    #[test]
    fn unknown_status_and_bad_dates_are_rejected() {
        let mut h = NewHolder::new("V-1", "Ana", "0414");
        h.policy_status = Some("Perdido".into());
        h.policy_start_date = Some("2025-02-30".into());
        let fields = h.normalize(today()).unwrap_err().field_messages().unwrap();
        assert!(fields.contains_key("policyStatus"));
        assert!(fields.contains_key("policyStartDate"));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut h = NewHolder::new("V-1", "Ana", "0414");
        h.policy_start_date = Some("2025-05-01".into());
        h.policy_end_date = Some("2025-04-01".into());
        assert!(h.normalize(today()).is_err());
    }

    #[test]
    fn patch_rejects_unknown_columns() {
        let err = HolderPatch::from_json(&obj(json!({ "name": "X", "1=1; DROP TABLE": 1 })))
            .unwrap_err();
        assert!(err.field_messages().unwrap().contains_key("1=1; DROP TABLE"));
    }

    #[test]
    fn patch_ignores_id_and_rejects_empty_set() {
        let err = HolderPatch::from_json(&obj(json!({ "id": "abc" }))).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn patch_type_checks_values() {
        let patch = HolderPatch::from_json(&obj(json!({
            "city": "Valencia",
            "isActive": false,
            "maxCoverageAmount": 1500.5,
            "email": null,
        })))
        .unwrap();
        assert_eq!(patch.changes().len(), 4);
        assert!(patch.touches(HolderField::IsActive));
        assert_eq!(patch.text(HolderField::City), Some("Valencia"));

        let err = HolderPatch::from_json(&obj(json!({ "name": null, "age": -3 }))).unwrap_err();
        let fields = err.field_messages().unwrap();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("age"));
    }

    #[test]
    fn every_column_round_trips_through_its_key() {
        for field in HolderField::ALL {
            assert_eq!(HolderField::from_key(field.column()), Some(field));
        }
        assert_eq!(HolderField::from_key("created_at"), None);
        assert_eq!(HolderField::from_key("totalPatients"), None);
    }
}
