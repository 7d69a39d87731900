//! Result models for the case-status and FOIA endpoints, plus the
//! display-oriented projections returned by the diagnostic operations.
//!
//! # Design
//! Every result keeps the raw decoded body next to the extracted fields so
//! callers can show what the server actually sent. Extraction goes through
//! private serde DTOs; a body missing the expected nested object fails to
//! decode instead of producing an empty result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Environment;

/// One entry of a case's status history. Values are kept as the server sent
/// them; keys other than the known three land in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default)]
    pub completed_text_en: Option<Value>,
    #[serde(default)]
    pub completed_text_es: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a successful case-status lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStatusResult {
    pub receipt_number: String,
    pub form_type: String,
    pub submitted_date: Option<String>,
    pub modified_date: Option<String>,
    pub status_text_en: String,
    pub status_desc_en: String,
    pub status_text_es: Option<String>,
    pub status_desc_es: Option<String>,
    pub history: Option<Vec<StatusChange>>,
    pub raw_response: Value,
}

#[derive(Deserialize)]
struct CaseStatusEnvelope {
    case_status: CaseStatusBody,
}

#[derive(Deserialize)]
struct CaseStatusBody {
    #[serde(rename = "receiptNumber", default)]
    receipt_number: Option<String>,
    #[serde(rename = "formType", default)]
    form_type: Option<String>,
    #[serde(rename = "submittedDate", default)]
    submitted_date: Option<String>,
    #[serde(rename = "modifiedDate", default)]
    modified_date: Option<String>,
    #[serde(rename = "current_case_status_text_en", default)]
    text_en: Option<String>,
    #[serde(rename = "current_case_status_desc_en", default)]
    desc_en: Option<String>,
    #[serde(rename = "current_case_status_text_es", default)]
    text_es: Option<String>,
    #[serde(rename = "current_case_status_desc_es", default)]
    desc_es: Option<String>,
    #[serde(rename = "hist_case_status", default)]
    history: Option<Vec<StatusChange>>,
}

impl CaseStatusResult {
    /// Extracts the `case_status` object from a decoded 2xx body. The
    /// requested receipt number is used when the server does not echo one.
    pub fn from_body(requested: &str, raw: Value) -> Result<Self, serde_json::Error> {
        let envelope = CaseStatusEnvelope::deserialize(&raw)?;
        let body = envelope.case_status;
        Ok(Self {
            receipt_number: body
                .receipt_number
                .unwrap_or_else(|| requested.to_string()),
            form_type: body.form_type.unwrap_or_default(),
            submitted_date: body.submitted_date,
            modified_date: body.modified_date,
            status_text_en: body.text_en.unwrap_or_default(),
            status_desc_en: body.desc_en.unwrap_or_default(),
            status_text_es: body.text_es,
            status_desc_es: body.desc_es,
            history: body.history,
            raw_response: raw,
        })
    }
}

/// Outcome of a FOIA create or status call. Creation fills
/// `request_number`; a status check fills `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoiaResult {
    pub request_number: Option<String>,
    pub status: Option<String>,
    pub created_date: Option<String>,
    pub raw_response: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoiaBody {
    #[serde(default)]
    request_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_date: Option<String>,
}

impl FoiaResult {
    pub fn from_body(raw: Value) -> Result<Self, serde_json::Error> {
        let body = FoiaBody::deserialize(&raw)?;
        Ok(Self {
            request_number: body.request_number,
            status: body.status,
            created_date: body.created_date,
            raw_response: raw,
        })
    }
}

pub const DEFAULT_FOIA_REQUEST_TYPE: &str = "ALIEN_FILE";

/// Input for `ApiClient::create_foia_request`.
///
/// Presence of the four subject fields is the caller's concern; empty
/// strings are forwarded as-is and the server decides.
#[derive(Debug, Clone, PartialEq)]
pub struct FoiaRequest {
    pub subject_first_name: String,
    pub subject_last_name: String,
    pub subject_dob: String,
    pub subject_country_of_birth: String,
    pub a_number: Option<String>,
    pub requester_email: Option<String>,
    pub request_type: String,
    pub extra_fields: Map<String, Value>,
}

impl FoiaRequest {
    pub fn new(
        subject_first_name: impl Into<String>,
        subject_last_name: impl Into<String>,
        subject_dob: impl Into<String>,
        subject_country_of_birth: impl Into<String>,
    ) -> Self {
        Self {
            subject_first_name: subject_first_name.into(),
            subject_last_name: subject_last_name.into(),
            subject_dob: subject_dob.into(),
            subject_country_of_birth: subject_country_of_birth.into(),
            a_number: None,
            requester_email: None,
            request_type: DEFAULT_FOIA_REQUEST_TYPE.to_string(),
            extra_fields: Map::new(),
        }
    }

    pub fn a_number(mut self, a_number: impl Into<String>) -> Self {
        self.a_number = Some(a_number.into());
        self
    }

    pub fn requester_email(mut self, email: impl Into<String>) -> Self {
        self.requester_email = Some(email.into());
        self
    }

    pub fn request_type(mut self, request_type: impl Into<String>) -> Self {
        self.request_type = request_type.into();
        self
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    /// The camelCase JSON body sent to the server. Blank optional fields are
    /// omitted; extra fields are merged last and win on key collisions.
    pub fn payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("subjectFirstName".into(), self.subject_first_name.clone().into());
        body.insert("subjectLastName".into(), self.subject_last_name.clone().into());
        body.insert("subjectDateOfBirth".into(), self.subject_dob.clone().into());
        body.insert(
            "subjectCountryOfBirth".into(),
            self.subject_country_of_birth.clone().into(),
        );
        body.insert("requestType".into(), self.request_type.clone().into());
        if let Some(a_number) = self.a_number.as_deref().filter(|s| !s.is_empty()) {
            body.insert("alienNumber".into(), a_number.into());
        }
        if let Some(email) = self.requester_email.as_deref().filter(|s| !s.is_empty()) {
            body.insert("requesterEmail".into(), email.into());
        }
        for (key, value) in &self.extra_fields {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }
}

/// Results of a best-effort batch lookup, keyed by the requested receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub results: BTreeMap<String, CaseStatusResult>,
    pub errors: BTreeMap<String, String>,
}

/// Display projection of the cached token. Token fields are absent when no
/// token has been obtained yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenInfo {
    pub authenticated: bool,
    #[serde(flatten)]
    pub token: Option<TokenDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenDetails {
    pub token_type: String,
    pub expires_in: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub seconds_remaining: u64,
    pub api_products: Vec<String>,
    pub environment: Environment,
}

/// Report produced by `ApiClient::test_connection`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub environment: Environment,
    pub timestamp: DateTime<Utc>,
    pub authentication: CheckResult,
    pub case_status_api: CheckResult,
}

/// One step of the connection self-test.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_info: Option<TokenInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Static view of the client's wiring, for troubleshooting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    pub environment: Environment,
    pub base_url: String,
    pub oauth_url: String,
    pub case_status_endpoint: String,
    pub foia_request_endpoint: String,
    pub foia_status_endpoint: String,
    pub is_authenticated: bool,
    pub token_info: Option<TokenInfo>,
    pub sandbox_test_receipts: Vec<String>,
}
