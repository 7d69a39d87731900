use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_CLIENT_ID: &str = "mock-client-id";
pub const DEFAULT_CLIENT_SECRET: &str = "mock-client-secret";

/// Receipts answered with a 200, as in the real sandbox.
pub const KNOWN_RECEIPTS: [(&str, &str, &str); 3] = [
    ("EAC9999103402", "I-130", "Case Approval Was Affirmed"),
    ("WAC9999103402", "I-765", "Case Was Received"),
    ("LIN9999103402", "I-485", "Card Was Delivered To Me By The Post Office"),
];

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub client_id: String,
    pub client_secret: String,
    pub expires_in: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: DEFAULT_CLIENT_SECRET.to_string(),
            expires_in: 1799,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoiaRecord {
    pub request_number: String,
    pub status: String,
    pub created_date: String,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub config: MockConfig,
    tokens: RwLock<HashSet<String>>,
    foia: RwLock<HashMap<String, FoiaRecord>>,
    token_grants: AtomicUsize,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of successful client-credentials grants served so far.
    pub fn token_grants(&self) -> usize {
        self.token_grants.load(Ordering::SeqCst)
    }
}

pub type Shared = Arc<MockState>;

pub fn app() -> Router {
    app_with_state(Arc::new(MockState::new(MockConfig::default())))
}

pub fn app_with_state(state: Shared) -> Router {
    Router::new()
        .route("/oauth/accesstoken", post(issue_token))
        .route("/case-status/{receipt}", get(case_status))
        .route("/foia/request", post(create_foia))
        .route("/foia/status/{number}", get(foia_status))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: Shared) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

#[derive(Deserialize)]
pub struct TokenGrant {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

async fn issue_token(State(state): State<Shared>, Form(grant): Form<TokenGrant>) -> Response {
    let valid = grant.grant_type.as_deref() == Some("client_credentials")
        && grant.client_id.as_deref() == Some(state.config.client_id.as_str())
        && grant.client_secret.as_deref() == Some(state.config.client_secret.as_str());
    if !valid {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"}))).into_response();
    }

    let token = Uuid::new_v4().simple().to_string();
    state.tokens.write().await.insert(token.clone());
    state.token_grants.fetch_add(1, Ordering::SeqCst);
    tracing::debug!("issued access token");

    Json(json!({
        "access_token": token,
        "token_type": "BearerToken",
        "expires_in": state.config.expires_in.to_string(),
        "api_product_list_json": "[CaseStatus, FOIA]",
    }))
    .into_response()
}

async fn case_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(receipt): Path<String>,
) -> Response {
    if !authorized(&state, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !is_receipt_number(&receipt) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "INVALID_RECEIPT_NUMBER",
            "The receipt number entered is invalid. Please check and try again.",
        );
    }
    let Some((_, form, status)) = KNOWN_RECEIPTS.iter().find(|(r, _, _)| *r == receipt) else {
        return error_response(StatusCode::NOT_FOUND, "CASE_NOT_FOUND", "No case matches this receipt number.");
    };

    Json(json!({
        "case_status": {
            "receiptNumber": receipt,
            "formType": form,
            "submittedDate": "09-05-2023 14:43:48",
            "modifiedDate": "09-05-2023 14:45:51",
            "current_case_status_text_en": status,
            "current_case_status_desc_en": format!("Your {form} case status is: {status}."),
            "current_case_status_text_es": "Estado del caso",
            "current_case_status_desc_es": format!("El estado de su caso {form} fue actualizado."),
            "hist_case_status": [
                {"date": "09-05-2023", "completed_text_en": "Case Was Received", "completed_text_es": "Caso fue recibido"}
            ]
        },
        "message": "Query was successful"
    }))
    .into_response()
}

const REQUIRED_FOIA_FIELDS: [&str; 4] = [
    "subjectFirstName",
    "subjectLastName",
    "subjectDateOfBirth",
    "subjectCountryOfBirth",
];

async fn create_foia(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Map<String, Value>>,
) -> Response {
    if !authorized(&state, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let missing: Vec<&str> = REQUIRED_FOIA_FIELDS
        .iter()
        .copied()
        .filter(|f| body.get(*f).and_then(Value::as_str).map_or(true, str::is_empty))
        .collect();
    if !missing.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "MISSING_REQUIRED_FIELD",
            &format!("Missing required fields: {}", missing.join(", ")),
        );
    }

    let record = FoiaRecord {
        request_number: format!("FOIA-{}", &Uuid::new_v4().simple().to_string()[..10]).to_uppercase(),
        status: "RECEIVED".to_string(),
        created_date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
    };
    state
        .foia
        .write()
        .await
        .insert(record.request_number.clone(), record.clone());
    Json(record).into_response()
}

async fn foia_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(number): Path<String>,
) -> Response {
    if !authorized(&state, &headers).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.foia.read().await.get(&number) {
        Some(record) => Json(json!({
            "requestNumber": record.request_number,
            "status": record.status,
        }))
        .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "REQUEST_NOT_FOUND", "No FOIA request matches this number."),
    }
}

async fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return false;
    };
    state.tokens.read().await.contains(token)
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({
        "errors": [{
            "code": code,
            "message": message,
            "traceId": Uuid::new_v4().to_string(),
        }]
    });
    (status, Json(body)).into_response()
}

/// Three letters followed by ten digits.
pub fn is_receipt_number(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 13
        && bytes[..3].iter().all(u8::is_ascii_alphabetic)
        && bytes[3..].iter().all(u8::is_ascii_digit)
}
