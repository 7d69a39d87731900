//! Token-lifecycle-aware client for the case-status and FOIA API.
//!
//! # Design
//! `ApiClient` owns the environment binding, the cached `TokenState`, and a
//! persistent set of default headers. Every resource operation first makes
//! sure a non-expired token is cached (authenticating inline if not), then
//! issues exactly one HTTP call through the `Transport`.
//!
//! As in a host-does-IO client, each step is split into a `build_*` method
//! that produces an `HttpRequest` and a `parse_*` method that maps an
//! `HttpResponse` to a value or a `ClientError`; `dispatch` and
//! `authenticate` just glue the two around `Transport::execute`.
//!
//! Operations that can touch the token take `&mut self`, so a client shared
//! between threads must sit behind a lock and two callers can never race to
//! re-authenticate and overwrite each other's bearer header.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, Credentials, Environment, SANDBOX_TEST_RECEIPTS};
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::token::TokenState;
use crate::types::{
    BatchOutcome, CaseStatusResult, CheckResult, ConnectionReport, DebugInfo, FoiaRequest,
    FoiaResult, TokenDetails, TokenInfo,
};

/// Longest slice of a response body quoted in a synthesized error message.
const BODY_EXCERPT_CHARS: usize = 200;

const AUTHORIZATION: &str = "Authorization";

/// Blocking client for the case-status and FOIA endpoints.
pub struct ApiClient<T = UreqTransport, C = SystemClock> {
    credentials: Credentials,
    config: ClientConfig,
    token: Option<TokenState>,
    default_headers: Vec<(String, String)>,
    transport: T,
    clock: C,
}

impl ApiClient {
    /// Creates a client using the ureq transport and the system clock.
    pub fn new(credentials: Credentials, config: impl Into<ClientConfig>) -> Self {
        let config = config.into();
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(credentials, config, transport, SystemClock)
    }
}

impl<T: Transport, C: Clock> ApiClient<T, C> {
    pub fn with_transport(
        credentials: Credentials,
        config: ClientConfig,
        transport: T,
        clock: C,
    ) -> Self {
        let mut default_headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if let Some(demo_id) = &config.demo_id {
            default_headers.push(("demo_id".to_string(), demo_id.clone()));
        }
        Self {
            credentials,
            config,
            token: None,
            default_headers,
            transport,
            clock,
        }
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn base_url(&self) -> &str {
        &self.config.endpoints.base_url
    }

    pub fn oauth_url(&self) -> &str {
        &self.config.endpoints.oauth_url
    }

    /// The cached token, expired or not.
    pub fn token(&self) -> Option<&TokenState> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.is_expired_with_clock(&self.clock))
    }

    // -----------------------------------------------------------------------
    // Token lifecycle
    // -----------------------------------------------------------------------

    pub fn build_token_request(&self) -> HttpRequest {
        let body = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        HttpRequest {
            method: HttpMethod::Post,
            url: self.config.endpoints.oauth_url.clone(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        }
    }

    pub fn parse_token_response(
        &self,
        response: HttpResponse,
        issued_at: DateTime<Utc>,
    ) -> Result<TokenState, ClientError> {
        if response.status != 200 {
            #[derive(Deserialize)]
            struct OAuthError {
                error: Option<String>,
            }
            let code = serde_json::from_str::<OAuthError>(&response.body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| "AUTH_ERROR".to_string());
            return Err(ClientError::auth(
                format!("authentication failed: {}", response.status),
                code,
                response.status,
            ));
        }
        TokenState::from_response(&response.body, issued_at).map_err(|e| {
            ClientError::decode(format!("malformed token response: {e}"), response.status)
        })
    }

    /// Runs a client-credentials grant and replaces the cached token.
    ///
    /// On failure the previously cached token, if any, is left untouched.
    pub fn authenticate(&mut self) -> Result<TokenState, ClientError> {
        info!(environment = %self.config.environment, "authenticating");

        let request = self.build_token_request();
        let response = self.transport.execute(&request).map_err(|e| {
            ClientError::transport(format!("network error during authentication: {e}"))
        })?;
        let token = self.parse_token_response(response, self.clock.now())?;

        self.set_default_header(AUTHORIZATION, token.authorization());
        info!(
            expires_in = token.expires_in(),
            api_products = ?token.api_products(),
            "authentication successful"
        );
        self.token = Some(token.clone());
        Ok(token)
    }

    fn ensure_authenticated(&mut self) -> Result<(), ClientError> {
        if !self.is_authenticated() {
            self.authenticate()?;
        }
        Ok(())
    }

    fn set_default_header(&mut self, name: &str, value: String) {
        match self
            .default_headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value,
            None => self.default_headers.push((name.to_string(), value)),
        }
    }

    /// The persistent default headers, with the bearer credential masked.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        self.default_headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION) {
                    (name.clone(), mask_bearer(value))
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Request dispatch
    // -----------------------------------------------------------------------

    /// Builds a request against `base_url + path` carrying the default
    /// headers. Query pairs are percent-encoded.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> HttpRequest {
        let mut url = format!("{}{}", self.config.endpoints.base_url, path);
        if !query.is_empty() {
            let encoded = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&encoded);
        }
        HttpRequest {
            method,
            url,
            headers: self.default_headers.clone(),
            body: body.map(Value::to_string),
        }
    }

    /// Maps a resource response to its decoded JSON body or a `ClientError`.
    pub fn parse_response(&self, url: &str, response: HttpResponse) -> Result<Value, ClientError> {
        if response.status < 400 {
            return serde_json::from_str(&response.body).map_err(|e| {
                ClientError::decode(format!("malformed response from {url}: {e}"), response.status)
            });
        }
        Err(api_error(url, &response))
    }

    /// Authenticates if needed, then issues one call and decodes the reply.
    pub fn dispatch(
        &mut self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        self.exchange(method, path, query, body).map(|(_, body)| body)
    }

    /// `dispatch`, also returning the success status for later decode errors.
    fn exchange(
        &mut self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(u16, Value), ClientError> {
        self.ensure_authenticated()?;

        let request = self.build_request(method, path, query, body);
        info!(method = method.as_str(), url = %request.url, "sending request");
        let response = self
            .transport
            .execute(&request)
            .map_err(|e| ClientError::transport(format!("network error: {e}")))?;
        let status = response.status;
        info!(status, "response received");

        self.parse_response(&request.url, response)
            .map(|body| (status, body))
    }

    // -----------------------------------------------------------------------
    // Case status
    // -----------------------------------------------------------------------

    /// Looks up a case by receipt number. The format is not checked locally;
    /// the server is the authority and rejects bad input with a 4xx.
    pub fn get_case_status(&mut self, receipt_number: &str) -> Result<CaseStatusResult, ClientError> {
        info!(receipt_number, "getting case status");
        let path = format!("/case-status/{}", urlencoding::encode(receipt_number));
        let (status, raw) = self.exchange(HttpMethod::Get, &path, &[], None)?;
        CaseStatusResult::from_body(receipt_number, raw).map_err(|e| {
            ClientError::decode(format!("malformed case status response: {e}"), status)
        })
    }

    /// Looks up each receipt in order. A failed lookup is recorded and the
    /// batch carries on. A repeated receipt keeps only its last outcome.
    pub fn get_case_status_batch<I, S>(&mut self, receipt_numbers: I) -> BatchOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = BatchOutcome::default();
        let mut requested = 0usize;
        for receipt in receipt_numbers {
            let receipt = receipt.as_ref();
            requested += 1;
            match self.get_case_status(receipt) {
                Ok(status) => {
                    outcome.errors.remove(receipt);
                    outcome.results.insert(receipt.to_string(), status);
                }
                Err(err) => {
                    error!(receipt_number = receipt, error = %err, "case status lookup failed");
                    outcome.results.remove(receipt);
                    outcome.errors.insert(receipt.to_string(), err.to_string());
                }
            }
        }
        if !outcome.errors.is_empty() {
            warn!(
                failed = outcome.errors.len(),
                requested, "batch finished with errors"
            );
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // FOIA
    // -----------------------------------------------------------------------

    pub fn create_foia_request(&mut self, request: &FoiaRequest) -> Result<FoiaResult, ClientError> {
        info!(request_type = %request.request_type, "creating FOIA request");
        let payload = request.payload();
        let (status, raw) = self.exchange(HttpMethod::Post, "/foia/request", &[], Some(&payload))?;
        FoiaResult::from_body(raw)
            .map_err(|e| ClientError::decode(format!("malformed FOIA response: {e}"), status))
    }

    pub fn get_foia_status(&mut self, request_number: &str) -> Result<FoiaResult, ClientError> {
        info!(request_number, "getting FOIA status");
        let path = format!("/foia/status/{}", urlencoding::encode(request_number));
        let (status, raw) = self.exchange(HttpMethod::Get, &path, &[], None)?;
        let mut result = FoiaResult::from_body(raw)
            .map_err(|e| ClientError::decode(format!("malformed FOIA response: {e}"), status))?;
        result.request_number = Some(request_number.to_string());
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub fn get_token_info(&self) -> TokenInfo {
        let now = self.clock.now();
        TokenInfo {
            authenticated: self.token.is_some(),
            token: self.token.as_ref().map(|token| TokenDetails {
                token_type: token.token_type().to_string(),
                expires_in: token.expires_in(),
                issued_at: token.issued_at(),
                expires_at: token.expires_at(),
                is_expired: token.is_expired_at(now),
                seconds_remaining: token.seconds_remaining_at(now),
                api_products: token.api_products().to_vec(),
                environment: self.config.environment,
            }),
        }
    }

    /// Forces a fresh authentication, then (in the sandbox only) looks up the
    /// first known-good test receipt. Stops after a failed authentication.
    pub fn test_connection(&mut self) -> ConnectionReport {
        let mut report = ConnectionReport {
            environment: self.config.environment,
            timestamp: self.clock.now(),
            authentication: CheckResult::default(),
            case_status_api: CheckResult::default(),
        };

        match self.authenticate() {
            Ok(_) => {
                report.authentication = CheckResult {
                    success: true,
                    token_info: Some(self.get_token_info()),
                    ..CheckResult::default()
                };
            }
            Err(err) => {
                warn!(error = %err, "connection test: authentication failed");
                report.authentication = CheckResult {
                    success: false,
                    error: Some(err.to_string()),
                    code: err.code,
                    ..CheckResult::default()
                };
                return report;
            }
        }

        if self.config.environment == Environment::Sandbox {
            let receipt = SANDBOX_TEST_RECEIPTS[0];
            report.case_status_api = match self.get_case_status(receipt) {
                Ok(status) => CheckResult {
                    success: true,
                    test_receipt: Some(receipt.to_string()),
                    form_type: Some(status.form_type),
                    status: Some(status.status_text_en),
                    ..CheckResult::default()
                },
                Err(err) => CheckResult {
                    success: false,
                    test_receipt: Some(receipt.to_string()),
                    error: Some(err.to_string()),
                    code: err.code,
                    ..CheckResult::default()
                },
            };
        } else {
            debug!("connection test: case status check only runs in the sandbox");
        }

        report
    }

    pub fn get_debug_info(&self) -> DebugInfo {
        let base = self.base_url();
        DebugInfo {
            environment: self.config.environment,
            base_url: base.to_string(),
            oauth_url: self.oauth_url().to_string(),
            case_status_endpoint: format!("{base}/case-status/{{receipt_number}}"),
            foia_request_endpoint: format!("{base}/foia/request"),
            foia_status_endpoint: format!("{base}/foia/status/{{request_number}}"),
            is_authenticated: self.is_authenticated(),
            token_info: self.token.as_ref().map(|_| self.get_token_info()),
            sandbox_test_receipts: SANDBOX_TEST_RECEIPTS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(rename = "traceId", default)]
    trace_id: Option<String>,
}

/// Builds the error for a status >= 400, preferring the server's own
/// `errors[0]` entry and synthesizing a message by status class otherwise.
fn api_error(url: &str, response: &HttpResponse) -> ClientError {
    let status = response.status;
    let first = serde_json::from_str::<ErrorEnvelope>(&response.body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next());
    let (message, code, trace_id) = match first {
        Some(entry) => (entry.message, entry.code, entry.trace_id),
        None => (None, None, None),
    };

    let message = message.filter(|m| !m.is_empty()).unwrap_or_else(|| {
        let body = excerpt(&response.body);
        match status {
            503 => format!(
                "API unavailable (503). URL: {url}. Response: {}",
                if body.is_empty() { "empty" } else { body }
            ),
            401 => "Authentication failed - check your credentials".to_string(),
            404 => format!("Endpoint not found: {url}"),
            _ => format!(
                "API error {status}: {}",
                if body.is_empty() { "no response body" } else { body }
            ),
        }
    });
    let code = code.unwrap_or_else(|| format!("HTTP_{status}"));

    ClientError::api(message, code, status, trace_id)
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn mask_bearer(value: &str) -> String {
    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    let shown: String = token.chars().take(8).collect();
    format!("Bearer {shown}...")
}
