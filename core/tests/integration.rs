//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port on its own runtime
//! thread, then drives the real `ApiClient` over HTTP with the ureq
//! transport. Token grants are counted on the server side.

use std::sync::Arc;
use std::time::Duration;

use case_status_core::{
    generate_traffic, ApiClient, ClientConfig, Credentials, Endpoints, Environment, ErrorKind,
    FoiaRequest, ManualClock, TrafficPlan, UreqTransport,
};
use chrono::Utc;
use mock_server::{MockConfig, MockState, DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET};

struct Server {
    base_url: String,
    state: Arc<MockState>,
}

fn start_server(config: MockConfig) -> Server {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let state = Arc::new(MockState::new(config));
    let server_state = state.clone();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_state(listener, server_state).await
        })
        .unwrap();
    });

    Server {
        base_url: format!("http://{addr}"),
        state,
    }
}

fn config_for(server: &Server, environment: Environment) -> ClientConfig {
    ClientConfig::new(environment)
        .with_endpoints(Endpoints::new(
            &server.base_url,
            &format!("{}/oauth/accesstoken", server.base_url),
        ))
        .with_timeout(Duration::from_secs(5))
}

fn credentials() -> Credentials {
    Credentials::new(DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET)
}

#[test]
fn case_status_lifecycle() {
    let server = start_server(MockConfig::default());
    let mut client = ApiClient::new(credentials(), config_for(&server, Environment::Sandbox));

    // Step 1: first lookup authenticates lazily.
    let status = client.get_case_status("EAC9999103402").unwrap();
    assert_eq!(status.receipt_number, "EAC9999103402");
    assert_eq!(status.form_type, "I-130");
    assert_eq!(status.status_text_en, "Case Approval Was Affirmed");
    assert!(status.status_text_es.is_some());
    assert_eq!(status.history.as_ref().map(Vec::len), Some(1));
    assert_eq!(server.state.token_grants(), 1);

    // Step 2: token is coerced from the server's string lifetime and product list.
    let token = client.token().unwrap();
    assert_eq!(token.expires_in(), 1799);
    assert_eq!(token.api_products(), ["[CaseStatus, FOIA]"]);

    // Step 3: malformed receipt surfaces the server's structured error.
    let err = client.get_case_status("INVALID").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Api);
    assert_eq!(err.status, Some(400));
    assert_eq!(err.code.as_deref(), Some("INVALID_RECEIPT_NUMBER"));
    assert!(err.trace_id.is_some());

    // Step 4: batch keeps going past failures.
    let outcome = client.get_case_status_batch(["WAC9999103402", "ABC0000000000", "LIN9999103402"]);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results["LIN9999103402"].form_type, "I-485");
    assert!(outcome.errors.contains_key("ABC0000000000"));

    // Step 5: the cached token served every call.
    assert_eq!(server.state.token_grants(), 1);
}

#[test]
fn foia_request_lifecycle() {
    let server = start_server(MockConfig::default());
    let mut client = ApiClient::new(credentials(), config_for(&server, Environment::Sandbox));

    let request = FoiaRequest::new("Jane", "Doe", "01-01-1980", "Canada")
        .requester_email("jane@example.com");
    let created = client.create_foia_request(&request).unwrap();
    let number = created.request_number.clone().unwrap();
    assert_eq!(created.status.as_deref(), Some("RECEIVED"));
    assert!(created.created_date.is_some());

    let status = client.get_foia_status(&number).unwrap();
    assert_eq!(status.request_number.as_deref(), Some(number.as_str()));
    assert_eq!(status.status.as_deref(), Some("RECEIVED"));

    let err = client.get_foia_status("FOIA-MISSING").unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(err.code.as_deref(), Some("REQUEST_NOT_FOUND"));

    let err = client
        .create_foia_request(&FoiaRequest::new("", "Doe", "01-01-1980", "Canada"))
        .unwrap_err();
    assert_eq!(err.status, Some(400));
    assert_eq!(err.code.as_deref(), Some("MISSING_REQUIRED_FIELD"));
}

#[test]
fn expired_token_is_refreshed_once() {
    let server = start_server(MockConfig {
        expires_in: 120,
        ..MockConfig::default()
    });
    let config = config_for(&server, Environment::Sandbox);
    let clock = ManualClock::new(Utc::now());
    let transport = UreqTransport::new(config.timeout);
    let mut client = ApiClient::with_transport(credentials(), config, transport, clock.clone());

    client.get_case_status("EAC9999103402").unwrap();
    client.get_case_status("EAC9999103402").unwrap();
    assert_eq!(server.state.token_grants(), 1);

    clock.advance(60);
    client.get_case_status("EAC9999103402").unwrap();
    assert_eq!(server.state.token_grants(), 2);
}

#[test]
fn bad_credentials_fail_authentication() {
    let server = start_server(MockConfig::default());
    let mut client = ApiClient::new(
        Credentials::new(DEFAULT_CLIENT_ID, "wrong"),
        config_for(&server, Environment::Sandbox),
    );

    let err = client.get_case_status("EAC9999103402").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.status, Some(401));
    assert_eq!(err.code.as_deref(), Some("invalid_client"));
    assert!(!client.is_authenticated());

    let report = client.test_connection();
    assert!(!report.authentication.success);
    assert!(report.case_status_api.test_receipt.is_none());
}

#[test]
fn connection_test_against_sandbox() {
    let server = start_server(MockConfig::default());
    let mut client = ApiClient::new(credentials(), config_for(&server, Environment::Sandbox));

    let report = client.test_connection();
    assert!(report.authentication.success);
    assert!(report.case_status_api.success);
    assert_eq!(report.case_status_api.form_type.as_deref(), Some("I-130"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["environment"], "sandbox");
    assert_eq!(json["authentication"]["token_info"]["authenticated"], true);
}

#[test]
fn traffic_generator_produces_ok_and_4xx() {
    let server = start_server(MockConfig::default());
    let mut client = ApiClient::new(credentials(), config_for(&server, Environment::Sandbox));

    let plan = TrafficPlan {
        success_requests: 3,
        error_requests: 5,
        delay: Duration::ZERO,
    };
    let report = generate_traffic(&mut client, &plan);
    assert_eq!(report.ok_responses, 3);
    assert_eq!(report.client_error_responses, 5);
    assert_eq!(report.other_failures, 0);
    assert_eq!(report.total, 8);
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let config = ClientConfig::new(Environment::Sandbox)
        .with_endpoints(Endpoints::new("http://127.0.0.1:9", "http://127.0.0.1:9/oauth/accesstoken"))
        .with_timeout(Duration::from_secs(2));
    let mut client = ApiClient::new(credentials(), config);

    let err = client.authenticate().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transport);
    assert!(err.status.is_none());
    assert!(err.message.starts_with("network error during authentication"));
}
