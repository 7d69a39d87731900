//! Scripted transport and helpers shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::client::ApiClient;
use crate::clock::ManualClock;
use crate::config::{ClientConfig, Credentials, Endpoints, Environment};
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};

pub(crate) const BASE_URL: &str = "https://api.test";
pub(crate) const OAUTH_URL: &str = "https://api.test/oauth/accesstoken";

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError>>;

/// Every request the scripted transport has seen, in order.
#[derive(Clone, Default)]
pub(crate) struct RequestLog(Rc<RefCell<Vec<HttpRequest>>>);

impl RequestLog {
    pub(crate) fn all(&self) -> Vec<HttpRequest> {
        self.0.borrow().clone()
    }

    pub(crate) fn token_requests(&self) -> usize {
        self.0.borrow().iter().filter(|r| r.url == OAUTH_URL).count()
    }

    pub(crate) fn resource_requests(&self) -> Vec<HttpRequest> {
        self.0
            .borrow()
            .iter()
            .filter(|r| r.url != OAUTH_URL)
            .cloned()
            .collect()
    }
}

pub(crate) struct ScriptedTransport {
    handler: Handler,
    log: RequestLog,
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.log.0.borrow_mut().push(request.clone());
        (self.handler)(request)
    }
}

pub(crate) fn respond(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status,
        body: body.to_string(),
    })
}

pub(crate) fn token_body(expires_in: u64) -> String {
    format!(
        r#"{{"access_token":"tok-123456789","token_type":"Bearer","expires_in":{expires_in},"api_product_list_json":["CaseStatus"]}}"#
    )
}

pub(crate) fn case_status_body(receipt: &str) -> String {
    format!(
        r#"{{"case_status":{{"receiptNumber":"{receipt}","formType":"I-130","submittedDate":"09-05-2023","modifiedDate":"09-06-2023","current_case_status_text_en":"Case Was Approved","current_case_status_desc_en":"We approved your case."}},"message":"Query was successful"}}"#
    )
}

pub(crate) fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

pub(crate) fn config(environment: Environment) -> ClientConfig {
    ClientConfig::new(environment).with_endpoints(Endpoints::new(BASE_URL, OAUTH_URL))
}

/// Builds a client whose token endpoint always succeeds and whose resource
/// calls are answered by `handler`.
pub(crate) fn client_with(
    environment: Environment,
    handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + 'static,
) -> (ApiClient<ScriptedTransport, ManualClock>, RequestLog, ManualClock) {
    raw_client_with(environment, move |req| {
        if req.url == OAUTH_URL {
            respond(200, &token_body(1799))
        } else {
            handler(req)
        }
    })
}

/// Like `client_with`, but `handler` also answers the token endpoint.
pub(crate) fn raw_client_with(
    environment: Environment,
    handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + 'static,
) -> (ApiClient<ScriptedTransport, ManualClock>, RequestLog, ManualClock) {
    client_with_config(config(environment), handler)
}

pub(crate) fn client_with_config(
    config: ClientConfig,
    handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + 'static,
) -> (ApiClient<ScriptedTransport, ManualClock>, RequestLog, ManualClock) {
    let log = RequestLog::default();
    let clock = ManualClock::new(start_time());
    let transport = ScriptedTransport {
        handler: Box::new(handler),
        log: log.clone(),
    };
    let client = ApiClient::with_transport(
        Credentials::new("client-id", "client-secret"),
        config,
        transport,
        clock.clone(),
    );
    (client, log, clock)
}
