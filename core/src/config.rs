//! Environment selection, endpoints, and client construction settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

pub const SANDBOX_BASE_URL: &str = "https://api-int.uscis.gov";
pub const SANDBOX_OAUTH_URL: &str = "https://api-int.uscis.gov/oauth/accesstoken";
pub const PRODUCTION_BASE_URL: &str = "https://api.uscis.gov";
pub const PRODUCTION_OAUTH_URL: &str = "https://api.uscis.gov/oauth/accesstoken";

/// Receipt numbers the sandbox always answers with a 200.
pub const SANDBOX_TEST_RECEIPTS: [&str; 3] = ["EAC9999103402", "WAC9999103402", "LIN9999103402"];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which deployment of the API a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }

    pub fn endpoints(self) -> Endpoints {
        match self {
            Environment::Sandbox => Endpoints::new(SANDBOX_BASE_URL, SANDBOX_OAUTH_URL),
            Environment::Production => Endpoints::new(PRODUCTION_BASE_URL, PRODUCTION_OAUTH_URL),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an environment name is neither `sandbox` nor `production`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment `{0}`, expected `sandbox` or `production`")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "production" => Ok(Environment::Production),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

/// Resource base URL and OAuth token URL for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoints {
    pub base_url: String,
    pub oauth_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str, oauth_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            oauth_url: oauth_url.to_string(),
        }
    }
}

/// OAuth client-credentials pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Settings fixed for the lifetime of an `ApiClient`.
///
/// The environment label is kept even when `with_endpoints` points the
/// client somewhere else, since the connection self-test branches on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub environment: Environment,
    pub endpoints: Endpoints,
    pub demo_id: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            endpoints: environment.endpoints(),
            demo_id: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_demo_id(mut self, demo_id: impl Into<String>) -> Self {
        self.demo_id = Some(demo_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<Environment> for ClientConfig {
    fn from(environment: Environment) -> Self {
        Self::new(environment)
    }
}
