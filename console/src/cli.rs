use std::time::Duration;

use case_status_core::types::DEFAULT_FOIA_REQUEST_TYPE;
use case_status_core::{ClientConfig, Credentials, Endpoints, Environment, FoiaRequest, TrafficPlan};
use clap::{Parser, Subcommand};

/// Command-line console for the case-status and FOIA API.
#[derive(Debug, Parser)]
#[command(name = "case-status-console", version)]
pub struct Cli {
    /// OAuth client id issued by the developer portal
    #[arg(long, env = "CASE_API_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret issued by the developer portal
    #[arg(long, env = "CASE_API_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// `sandbox` or `production`
    #[arg(long, env = "CASE_API_ENVIRONMENT", default_value = "sandbox")]
    pub environment: Environment,

    /// Override the environment's resource base URL
    #[arg(long, env = "CASE_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Override the token URL; defaults to `<base-url>/oauth/accesstoken`
    /// when only the base URL is overridden
    #[arg(long, env = "CASE_API_OAUTH_URL")]
    pub oauth_url: Option<String>,

    /// Demo id sent as a `demo_id` header on every resource call
    #[arg(long, env = "CASE_API_DEMO_ID")]
    pub demo_id: Option<String>,

    #[arg(long, env = "CASE_API_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a client-credentials grant and show the token details
    Auth,
    /// Look up one or more receipt numbers
    Status {
        #[arg(required = true)]
        receipts: Vec<String>,
    },
    /// Create a FOIA request
    FoiaCreate {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Date of birth, MM-DD-YYYY
        #[arg(long)]
        dob: String,
        #[arg(long)]
        country: String,
        #[arg(long)]
        a_number: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = DEFAULT_FOIA_REQUEST_TYPE)]
        request_type: String,
        /// Extra payload field, `key=value`; repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Check the status of a FOIA request
    FoiaStatus { number: String },
    /// Authenticate and, in the sandbox, look up a known test receipt
    TestConnection,
    /// Show the cached token (none until a call authenticates)
    TokenInfo,
    /// Show endpoints and authentication state
    Debug,
    /// Show the default request headers after authenticating
    Headers,
    /// Generate a burst of 200 and 4xx lookups
    Traffic {
        #[arg(long, default_value_t = 10)]
        success: usize,
        #[arg(long, default_value_t = 5)]
        errors: usize,
        /// Pause between requests, in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
}

impl Cli {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.client_id.clone(), self.client_secret.clone())
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.environment)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(endpoints) = self.endpoint_override() {
            config = config.with_endpoints(endpoints);
        }
        if let Some(demo_id) = &self.demo_id {
            config = config.with_demo_id(demo_id.clone());
        }
        config
    }

    fn endpoint_override(&self) -> Option<Endpoints> {
        let defaults = self.environment.endpoints();
        match (&self.base_url, &self.oauth_url) {
            (None, None) => None,
            (Some(base), None) => Some(Endpoints::new(
                base,
                &format!("{}/oauth/accesstoken", base.trim_end_matches('/')),
            )),
            (None, Some(oauth)) => Some(Endpoints::new(&defaults.base_url, oauth)),
            (Some(base), Some(oauth)) => Some(Endpoints::new(base, oauth)),
        }
    }
}

impl Command {
    pub fn foia_request(&self) -> Option<FoiaRequest> {
        let Command::FoiaCreate {
            first_name,
            last_name,
            dob,
            country,
            a_number,
            email,
            request_type,
            fields,
        } = self
        else {
            return None;
        };
        let mut request = FoiaRequest::new(first_name, last_name, dob, country)
            .request_type(request_type.clone());
        request.a_number = a_number.clone();
        request.requester_email = email.clone();
        for (key, value) in fields {
            request = request.extra_field(key.clone(), value.clone());
        }
        Some(request)
    }

    pub fn traffic_plan(&self) -> Option<TrafficPlan> {
        match self {
            Command::Traffic {
                success,
                errors,
                delay_ms,
            } => Some(TrafficPlan {
                success_requests: *success,
                error_requests: *errors,
                delay: Duration::from_millis(*delay_ms),
            }),
            _ => None,
        }
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}
