//! Blocking client core for the case-status and FOIA API.
//!
//! # Overview
//! Authenticates with an OAuth2 client-credentials grant, caches the bearer
//! token with a safety buffer before expiry, re-authenticates lazily before
//! each call, and maps every transport and HTTP failure to a `ClientError`.
//!
//! # Design
//! - `ApiClient` is a plain stateful value owned by its caller; no globals.
//! - Each call is split into `build_*` (produces an `HttpRequest`) and
//!   `parse_*` (consumes an `HttpResponse`), joined by a `Transport`.
//! - `UreqTransport` is the blocking production transport; tests substitute
//!   scripted transports and a `ManualClock`.
//! - No retries anywhere: a failed call is reported immediately.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod token;
pub mod traffic;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ClientConfig, Credentials, Endpoints, Environment, UnknownEnvironment, SANDBOX_TEST_RECEIPTS,
};
pub use error::{ClientError, ErrorKind, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use token::TokenState;
pub use traffic::{generate_traffic, TrafficPlan, TrafficReport, INVALID_RECEIPTS};
pub use types::{
    BatchOutcome, CaseStatusResult, CheckResult, ConnectionReport, DebugInfo, FoiaRequest,
    FoiaResult, StatusChange, TokenDetails, TokenInfo,
};
