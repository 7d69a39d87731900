//! Error types for the case-status API client.
//!
//! # Design
//! Every failure surfaces as a single `ClientError` carrying the same four
//! fields the upstream API reports (message, machine code, HTTP status, trace
//! id). `ErrorKind` tells callers which layer failed without forcing them to
//! match on a variant per status code. Transport adapters report their own
//! `TransportError`, which the client wraps so that "no HTTP response was
//! obtained" always shows up as `status == None`.

use thiserror::Error;

/// Which layer of a call produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No HTTP response was obtained (DNS, connect, timeout).
    Transport,
    /// The OAuth token endpoint rejected the client-credentials grant.
    Auth,
    /// A resource endpoint answered with status >= 400.
    Api,
    /// A 2xx response could not be decoded into the expected shape.
    Decode,
}

/// Errors returned by every `ApiClient` operation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub trace_id: Option<String>,
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
            code: None,
            status: None,
            trace_id: None,
        }
    }

    pub fn auth(message: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            kind: ErrorKind::Auth,
            message: message.into(),
            code: Some(code.into()),
            status: Some(status),
            trace_id: None,
        }
    }

    pub fn api(
        message: impl Into<String>,
        code: impl Into<String>,
        status: u16,
        trace_id: Option<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Api,
            message: message.into(),
            code: Some(code.into()),
            status: Some(status),
            trace_id,
        }
    }

    /// A 2xx body that did not decode. `status` records the response code.
    pub fn decode(message: impl Into<String>, status: u16) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: message.into(),
            code: Some("MALFORMED_RESPONSE".to_string()),
            status: Some(status),
            trace_id: None,
        }
    }

    /// True for 4xx responses, the class the certification checklist counts.
    pub fn is_client_error_status(&self) -> bool {
        matches!(self.status, Some(400..=499))
    }
}

/// Failure reported by a `Transport` when no response could be obtained.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);
