//! Bulk traffic generation for demonstrating 2xx and 4xx responses.
//!
//! Runs a fixed number of lookups against the known-good sandbox receipts,
//! then a fixed number against inputs the server rejects. Every failure is
//! logged and counted; nothing aborts the run.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::clock::Clock;
use crate::config::SANDBOX_TEST_RECEIPTS;
use crate::http::Transport;

/// Inputs the server is expected to reject with a 4xx.
pub const INVALID_RECEIPTS: [&str; 5] = ["INVALID", "XXX000", "ABC", "123", "!@#"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficPlan {
    pub success_requests: usize,
    pub error_requests: usize,
    pub delay: Duration,
}

impl Default for TrafficPlan {
    fn default() -> Self {
        Self {
            success_requests: 10,
            error_requests: 5,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrafficReport {
    pub ok_responses: usize,
    pub client_error_responses: usize,
    /// 5xx, transport, and decode failures.
    pub other_failures: usize,
    /// Lookups meant to fail that came back 2xx.
    pub unexpected_successes: usize,
    pub total: usize,
}

pub fn generate_traffic<T: Transport, C: Clock>(
    client: &mut ApiClient<T, C>,
    plan: &TrafficPlan,
) -> TrafficReport {
    let mut report = TrafficReport::default();
    let total = plan.success_requests + plan.error_requests;

    let valid = SANDBOX_TEST_RECEIPTS.iter().cycle().take(plan.success_requests);
    let invalid = INVALID_RECEIPTS.iter().cycle().take(plan.error_requests);
    let requests = valid.map(|r| (*r, true)).chain(invalid.map(|r| (*r, false)));

    for (idx, (receipt, expect_ok)) in requests.enumerate() {
        if idx > 0 && !plan.delay.is_zero() {
            thread::sleep(plan.delay);
        }
        report.total += 1;
        match client.get_case_status(receipt) {
            Ok(_) => {
                report.ok_responses += 1;
                if !expect_ok {
                    report.unexpected_successes += 1;
                    warn!(receipt_number = receipt, "expected a rejection, got 200");
                }
                info!(n = idx + 1, total, receipt_number = receipt, "200 OK");
            }
            Err(err) if err.is_client_error_status() => {
                report.client_error_responses += 1;
                info!(n = idx + 1, total, receipt_number = receipt, status = ?err.status, "4xx");
            }
            Err(err) => {
                report.other_failures += 1;
                warn!(n = idx + 1, total, receipt_number = receipt, error = %err, "request failed");
            }
        }
    }

    report
}
