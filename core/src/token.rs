//! OAuth access-token state and the token endpoint's response format.
//!
//! # Design
//! `TokenState` is an immutable snapshot: fields are private and only
//! readable through accessors, so the client replaces the whole value on each
//! authentication instead of patching it. Expiry is computed against a
//! caller-supplied time (or `Clock`) with a fixed safety buffer, which keeps
//! the buffer law testable without sleeping.
//!
//! The token endpoint is loose about types: `expires_in` may be a number, a
//! numeric string, or missing, and the granted product list may be a bare
//! string or a list. Both ambiguities are resolved here and never leak past
//! this module.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};

/// Seconds before the real expiry at which a token is treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits or garbles `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 1799;

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// A single OAuth access token together with its lifetime information.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
    access_token: String,
    token_type: String,
    expires_in: u64,
    issued_at: DateTime<Utc>,
    api_products: Vec<String>,
}

impl TokenState {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: u64,
        issued_at: DateTime<Utc>,
        api_products: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            issued_at,
            api_products,
        }
    }

    /// Decodes a successful token-endpoint body, stamping it with `issued_at`.
    pub fn from_response(body: &str, issued_at: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        let dto: TokenResponse = serde_json::from_str(body)?;
        Ok(Self {
            access_token: dto.access_token,
            token_type: dto
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expires_in: dto
                .expires_in
                .as_ref()
                .and_then(lifetime_seconds)
                .unwrap_or(DEFAULT_EXPIRES_IN),
            issued_at,
            api_products: dto
                .api_product_list_json
                .map(ProductList::into_vec)
                .unwrap_or_default(),
        })
    }

    #[inline]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[inline]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime in seconds as granted by the authority.
    #[inline]
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    #[inline]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[inline]
    pub fn api_products(&self) -> &[String] {
        &self.api_products
    }

    /// Real expiry instant. Lifetimes past chrono's range saturate at
    /// `DateTime::<Utc>::MAX_UTC`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_with_clock(&SystemClock)
    }

    pub fn is_expired_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_expired_at(clock.now())
    }

    /// True once `time` reaches the expiry minus the safety buffer.
    pub fn is_expired_at(&self, time: DateTime<Utc>) -> bool {
        time >= self.expires_at() - Duration::seconds(EXPIRY_BUFFER_SECS)
    }

    /// Whole seconds until the real expiry, floored at zero.
    pub fn seconds_remaining_at(&self, time: DateTime<Utc>) -> u64 {
        (self.expires_at() - time).num_seconds().max(0) as u64
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("api_products", &self.api_products)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    api_product_list_json: Option<ProductList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProductList {
    One(String),
    Many(Vec<String>),
}

impl ProductList {
    fn into_vec(self) -> Vec<String> {
        match self {
            ProductList::One(product) => vec![product],
            ProductList::Many(products) => products,
        }
    }
}

fn lifetime_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn expiry_respects_safety_buffer() {
        let token = TokenState::new("abc", "Bearer", 1799, t0(), Vec::new());
        assert!(!token.is_expired_at(t0()));
        assert!(!token.is_expired_at(t0() + Duration::seconds(1799 - 61)));
        assert!(token.is_expired_at(t0() + Duration::seconds(1799 - 60)));
        assert!(token.is_expired_at(t0() + Duration::seconds(5000)));
    }

    #[test]
    fn short_lived_token_is_born_expired() {
        let token = TokenState::new("abc", "Bearer", 30, t0(), Vec::new());
        assert!(token.is_expired_at(t0()));
    }

    #[test]
    fn seconds_remaining_floors_at_zero() {
        let token = TokenState::new("abc", "Bearer", 100, t0(), Vec::new());
        assert_eq!(token.seconds_remaining_at(t0() + Duration::seconds(40)), 60);
        assert_eq!(token.seconds_remaining_at(t0() + Duration::seconds(400)), 0);
    }

    #[test]
    fn parses_full_response() {
        let body = r#"{"access_token":"tok","token_type":"BearerToken","expires_in":"1799","api_product_list_json":["CaseStatus","FOIA"]}"#;
        let token = TokenState::from_response(body, t0()).unwrap();
        assert_eq!(token.access_token(), "tok");
        assert_eq!(token.token_type(), "BearerToken");
        assert_eq!(token.expires_in(), 1799);
        assert_eq!(token.api_products(), ["CaseStatus", "FOIA"]);
        assert_eq!(token.issued_at(), t0());
        assert_eq!(token.authorization(), "Bearer tok");
    }

    #[test]
    fn single_product_string_becomes_list() {
        let body = r#"{"access_token":"tok","expires_in":600,"api_product_list_json":"[CaseStatus]"}"#;
        let token = TokenState::from_response(body, t0()).unwrap();
        assert_eq!(token.api_products(), ["[CaseStatus]"]);
        assert_eq!(token.expires_in(), 600);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let token = TokenState::from_response(r#"{"access_token":"tok"}"#, t0()).unwrap();
        assert_eq!(token.token_type(), DEFAULT_TOKEN_TYPE);
        assert_eq!(token.expires_in(), DEFAULT_EXPIRES_IN);
        assert!(token.api_products().is_empty());
    }

    #[test]
    fn non_numeric_lifetime_falls_back_to_default() {
        let token =
            TokenState::from_response(r#"{"access_token":"tok","expires_in":"soon"}"#, t0()).unwrap();
        assert_eq!(token.expires_in(), DEFAULT_EXPIRES_IN);
    }

    #[rstest]
    #[case::ten_trillion("10000000000000")]
    #[case::past_i64("18446744073709551615")]
    #[case::float("1e300")]
    #[case::numeric_string("\"10000000000000\"")]
    fn huge_lifetime_saturates_expiry(#[case] expires_in: &str) {
        let body = format!(r#"{{"access_token":"tok","expires_in":{expires_in}}}"#);
        let token = TokenState::from_response(&body, t0()).unwrap();
        assert!(token.expires_in() >= 10_000_000_000_000);
        assert!(token.expires_at() > t0() + Duration::days(365 * 1000));
        assert!(!token.is_expired_at(t0()));
        assert!(token.seconds_remaining_at(t0()) > 0);
    }

    #[test]
    fn lifetime_past_chrono_range_is_max_utc() {
        let token = TokenState::new("abc", "Bearer", u64::MAX, t0(), Vec::new());
        assert_eq!(token.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!token.is_expired_at(t0()));
    }

    #[test]
    fn missing_access_token_is_an_error() {
        assert!(TokenState::from_response(r#"{"token_type":"Bearer"}"#, t0()).is_err());
        assert!(TokenState::from_response("not json", t0()).is_err());
    }

    #[test]
    fn debug_output_hides_token() {
        let token = TokenState::new("secret-token", "Bearer", 10, t0(), Vec::new());
        assert!(!format!("{token:?}").contains("secret-token"));
    }
}
