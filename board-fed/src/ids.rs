//! Request identifiers for log correlation and the `x-request-id` header.

use std::fmt;
use std::str::FromStr;

use http::Request;
use rand::Rng;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};

const PREFIX: &str = "req";
const SUFFIX_LEN: usize = 20;

/// A request identifier: `req_` followed by 20 lowercase hex digits.
///
/// Not time-sortable like a UUIDv7 — just random and cheap to generate per
/// request. Good enough for correlating log lines, which is its only job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap())
            .collect();
        Self(format!("{PREFIX}_{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = RequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s.strip_prefix("req_").ok_or(RequestIdError::InvalidPrefix)?;
        if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RequestIdError::InvalidFormat);
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Error parsing a [`RequestId`] back out of a header value.
#[derive(Debug, thiserror::Error)]
pub enum RequestIdError {
    #[error("request id missing 'req_' prefix")]
    InvalidPrefix,
    #[error("request id has invalid suffix")]
    InvalidFormat,
}

/// A `MakeRequestId` implementation generating [`RequestId`]s for tower-http's
/// `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let id = RequestId::new();
        let header_value = http::HeaderValue::from_str(id.as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_has_expected_shape() {
        let id = RequestId::new();
        assert!(id.as_str().starts_with("req_"));
        assert_eq!(id.as_str().len(), 4 + SUFFIX_LEN);
    }

    #[test]
    fn round_trips_through_from_str() {
        let id = RequestId::new();
        let parsed = RequestId::from_str(id.as_str()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(RequestId::from_str("user_00000000000000000000").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(RequestId::from_str("req_123").is_err());
    }

    #[test]
    fn make_typed_request_id_produces_header() {
        let mut maker = MakeTypedRequestId;
        let request = http::Request::builder().body(()).unwrap();
        let id = maker.make_request_id(&request).unwrap();
        let header_value = id.into_header_value();
        assert!(header_value.to_str().unwrap().starts_with("req_"));
    }
}
