/// Credential handling for the upstream API key
use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use std::fmt;

/// The key sent to the upstream as `Authorization: Bearer {key}`.
///
/// `Debug` never prints the key, so settings holding one can be logged as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Whitespace-only keys are treated the same as a missing key.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Builds the authorization header value, marked sensitive so hyper won't log it.
    pub fn bearer_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
