//! Request and response types for dashboard API calls.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use super::ApiError;

/// A single dashboard API call. The dashboard endpoints we consume are all `GET`.
///
/// Lives only for the duration of one invocation; the retry budget belongs to
/// the [`RetryPolicy`](super::RetryPolicy) of the invoker.
#[derive(Clone)]
pub struct ApiRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl ApiRequest {
    /// Create a GET request for an absolute URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a single request header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a bearer credential.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Short description used in logs and errors. Never includes headers.
    pub fn describe(&self) -> String {
        format!("GET {}", self.url)
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// `GET url` of the request that produced this response.
    pub request: String,
    pub status: u16,
    pub body: String,
    /// Attempts the invoker needed, including the successful one.
    pub attempts: u32,
    /// Next page URL from a `Link: <...>; rel=next` header.
    pub next_page: Option<String>,
}

impl ApiResponse {
    /// `204 No Content` or an empty body.
    pub fn is_empty(&self) -> bool {
        self.status == 204 || self.body.trim().is_empty()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns `ApiError::Malformed` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Malformed {
            request: self.request.clone(),
            reason: e.to_string(),
        })
    }
}

/// Extract the `rel=next` target from an RFC 8288 `Link` header value.
pub(crate) fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params.split(';').any(|p| {
            let p = p.trim().replace('"', "");
            p.eq_ignore_ascii_case("rel=next")
        });
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_header_values() {
        let request = ApiRequest::get("https://api.example.com/api/v1/x").with_bearer("s3cret");
        let debug = format!("{request:?}");
        assert!(debug.contains("Authorization"));
        assert!(!debug.contains("s3cret"));
        assert_eq!(request.describe(), "GET https://api.example.com/api/v1/x");
    }

    #[test]
    fn test_parse_next_link() {
        let header = "<https://api.example.com/devices?startingAfter=a>; rel=first, \
                      <https://api.example.com/devices?startingAfter=Q2>; rel=next";
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://api.example.com/devices?startingAfter=Q2")
        );
        assert_eq!(parse_next_link("<https://x>; rel=\"next\"").as_deref(), Some("https://x"));
        assert_eq!(parse_next_link("<https://x>; rel=prev"), None);
    }

    #[test]
    fn test_json_decode_failure_is_malformed() {
        let response = ApiResponse {
            request: "GET https://x".to_string(),
            status: 200,
            body: "{not json".to_string(),
            attempts: 1,
            next_page: None,
        };
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ApiError::Malformed { .. }));
    }
}
