//! Outbound peer request.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

/// A request addressed to a peer by its composite address.
///
/// `target` holds the raw peer address; it is only turned into a real URL by the
/// routing transport, which is why it is kept apart from `path`.
#[derive(Clone, Debug)]
pub struct PeerRequest {
    /// HTTP method
    pub method: Method,
    /// Raw peer address (`<route>::<instance>`)
    pub target: String,
    /// Path and query, starting with `/`
    pub path: String,
    /// Extra headers to send
    pub headers: HeaderMap,
}

impl PeerRequest {
    /// Creates a request with no extra headers.
    pub fn new(method: Method, target: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(target: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::GET, target, path)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}
