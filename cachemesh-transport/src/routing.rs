//! Routing transport: composite peer address to platform-routed request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, HOST};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use cachemesh_core::constants::{DEFAULT_PEER_TIMEOUT, DEFAULT_SCHEME};
use cachemesh_core::error::{MeshError, Result};
use cachemesh_core::types::decode;

use crate::request::PeerRequest;
use crate::transport::{NetworkTransport, PeerTransport};

/// Lowercase form of `INSTANCE_ROUTING_HEADER`.
const INSTANCE_HEADER: HeaderName = HeaderName::from_static("x-cf-app-instance");

/// Routing transport configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Upper bound on one peer request, in milliseconds
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_PEER_TIMEOUT.as_millis() as u64,
        }
    }
}

impl TransportConfig {
    /// Sets the peer request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// Transport that rewrites composite peer addresses into routed requests.
///
/// For a target `svc.example.com::app-1:9` the request is sent to
/// `http://svc.example.com` with `X-CF-APP-INSTANCE: app-1:9`. A target that does
/// not decode is rejected before anything touches the network.
pub struct RoutingTransport {
    network: Arc<dyn NetworkTransport>,
    config: TransportConfig,
}

impl RoutingTransport {
    /// Creates a transport over a default `reqwest` client.
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Creates a transport over a default `reqwest` client with custom configuration.
    pub fn with_config(config: TransportConfig) -> Self {
        Self::with_network(Arc::new(reqwest::Client::new()), config)
    }

    /// Creates a transport that delegates to `network`.
    pub fn with_network(network: Arc<dyn NetworkTransport>, config: TransportConfig) -> Self {
        Self { network, config }
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Rewrites a peer request into a routed network request.
    ///
    /// Fails with [`MeshError::MalformedAddress`] if the target does not decode or
    /// does not form a valid URL.
    pub fn rewrite(&self, request: PeerRequest) -> Result<reqwest::Request> {
        let PeerRequest {
            method,
            target,
            path,
            mut headers,
        } = request;

        let (routable, instance) = decode(&target)?;

        let base = routable.as_str().trim_end_matches('/');
        let base = if base.contains("://") {
            base.to_string()
        } else {
            format!("{}{}", DEFAULT_SCHEME, base)
        };
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        let url = Url::parse(&format!("{}{}", base, path))
            .map_err(|e| MeshError::MalformedAddress(format!("{}: {}", target, e)))?;
        let instance_value = HeaderValue::from_str(instance.as_str())
            .map_err(|e| MeshError::MalformedAddress(format!("{}: {}", target, e)))?;

        // Host follows the rewritten URL.
        headers.remove(HOST);
        headers.insert(INSTANCE_HEADER, instance_value);

        let mut outbound = reqwest::Request::new(method, url);
        *outbound.headers_mut() = headers;
        *outbound.timeout_mut() = Some(self.timeout());

        Ok(outbound)
    }
}

impl Default for RoutingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerTransport for RoutingTransport {
    #[instrument(skip(self, request), fields(target = %request.target, path = %request.path))]
    async fn round_trip(&self, request: PeerRequest) -> Result<reqwest::Response> {
        let target = request.target.clone();
        let outbound = self.rewrite(request).map_err(|e| {
            error!(error = %e, "Refusing to route peer request");
            e
        })?;

        let timeout = self.timeout();
        match tokio::time::timeout(timeout, self.network.execute(outbound)).await {
            Ok(Ok(response)) => {
                debug!(status = %response.status(), "Peer responded");
                Ok(response)
            }
            Ok(Err(e)) if e.is_timeout() => Err(MeshError::PeerTimeout {
                peer: target,
                millis: self.config.timeout_ms,
            }),
            Ok(Err(e)) => Err(MeshError::PeerUnreachable {
                peer: target,
                reason: e.to_string(),
            }),
            Err(_) => Err(MeshError::PeerTimeout {
                peer: target,
                millis: self.config.timeout_ms,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachemesh_core::constants::INSTANCE_ROUTING_HEADER;
    use parking_lot::Mutex;
    use reqwest::header::HeaderMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct SpyNetwork {
        calls: Mutex<Vec<(Url, HeaderMap)>>,
    }

    #[async_trait]
    impl NetworkTransport for SpyNetwork {
        async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.calls
                .lock()
                .push((request.url().clone(), request.headers().clone()));
            Ok(reqwest::Response::from(http::Response::new("ok")))
        }
    }

    fn spy_transport() -> (Arc<SpyNetwork>, RoutingTransport) {
        let spy = Arc::new(SpyNetwork::default());
        let transport = RoutingTransport::with_network(spy.clone(), TransportConfig::default());
        (spy, transport)
    }

    #[test]
    fn test_header_constant_matches_wire_name() {
        assert!(INSTANCE_HEADER
            .as_str()
            .eq_ignore_ascii_case(INSTANCE_ROUTING_HEADER));
    }

    #[test]
    fn test_rewrite_targets_route_and_sets_instance_header() {
        let (_, transport) = spy_transport();
        let req = PeerRequest::get("svc.example.com::app-1:9", "/_groupcache/g/k");

        let outbound = transport.rewrite(req).unwrap();

        assert_eq!(outbound.url().host_str(), Some("svc.example.com"));
        assert_eq!(outbound.url().scheme(), "http");
        assert_eq!(outbound.url().path(), "/_groupcache/g/k");
        assert_eq!(outbound.headers()[INSTANCE_ROUTING_HEADER], "app-1:9");
        assert_eq!(outbound.timeout(), Some(&Duration::from_secs(10)));
    }

    #[test]
    fn test_rewrite_keeps_scheme_and_port() {
        let (_, transport) = spy_transport();
        let req = PeerRequest::get("https://127.0.0.1:8443/::app:0", "_groupcache/g/k");

        let outbound = transport.rewrite(req).unwrap();

        assert_eq!(outbound.url().as_str(), "https://127.0.0.1:8443/_groupcache/g/k");
    }

    #[test]
    fn test_rewrite_drops_caller_host() {
        let (_, transport) = spy_transport();
        let req = PeerRequest::get("svc.example.com::app:2", "/x")
            .with_header(HOST, HeaderValue::from_static("svc.example.com::app:2"));

        let outbound = transport.rewrite(req).unwrap();

        assert!(outbound.headers().get(HOST).is_none());
    }

    #[tokio::test]
    async fn test_round_trip_delegates_rewritten_request() {
        let (spy, transport) = spy_transport();

        let response = transport
            .round_trip(PeerRequest::get("svc.example.com::app-1:9", "/_groupcache/g/k"))
            .await
            .unwrap();
        assert!(response.status().is_success());

        let calls = spy.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.host_str(), Some("svc.example.com"));
        assert_eq!(calls[0].1[INSTANCE_ROUTING_HEADER], "app-1:9");
    }

    #[tokio::test]
    async fn test_malformed_target_never_reaches_network() {
        let (spy, transport) = spy_transport();

        let result = transport
            .round_trip(PeerRequest::get("no-separator-here", "/_groupcache/g/k"))
            .await;

        assert!(matches!(result, Err(MeshError::MalformedAddress(_))));
        assert!(spy.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_through_router() {
        let router = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_groupcache/g/k"))
            .and(header("x-cf-app-instance", "app:3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("value"))
            .expect(1)
            .mount(&router)
            .await;

        let transport = RoutingTransport::new();
        let target = format!("{}::app:3", router.uri());
        let response = transport
            .round_trip(PeerRequest::get(target, "/_groupcache/g/k"))
            .await
            .unwrap();

        assert_eq!(response.text().await.unwrap(), "value");
    }

    #[tokio::test]
    async fn test_error_status_is_returned_unchanged() {
        let router = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&router)
            .await;

        let transport = RoutingTransport::new();
        let response = transport
            .round_trip(PeerRequest::get(format!("{}::app:0", router.uri()), "/k"))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_slow_peer_times_out() {
        let router = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&router)
            .await;

        let transport = RoutingTransport::with_config(
            TransportConfig::default().with_timeout(Duration::from_millis(50)),
        );
        let result = transport
            .round_trip(PeerRequest::get(format!("{}::app:0", router.uri()), "/k"))
            .await;

        assert!(matches!(result, Err(MeshError::PeerTimeout { millis: 50, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let transport = RoutingTransport::new();
        let result = transport
            .round_trip(PeerRequest::get("http://127.0.0.1:1::app:0", "/k"))
            .await;

        assert!(matches!(result, Err(MeshError::PeerUnreachable { .. })));
    }
}
