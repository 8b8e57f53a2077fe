//! Peer lookup handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;
use tracing::debug;

use cachemesh_core::error::MeshError;

use crate::error::ApiError;
use crate::pool::PeerPool;
use crate::registry::GroupRegistry;

/// Creates the router answering peer lookups at `<base_path>:group/:key`.
pub fn peer_router(pool: &PeerPool, registry: Arc<GroupRegistry>) -> Router {
    let route = format!("{}:group/:key", pool.base_path());

    Router::new()
        .route(&route, get(lookup))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

impl PeerPool {
    /// Creates the peer lookup router for this pool. See [`peer_router`].
    pub fn router(&self, registry: Arc<GroupRegistry>) -> Router {
        peer_router(self, registry)
    }
}

async fn lookup(
    State(registry): State<Arc<GroupRegistry>>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Bytes, ApiError> {
    let group = registry
        .get(&group)
        .ok_or_else(|| MeshError::GroupNotFound(group.clone()))?;

    let value = group.get(&key).await?;
    debug!(group = group.name(), key = %key, bytes = value.len(), "Served peer lookup");

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use cachemesh_core::types::{InstanceId, PeerAddress, RoutableAddress};
    use cachemesh_transport::NetworkTransport;

    use crate::group::{FnGetter, Getter, Group};
    use crate::pool::PoolConfig;

    const GROUP: &str = "test";

    fn echo_getter(origin: String) -> Arc<dyn Getter> {
        Arc::new(FnGetter::new(move |key: String| {
            let origin = origin.clone();
            async move { Ok::<_, MeshError>(Bytes::from(format!("{}:{}", origin, key))) }
        }))
    }

    fn failing_getter() -> Arc<dyn Getter> {
        Arc::new(FnGetter::new(|key: String| async move {
            Err::<Bytes, _>(MeshError::GetterFailed {
                key,
                reason: "not the owner".into(),
            })
        }))
    }

    fn single_node() -> Router {
        let route = RoutableAddress::new("svc.example.com").unwrap();
        let pool = Arc::new(PeerPool::new(&route, &InstanceId::new("app:0").unwrap()));
        let registry = Arc::new(GroupRegistry::new());
        registry
            .register(Group::new(GROUP, 16, echo_getter("self".into()), pool.clone()))
            .unwrap();
        peer_router(&pool, registry)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_serves_value() {
        let response = single_node()
            .oneshot(
                Request::builder()
                    .uri("/_groupcache/test/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "self:42");
    }

    #[tokio::test]
    async fn test_lookup_decodes_escaped_key() {
        let response = single_node()
            .oneshot(
                Request::builder()
                    .uri("/_groupcache/test/a%2Fb%20c")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "self:a/b c");
    }

    #[tokio::test]
    async fn test_dot_key_is_bad_request() {
        let response = single_node()
            .oneshot(
                Request::builder()
                    .uri("/_groupcache/test/%2E%2E")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("BAD_REQUEST"));
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let response = single_node()
            .oneshot(
                Request::builder()
                    .uri("/_groupcache/missing/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("NOT_FOUND"));
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Four instances behind one router
    // ───────────────────────────────────────────────────────────────────────────

    /// Router that forwards every request to the instance named in the routing header.
    async fn spawn_router() -> String {
        async fn forward(
            State(client): State<reqwest::Client>,
            headers: HeaderMap,
            uri: Uri,
        ) -> Response {
            let Some(instance) = headers
                .get("x-cf-app-instance")
                .and_then(|v| v.to_str().ok())
            else {
                return StatusCode::BAD_GATEWAY.into_response();
            };

            match client
                .get(format!("http://{}{}", instance, uri.path()))
                .send()
                .await
            {
                Ok(upstream) => {
                    let status = upstream.status();
                    let body = upstream.bytes().await.unwrap_or_default();
                    (status, body).into_response()
                }
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }

        let app = Router::new()
            .fallback(forward)
            .with_state(reqwest::Client::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{}", addr)
    }

    struct Child {
        group: Arc<Group>,
    }

    async fn spawn_children(route: &RoutableAddress, count: usize) -> (Vec<InstanceId>, Vec<Child>) {
        let mut listeners = Vec::new();
        let mut instances = Vec::new();
        for _ in 0..count {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            instances.push(InstanceId::new(listener.local_addr().unwrap().to_string()).unwrap());
            listeners.push(listener);
        }

        let mut children = Vec::new();
        for (listener, instance) in listeners.into_iter().zip(instances.iter()) {
            let pool = Arc::new(PeerPool::new(route, instance));
            pool.set_peers(route, &instances);

            let registry = Arc::new(GroupRegistry::new());
            let group = registry
                .register(Group::new(
                    GROUP,
                    64,
                    echo_getter(instance.to_string()),
                    pool.clone(),
                ))
                .unwrap();

            let app = pool.router(registry);
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            children.push(Child { group });
        }

        (instances, children)
    }

    #[derive(Default)]
    struct CountingNetwork {
        client: reqwest::Client,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NetworkTransport for CountingNetwork {
        async fn execute(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.client.execute(request).await
        }
    }

    #[tokio::test]
    async fn test_four_peers_behind_single_route() {
        let route = RoutableAddress::new(spawn_router().await).unwrap();
        let (instances, children) = spawn_children(&route, 4).await;

        let network = Arc::new(CountingNetwork::default());
        let parent = Arc::new(PeerPool::with_network(
            &route,
            &InstanceId::new("parent").unwrap(),
            PoolConfig::default(),
            network.clone(),
        ));
        parent.set_peers(&route, &instances);
        let group = Group::new(GROUP, 64, failing_getter(), parent.clone());

        let mut origins = HashSet::new();
        for i in 0..20 {
            let key = i.to_string();
            let value = group.get(&key).await.unwrap();
            let value = String::from_utf8(value.to_vec()).unwrap();

            let owner = parent.owner(&key).unwrap();
            let (_, instance) = owner.decode();
            assert_eq!(value, format!("{}:{}", instance, key));
            origins.insert(instance);
        }

        assert_eq!(network.calls.load(Ordering::SeqCst), 20);
        assert_eq!(group.stats().local_loads, 0);
        assert!(origins.len() > 1);

        // Every instance agrees on the owner of a key, and the answer is stable.
        let expected = group.get("42").await.unwrap();
        for _ in 0..3 {
            assert_eq!(group.get("42").await.unwrap(), expected);
        }
        for child in &children {
            assert_eq!(child.group.get("42").await.unwrap(), expected);
        }

        let owner: PeerAddress = parent.owner("42").unwrap();
        let (_, instance) = owner.decode();
        assert_eq!(expected, Bytes::from(format!("{}:42", instance)));
    }
}
