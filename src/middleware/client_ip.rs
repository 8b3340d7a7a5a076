//! Client IP resolution middleware.
//!
//! [`ClientIpLayer`] resolves the real client address once per request and
//! stores it as a [`ClientIp`] request extension. Handlers take `ClientIp` as
//! an extractor:
//!
//! ```rust,ignore
//! async fn handler(client: ClientIp) -> String {
//!     client.addr.to_string()
//! }
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(ClientIpLayer::new(Arc::new(TrustRegistry::default())));
//!
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```
//!
//! # Connection Info
//!
//! The peer address comes from Axum's `ConnectInfo<SocketAddr>` extension,
//! so the router must be served with `into_make_service_with_connect_info`.
//! Without it no address can be trusted: the request is passed through
//! unannotated and the `ClientIp` extractor rejects with a 500.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::Request;
use axum::http::request::Parts;
use tower::{Layer, Service};
use tracing::warn;

use crate::error::AppError;
use crate::metrics;
use crate::registry::TrustRegistry;
use crate::resolver::ClientIp;

/// Layer that annotates requests with their resolved [`ClientIp`].
#[derive(Clone)]
pub struct ClientIpLayer {
    registry: Arc<TrustRegistry>,
}

impl ClientIpLayer {
    pub fn new(registry: Arc<TrustRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            registry: self.registry.clone(),
        }
    }
}

/// Service wrapper produced by [`ClientIpLayer`].
#[derive(Clone)]
pub struct ClientIpService<S> {
    inner: S,
    registry: Arc<TrustRegistry>,
}

impl<S, B> Service<Request<B>> for ClientIpService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        match peer {
            Some(peer) => {
                let client = self.registry.resolve_socket(peer, req.headers());
                metrics::record_resolution(&client.source);
                req.extensions_mut().insert(client);
            }
            None => {
                metrics::record_missing_peer();
                warn!(
                    path = %req.uri().path(),
                    "No connection info on request, client IP not resolved"
                );
            }
        }

        self.inner.call(req)
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClientIp>()
            .cloned()
            .ok_or(AppError::MissingPeerAddr)
    }
}
