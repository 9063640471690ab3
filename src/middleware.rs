/* src/middleware.rs */

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::Response,
};
use futures_util::future::BoxFuture;
use std::{
    convert::Infallible,
    net::IpAddr,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::extractor::{ClientIp, Configuration};

/// Request extension holding the outcome of client IP resolution.
///
/// Inserted once per request by [`ClientIpService`]; `None` when no source produced an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedClientIp(pub Option<IpAddr>);

impl ResolvedClientIp {
    pub fn ip(&self) -> Option<IpAddr> {
        self.0
    }
}

/// Layer resolving the client IP of every request.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use client_ip::{ClientIpAddr, ClientIpLayer, Configuration};
///
/// async fn handler(ClientIpAddr(ip): ClientIpAddr) -> String {
///     ip.to_string()
/// }
///
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(ClientIpLayer::new(
///         Configuration::new().with_allowed_remotes("127.0.0.1, ::1"),
///     ));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientIpLayer {
    client_ip: ClientIp,
}

impl ClientIpLayer {
    /// Create a layer using `config` and the default extractor.
    pub fn new(config: Configuration) -> Self {
        Self {
            client_ip: ClientIp::new(config),
        }
    }

    /// Create a layer with a fully prepared resolver.
    pub fn with_client_ip(client_ip: ClientIp) -> Self {
        Self { client_ip }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            client_ip: self.client_ip.clone(),
        }
    }
}

/// Service that resolves the client IP before calling the inner service.
#[derive(Debug, Clone)]
pub struct ClientIpService<S> {
    inner: S,
    client_ip: ClientIp,
}

impl<S> Service<Request> for ClientIpService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let resolved = self.client_ip.resolve(&req);
        req.extensions_mut().insert(ResolvedClientIp(resolved));

        let future = self.inner.call(req);
        Box::pin(future)
    }
}

/// Axum extractor for the resolved client IP.
///
/// Uses the [`ResolvedClientIp`] extension when the layer ran, otherwise resolves on the spot
/// with the default configuration. Rejects with `500` when nothing was found; take
/// `Option<ClientIpAddr>` to handle that case in the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIpAddr(pub IpAddr);

impl ClientIpAddr {
    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

fn resolve_parts(parts: &Parts) -> Option<IpAddr> {
    match parts.extensions.get::<ResolvedClientIp>() {
        Some(resolved) => resolved.ip(),
        None => crate::get_client_ip(parts, None),
    }
}

impl<S> FromRequestParts<S> for ClientIpAddr
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve_parts(parts).map(ClientIpAddr).ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unable to determine client IP",
        ))
    }
}

impl<S> OptionalFromRequestParts<S> for ClientIpAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(resolve_parts(parts).map(ClientIpAddr))
    }
}
