/* src/request.rs */

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::IpAddr;

use tracing::trace;

/// Places a transport-level peer address may be recorded, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteAddressSource {
    /// Address of the primary connection object.
    Connection,
    /// Socket nested inside the connection object.
    ConnectionSocket,
    /// Top-level socket of the request.
    Socket,
    /// Platform specific request info.
    PlatformInfo,
    /// Source IP reported by a serverless API gateway identity.
    GatewayIdentity,
}

impl RemoteAddressSource {
    pub const PROBE_ORDER: [RemoteAddressSource; 5] = [
        RemoteAddressSource::Connection,
        RemoteAddressSource::ConnectionSocket,
        RemoteAddressSource::Socket,
        RemoteAddressSource::PlatformInfo,
        RemoteAddressSource::GatewayIdentity,
    ];
}

/// Read access to the parts of a request that client IP resolution looks at.
pub trait RequestLike {
    /// First value of the header `name` (lower-case).
    fn header(&self, name: &str) -> Option<&str>;

    /// Raw peer address recorded under `source`, if this request shape has one.
    fn remote_address(&self, _source: RemoteAddressSource) -> Option<Cow<'_, str>> {
        None
    }
}

impl<T: RequestLike + ?Sized> RequestLike for &T {
    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }

    fn remote_address(&self, source: RemoteAddressSource) -> Option<Cow<'_, str>> {
        (**self).remote_address(source)
    }
}

/// Find the first remote address that is a plain IP literal.
///
/// No port or bracket stripping happens here.
pub fn resolve_remote_address<R: RequestLike + ?Sized>(request: &R) -> Option<IpAddr> {
    RemoteAddressSource::PROBE_ORDER.iter().find_map(|&source| {
        let raw = request.remote_address(source)?;
        match raw.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                trace!(?source, address = %raw, "ignoring non-literal remote address");
                None
            }
        }
    })
}

/// Owned request view, for frameworks without a native [`RequestLike`] implementation.
///
/// # Examples
///
/// ```rust
/// use client_ip::{RemoteAddressSource, RequestSnapshot};
///
/// let request = RequestSnapshot::new()
///     .with_header("X-Real-IP", "203.0.113.9")
///     .with_remote_address(RemoteAddressSource::Socket, "10.0.0.2");
///
/// assert_eq!(client_ip::get_client_ip(&request, None), Some("203.0.113.9".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
    headers: HashMap<String, Vec<String>>,
    remote_addresses: HashMap<RemoteAddressSource, String>,
}

impl RequestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value. Repeated names keep every value in arrival order.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.append_header(name, value);
        self
    }

    pub fn append_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .entry(name.as_ref().to_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn with_remote_address(
        mut self,
        source: RemoteAddressSource,
        address: impl Into<String>,
    ) -> Self {
        self.remote_addresses.insert(source, address.into());
        self
    }

    /// All values of a header.
    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl RequestLike for RequestSnapshot {
    fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).first().map(String::as_str)
    }

    fn remote_address(&self, source: RemoteAddressSource) -> Option<Cow<'_, str>> {
        self.remote_addresses
            .get(&source)
            .map(|address| Cow::Borrowed(address.as_str()))
    }
}

#[cfg(feature = "axum")]
mod http_impls {
    use std::borrow::Cow;
    use std::net::SocketAddr;

    use axum::extract::ConnectInfo;
    use axum::http::{Extensions, HeaderMap, Request, request::Parts};

    use super::{RemoteAddressSource, RequestLike};

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn connect_info(extensions: &Extensions, source: RemoteAddressSource) -> Option<Cow<'static, str>> {
        match source {
            RemoteAddressSource::Connection => extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| Cow::Owned(addr.ip().to_string())),
            _ => None,
        }
    }

    impl<B> RequestLike for Request<B> {
        fn header(&self, name: &str) -> Option<&str> {
            header(self.headers(), name)
        }

        fn remote_address(&self, source: RemoteAddressSource) -> Option<Cow<'_, str>> {
            connect_info(self.extensions(), source)
        }
    }

    impl RequestLike for Parts {
        fn header(&self, name: &str) -> Option<&str> {
            header(&self.headers, name)
        }

        fn remote_address(&self, source: RemoteAddressSource) -> Option<Cow<'_, str>> {
            connect_info(&self.extensions, source)
        }
    }
}
