/* src/extractor.rs */

use std::net::IpAddr;
use std::sync::{Arc, LazyLock};

use tracing::{debug, trace};

use crate::error::{ClientIpError, Result};
use crate::parser::{HeaderConstraints, HeaderParser, ParserRegistry};
use crate::request::{RequestLike, resolve_remote_address};
use crate::trust::AllowedRemotes;

/// Headers checked by default, in order of preference.
pub const DEFAULT_HEADERS: [&str; 10] = [
    "x-client-ip",
    "x-forwarded-for",
    "cf-connecting-ip",
    "fastly-client-ip",
    "true-client-ip",
    "x-real-ip",
    "x-cluster-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// A header to check, with the constraints its parser must enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpec {
    name: String,
    constraints: HeaderConstraints,
}

impl HeaderSpec {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_lowercase(),
            constraints: HeaderConstraints::new(),
        }
    }

    pub fn with_constraints(mut self, constraints: HeaderConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraints(&self) -> &HeaderConstraints {
        &self.constraints
    }
}

impl From<&str> for HeaderSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for HeaderSpec {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl<S: AsRef<str>> From<(S, HeaderConstraints)> for HeaderSpec {
    fn from((name, constraints): (S, HeaderConstraints)) -> Self {
        Self::new(name).with_constraints(constraints)
    }
}

/// Per-call overrides. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Only honor headers when the transport peer is trusted.
    pub allowed_remotes: Option<AllowedRemotes>,
    /// Replaces the extractor's header list.
    pub allowed_headers: Option<Vec<HeaderSpec>>,
    /// Consulted before the extractor's own parsers.
    pub header_parsers: Option<ParserRegistry>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_remotes(mut self, remotes: impl Into<AllowedRemotes>) -> Self {
        self.allowed_remotes = Some(remotes.into());
        self
    }

    pub fn with_allowed_headers<I, H>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<HeaderSpec>,
    {
        self.allowed_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_header_parser(mut self, header: impl AsRef<str>, parser: HeaderParser) -> Self {
        self.header_parsers
            .get_or_insert_with(ParserRegistry::new)
            .insert(header, parser);
        self
    }

    pub fn with_header_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.header_parsers = Some(parsers);
        self
    }
}

static GLOBAL: LazyLock<Arc<ClientIpExtractor>> =
    LazyLock::new(|| Arc::new(ClientIpExtractor::default()));

/// Resolves the client IP of a request from forwarding headers and the transport peer.
///
/// The extractor holds the default header list and parser registry; a [`Configuration`]
/// passed per call may override either and enable remote allow-listing.
#[derive(Debug, Clone)]
pub struct ClientIpExtractor {
    headers: Vec<HeaderSpec>,
    parsers: ParserRegistry,
}

impl Default for ClientIpExtractor {
    fn default() -> Self {
        Self {
            headers: DEFAULT_HEADERS.iter().map(|&name| HeaderSpec::new(name)).collect(),
            parsers: ParserRegistry::builtin(),
        }
    }
}

impl ClientIpExtractor {
    /// Create an extractor with the default headers and built-in parsers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared default extractor.
    pub fn global() -> Arc<ClientIpExtractor> {
        Arc::clone(&GLOBAL)
    }

    /// Set headers to check, in order of preference.
    pub fn with_headers<I, H>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<HeaderSpec>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the parser registry.
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn headers(&self) -> &[HeaderSpec] {
        &self.headers
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Resolve the client IP of `request`.
    ///
    /// With `allowed_remotes` set, an unknown or untrusted peer short-circuits the lookup and
    /// the peer address (possibly `None`) is returned without looking at any header.
    /// Otherwise the first header yielding an address wins, and the peer address is the
    /// fallback.
    pub fn client_ip<R>(&self, request: &R, config: Option<&Configuration>) -> Option<IpAddr>
    where
        R: RequestLike + ?Sized,
    {
        let config = config.unwrap_or(&DEFAULT_CONFIGURATION);

        if let Some(remotes) = &config.allowed_remotes {
            let remote = self.remote_address(request);
            match remote {
                Some(ip) if remotes.is_trusted(ip) => {
                    trace!(%ip, "remote address trusted, checking headers");
                }
                _ => {
                    debug!(remote = ?remote, "remote address not trusted, ignoring headers");
                    return remote;
                }
            }
        }

        let headers = config.allowed_headers.as_deref().unwrap_or(&self.headers);
        let overrides = config.header_parsers.as_ref();
        for spec in headers {
            if let Some(ip) = self.try_header(request, spec, overrides) {
                debug!(header = spec.name(), %ip, "client ip resolved from header");
                return Some(ip);
            }
        }

        let remote = self.remote_address(request);
        debug!(remote = ?remote, "no usable forwarding header, using remote address");
        remote
    }

    /// Extract an address from a single header, if present.
    pub fn try_header<R>(
        &self,
        request: &R,
        spec: &HeaderSpec,
        overrides: Option<&ParserRegistry>,
    ) -> Option<IpAddr>
    where
        R: RequestLike + ?Sized,
    {
        let raw = request.header(spec.name()).filter(|value| !value.is_empty())?;

        let parser = overrides
            .and_then(|parsers| parsers.get(spec.name()))
            .or_else(|| self.parsers.get(spec.name()))
            .unwrap_or(&BARE);

        let ip = parser.parse(raw, spec.constraints());
        if ip.is_none() {
            trace!(header = spec.name(), value = raw, ?parser, "header did not yield an address");
        }
        ip
    }

    /// Transport peer address of `request`.
    pub fn remote_address<R>(&self, request: &R) -> Option<IpAddr>
    where
        R: RequestLike + ?Sized,
    {
        resolve_remote_address(request)
    }

    /// Like [`client_ip`](Self::client_ip), but fails when nothing was found.
    pub fn require_client_ip<R>(&self, request: &R, config: Option<&Configuration>) -> Result<IpAddr>
    where
        R: RequestLike + ?Sized,
    {
        self.client_ip(request, config)
            .ok_or(ClientIpError::NoClientIp)
    }
}

static DEFAULT_CONFIGURATION: LazyLock<Configuration> = LazyLock::new(Configuration::default);

static BARE: HeaderParser = HeaderParser::Bare;

/// A configuration bound to an extractor, ready to resolve requests.
///
/// # Examples
///
/// ```rust
/// use client_ip::{ClientIp, Configuration, RemoteAddressSource, RequestSnapshot};
///
/// let client_ip = ClientIp::new(Configuration::new().with_allowed_remotes("10.0.0.1"));
///
/// let trusted = RequestSnapshot::new()
///     .with_header("x-real-ip", "203.0.113.9")
///     .with_remote_address(RemoteAddressSource::Connection, "10.0.0.1");
/// assert_eq!(client_ip.resolve(&trusted), Some("203.0.113.9".parse().unwrap()));
///
/// let spoofed = RequestSnapshot::new()
///     .with_header("x-real-ip", "203.0.113.9")
///     .with_remote_address(RemoteAddressSource::Connection, "198.51.100.3");
/// assert_eq!(client_ip.resolve(&spoofed), Some("198.51.100.3".parse().unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct ClientIp {
    config: Configuration,
    extractor: Arc<ClientIpExtractor>,
}

impl Default for ClientIp {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl ClientIp {
    /// Use `config` with the shared default extractor.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            extractor: ClientIpExtractor::global(),
        }
    }

    pub fn with_extractor(config: Configuration, extractor: ClientIpExtractor) -> Self {
        Self {
            config,
            extractor: Arc::new(extractor),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn resolve<R>(&self, request: &R) -> Option<IpAddr>
    where
        R: RequestLike + ?Sized,
    {
        self.extractor.client_ip(request, Some(&self.config))
    }
}

/// Resolve the client IP of `request` with the default extractor.
pub fn get_client_ip<R>(request: &R, config: Option<&Configuration>) -> Option<IpAddr>
where
    R: RequestLike + ?Sized,
{
    GLOBAL.client_ip(request, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RemoteAddressSource, RequestSnapshot};

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    fn with_header(name: &str, value: &str) -> RequestSnapshot {
        RequestSnapshot::new().with_header(name, value)
    }

    #[test]
    fn test_forwarded_header() {
        let cases = [
            ("for=123.34.56.78", ip("123.34.56.78")),
            ("for=\"[2001:db8::1428:57ab]:4561\"", ip("2001:db8::1428:57ab")),
            (
                "proto=http;for=123.34.56.78;host=example.com, for=98.123.45.12",
                ip("123.34.56.78"),
            ),
            ("123.34.56.78", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(get_client_ip(&with_header("forwarded", raw), None), expected, "{raw}");
        }
    }

    #[test]
    fn test_forwarded_for_header() {
        let cases = [
            ("123.34.56.78", ip("123.34.56.78")),
            ("123.34.56.78:4561", ip("123.34.56.78")),
            ("2001:db8::1428:57ab", ip("2001:db8::1428:57ab")),
            ("[2001:db8::1428:57ab]", ip("2001:db8::1428:57ab")),
            ("[2001:db8::1428:57ab]:4561", ip("2001:db8::1428:57ab")),
            ("123.34.56.78, 98.123.45.12", ip("123.34.56.78")),
            ("blahblah", None),
            ("1234.32.12.32", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(get_client_ip(&with_header("forwarded-for", raw), None), expected, "{raw}");
        }
    }

    #[test]
    fn test_forwarded_with_configuration() {
        let request = with_header("forwarded", "for=123.34.56.78;SeCreT=AbC");
        let constrained = |key: &str, value: &str| {
            Configuration::new().with_allowed_headers([(
                "forwarded",
                HeaderConstraints::new().require(key, value),
            )])
        };

        assert_eq!(get_client_ip(&request, Some(&constrained("secret", "AbC"))), ip("123.34.56.78"));
        assert_eq!(get_client_ip(&request, Some(&constrained("SeCreT", "AbC"))), ip("123.34.56.78"));
        assert_eq!(get_client_ip(&request, Some(&constrained("secret", "abc"))), None);

        let plain = with_header("forwarded", "for=123.34.56.78");
        assert_eq!(get_client_ip(&plain, Some(&constrained("secret", "abc"))), None);
        assert_eq!(
            get_client_ip(&plain, Some(&Configuration::new().with_allowed_headers(["forwarded"]))),
            ip("123.34.56.78")
        );
        assert_eq!(
            get_client_ip(&plain, Some(&Configuration::new().with_allowed_headers(Vec::<HeaderSpec>::new()))),
            None
        );
    }

    #[test]
    fn test_header_precedence() {
        let request = RequestSnapshot::new()
            .with_header("forwarded", "for=10.0.0.3")
            .with_header("x-real-ip", "10.0.0.2")
            .with_header("cf-connecting-ip", "10.0.0.1");

        assert_eq!(get_client_ip(&request, None), ip("10.0.0.1"));
    }

    #[test]
    fn test_invalid_header_falls_through_to_next() {
        let request = RequestSnapshot::new()
            .with_header("x-client-ip", "unknown")
            .with_header("x-real-ip", "")
            .with_header("forwarded", "for=10.0.0.3");

        assert_eq!(get_client_ip(&request, None), ip("10.0.0.3"));
    }

    #[test]
    fn test_x_forwarded_for_is_bare_unless_registered() {
        let request = with_header("x-forwarded-for", "203.0.113.1, 10.0.0.1");
        assert_eq!(get_client_ip(&request, None), None);

        let config = Configuration::new().with_header_parser("x-forwarded-for", HeaderParser::FirstInList);
        assert_eq!(get_client_ip(&request, Some(&config)), ip("203.0.113.1"));
    }

    #[test]
    fn test_multi_value_header_uses_first_occurrence() {
        let request = RequestSnapshot::new()
            .with_header("x-real-ip", "garbage")
            .with_header("x-real-ip", "10.0.0.9");

        assert_eq!(get_client_ip(&request, None), None);
    }

    #[test]
    fn test_fallback_to_remote_address() {
        let request = RequestSnapshot::new()
            .with_header("x-real-ip", "garbage")
            .with_remote_address(RemoteAddressSource::Socket, "192.0.2.10");

        assert_eq!(get_client_ip(&request, None), ip("192.0.2.10"));
        assert_eq!(get_client_ip(&RequestSnapshot::new(), None), None);
    }

    #[test]
    fn test_untrusted_remote_skips_headers() {
        let request = RequestSnapshot::new()
            .with_header("x-client-ip", "203.0.113.1")
            .with_remote_address(RemoteAddressSource::Connection, "198.51.100.1");
        let config = Configuration::new().with_allowed_remotes(vec!["10.0.0.1"]);

        assert_eq!(get_client_ip(&request, Some(&config)), ip("198.51.100.1"));
    }

    #[test]
    fn test_unknown_remote_with_allow_list_returns_none() {
        let request = with_header("x-client-ip", "203.0.113.1");
        let config = Configuration::new().with_allowed_remotes(AllowedRemotes::predicate(|_| true));

        assert_eq!(get_client_ip(&request, Some(&config)), None);
    }

    #[test]
    fn test_trusted_remote_uses_headers() {
        let request = RequestSnapshot::new()
            .with_header("x-client-ip", "203.0.113.1")
            .with_remote_address(RemoteAddressSource::Connection, "10.0.0.1");
        let config = Configuration::new().with_allowed_remotes("10.0.0.1, 10.0.0.2");

        assert_eq!(get_client_ip(&request, Some(&config)), ip("203.0.113.1"));
    }

    #[test]
    fn test_trusted_remote_without_headers_falls_back() {
        let request = RequestSnapshot::new()
            .with_remote_address(RemoteAddressSource::GatewayIdentity, "10.0.0.1");
        let config = Configuration::new()
            .with_allowed_remotes(AllowedRemotes::predicate(|ip| matches!(ip, IpAddr::V4(v4) if v4.is_private())));

        assert_eq!(get_client_ip(&request, Some(&config)), ip("10.0.0.1"));
    }

    #[test]
    fn test_request_parser_overrides_builtin() {
        let request = with_header("forwarded", "by=proxy;for=10.0.0.1");
        let config = Configuration::new().with_header_parser(
            "Forwarded",
            HeaderParser::custom(|_, _| "192.0.2.1".parse().ok()),
        );

        assert_eq!(get_client_ip(&request, Some(&config)), ip("192.0.2.1"));
    }

    #[test]
    fn test_custom_extractor_headers() {
        let extractor = ClientIpExtractor::new().with_headers(["X-Custom-IP"]);
        let request = RequestSnapshot::new()
            .with_header("x-custom-ip", "203.0.113.200")
            .with_header("x-client-ip", "203.0.113.1");

        assert_eq!(extractor.client_ip(&request, None), ip("203.0.113.200"));
        assert_eq!(
            ClientIp::with_extractor(Configuration::new(), extractor).resolve(&request),
            ip("203.0.113.200")
        );
    }

    #[test]
    fn test_require_client_ip() {
        let extractor = ClientIpExtractor::new();
        assert_eq!(
            extractor.require_client_ip(&RequestSnapshot::new(), None),
            Err(ClientIpError::NoClientIp)
        );
        assert_eq!(
            extractor.require_client_ip(&with_header("true-client-ip", "::1"), None),
            Ok("::1".parse().unwrap())
        );
    }
}
