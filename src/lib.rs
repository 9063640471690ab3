/* src/lib.rs */
//! # Client IP Resolver
//!
//! Resolve the originating client IP address of an HTTP request sitting behind load
//! balancers, CDNs or reverse proxies, where the transport peer is a proxy rather than the
//! real client.
//!
//! ## Features
//!
//! - Ordered precedence across common forwarding headers (`X-Client-IP`, `X-Forwarded-For`,
//!   `CF-Connecting-IP`, `Fastly-Client-IP`, `True-Client-IP`, `X-Real-IP`, `Forwarded`, ...)
//! - RFC 7239 `Forwarded` parsing with optional attribute constraints (e.g. a shared `secret`)
//! - Bracketed IPv6 literals and `:port` suffixes are handled, hostnames never returned
//! - Optional allow-listing of the transport peer; CIDR networks with the `cidr` feature
//! - Pluggable per-header parsers
//! - Optional Axum middleware and extractor integration via the `axum` feature
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use client_ip::{RemoteAddressSource, RequestSnapshot, get_client_ip};
//!
//! let request = RequestSnapshot::new()
//!     .with_header("forwarded", "proto=http;for=\"[2001:db8::1428:57ab]:4561\"")
//!     .with_remote_address(RemoteAddressSource::Connection, "10.0.0.1");
//!
//! let ip = get_client_ip(&request, None);
//! assert_eq!(ip, Some("2001:db8::1428:57ab".parse().unwrap()));
//! ```
//!
//! ### Trusting only known proxies
//!
//! ```rust
//! use client_ip::{ClientIp, Configuration, RemoteAddressSource, RequestSnapshot};
//!
//! let client_ip = ClientIp::new(Configuration::new().with_allowed_remotes("10.0.0.1"));
//! let request = RequestSnapshot::new()
//!     .with_header("x-real-ip", "203.0.113.9")
//!     .with_remote_address(RemoteAddressSource::Connection, "198.51.100.3");
//!
//! // Untrusted peer: its headers are ignored.
//! assert_eq!(client_ip.resolve(&request), Some("198.51.100.3".parse().unwrap()));
//! ```

pub mod error;
pub mod extract;
pub mod extractor;
pub mod parser;
pub mod request;
pub mod trust;

#[cfg(feature = "axum")]
pub mod middleware;

pub use error::{ClientIpError, Result};
pub use extract::{extract_ip, is_ip_literal, parse_ip_literal};
pub use extractor::{
    ClientIp, ClientIpExtractor, Configuration, DEFAULT_HEADERS, HeaderSpec, get_client_ip,
};
pub use parser::{
    ForwardedEntry, HeaderConstraints, HeaderParser, ParseFn, ParserRegistry,
    client_ip_from_forwarded, client_ip_from_list, parse_forwarded_entries,
};
pub use request::{RemoteAddressSource, RequestLike, RequestSnapshot, resolve_remote_address};
pub use trust::{AllowedRemotes, RemotePredicate};

#[cfg(feature = "axum")]
pub use middleware::{ClientIpAddr, ClientIpLayer, ClientIpService, ResolvedClientIp};

/// Re-export commonly used types
pub use std::net::IpAddr;
