/* src/extract.rs */

use std::net::IpAddr;

use crate::error::{ClientIpError, Result};

/// Parse a single token into an IP address, removing IPv6 brackets and a port suffix.
///
/// Accepted shapes:
///
/// * `203.0.113.7` and `203.0.113.7:4711`
/// * `2001:db8::1`, `[2001:db8::1]` and `[2001:db8::1]:4711`
///
/// A token with exactly one colon is treated as `ipv4:port`; tokens with more colons are left
/// as they are so unbracketed IPv6 literals still validate.
///
/// # Examples
///
/// ```rust
/// use client_ip::parse_ip_literal;
///
/// let ip = parse_ip_literal("[2001:db8::1428:57ab]:4561").unwrap();
/// assert_eq!(ip.to_string(), "2001:db8::1428:57ab");
/// assert!(parse_ip_literal("example.com").is_err());
/// ```
pub fn parse_ip_literal(token: &str) -> Result<IpAddr> {
    let candidate = if let Some(rest) = token.strip_prefix('[') {
        match rest.find(']') {
            Some(end) => &rest[..end],
            None => return Err(ClientIpError::InvalidIpFormat(token.to_string())),
        }
    } else if token.contains(':') {
        let mut parts = token.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(_port), None) => host,
            _ => token,
        }
    } else {
        token
    };

    candidate
        .parse::<IpAddr>()
        .map_err(|_| ClientIpError::InvalidIpFormat(token.to_string()))
}

/// Like [`parse_ip_literal`], but reports failure as "no match".
pub fn extract_ip(token: &str) -> Option<IpAddr> {
    parse_ip_literal(token).ok()
}

/// Strict check with no bracket or port handling.
pub fn is_ip_literal(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_plain_literals_pass_through() {
        for literal in ["123.34.56.78", "0.0.0.0", "::1", "2001:db8::1428:57ab", "::ffff:10.0.0.1"] {
            assert_eq!(extract_ip(literal), ip(literal), "{literal}");
        }
    }

    #[test]
    fn test_ipv4_port_is_stripped() {
        assert_eq!(extract_ip("123.34.56.78:4561"), ip("123.34.56.78"));
    }

    #[test]
    fn test_bracketed_ipv6() {
        assert_eq!(extract_ip("[2001:db8::1428:57ab]"), ip("2001:db8::1428:57ab"));
        assert_eq!(extract_ip("[2001:db8::1428:57ab]:4561"), ip("2001:db8::1428:57ab"));
        assert_eq!(extract_ip("[::1]garbage"), ip("::1"));
    }

    #[test]
    fn test_unterminated_bracket() {
        assert_eq!(
            parse_ip_literal("[2001:db8::1"),
            Err(ClientIpError::InvalidIpFormat("[2001:db8::1".to_string()))
        );
    }

    #[test]
    fn test_single_colon_falls_through_to_validation() {
        assert_eq!(extract_ip("10.1.2.3:not-a-port"), ip("10.1.2.3"));
        assert_eq!(extract_ip("a:b"), None);
    }

    #[test]
    fn test_rejects_non_literals() {
        for token in ["", "blablah", "example.com", "1234.32.12.32", "1.2.3", "[]", "[example]:80"] {
            assert_eq!(extract_ip(token), None, "{token}");
        }
    }

    #[test]
    fn test_is_ip_literal_is_strict() {
        assert!(is_ip_literal("10.0.0.1"));
        assert!(is_ip_literal("fe80::1"));
        assert!(!is_ip_literal("10.0.0.1:80"));
        assert!(!is_ip_literal("[::1]"));
    }
}
