/* src/parser.rs */

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::extract::extract_ip;

/// Attribute values a structured header must carry before its `for=` value is trusted.
///
/// Keys are matched case-insensitively, values are compared exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderConstraints {
    entries: Vec<(String, String)>,
}

impl HeaderConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to be present with exactly `value`. A repeated key replaces the earlier value.
    pub fn require(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        let key = key.as_ref().trim().to_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderConstraints
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |constraints, (k, v)| constraints.require(k, v))
    }
}

/// One `key=value` pair of a `Forwarded` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedEntry {
    /// Lower-cased, trimmed key.
    pub key: String,
    /// Trimmed value with one pair of surrounding double quotes removed.
    pub value: String,
}

/// Split one `Forwarded` element (`proto=http;for=1.2.3.4`) into its pairs.
///
/// Parts without exactly one `=`, or with an empty key, are dropped.
pub fn parse_forwarded_entries(segment: &str) -> Vec<ForwardedEntry> {
    segment
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            if value.contains('=') {
                return None;
            }
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(ForwardedEntry {
                key: key.to_lowercase(),
                value: unquote(value.trim()).to_string(),
            })
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn first_segment(raw: &str) -> &str {
    raw.split(',').next().unwrap_or(raw)
}

/// `X-Forwarded-For` style: `client, proxy1, proxy2`. Only the client entry is used.
pub fn client_ip_from_list(raw: &str) -> Option<IpAddr> {
    extract_ip(first_segment(raw).trim())
}

/// RFC 7239 `Forwarded` header. Only the first element is used.
///
/// Every constraint must match an entry of that element before the `for=` value is considered.
///
/// # Examples
///
/// ```rust
/// use client_ip::{HeaderConstraints, client_ip_from_forwarded};
///
/// let secret = HeaderConstraints::new().require("secret", "abc");
/// let ip = client_ip_from_forwarded("for=123.34.56.78;secret=abc", &secret);
/// assert_eq!(ip, Some("123.34.56.78".parse().unwrap()));
///
/// let wrong = HeaderConstraints::new().require("secret", "xyz");
/// assert_eq!(client_ip_from_forwarded("for=123.34.56.78;secret=abc", &wrong), None);
/// ```
pub fn client_ip_from_forwarded(raw: &str, constraints: &HeaderConstraints) -> Option<IpAddr> {
    let entries = parse_forwarded_entries(first_segment(raw));

    let satisfied = constraints.iter().all(|(key, expected)| {
        entries
            .iter()
            .find(|entry| entry.key == key)
            .is_some_and(|entry| entry.value == expected)
    });
    if !satisfied {
        return None;
    }

    entries
        .iter()
        .find(|entry| entry.key == "for")
        .and_then(|entry| extract_ip(&entry.value))
}

/// Caller-supplied header parser.
pub type ParseFn = Arc<dyn Fn(&str, &HeaderConstraints) -> Option<IpAddr> + Send + Sync>;

/// Strategy turning a raw header value into a client IP.
#[derive(Clone, Default)]
pub enum HeaderParser {
    /// The whole value is a single address token.
    #[default]
    Bare,
    /// Comma separated list, leftmost entry is the client.
    FirstInList,
    /// Structured `Forwarded` header.
    Forwarded,
    /// Anything else.
    Custom(ParseFn),
}

impl HeaderParser {
    /// Wrap a closure as a parser.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &HeaderConstraints) -> Option<IpAddr> + Send + Sync + 'static,
    {
        HeaderParser::Custom(Arc::new(f))
    }

    pub fn parse(&self, raw: &str, constraints: &HeaderConstraints) -> Option<IpAddr> {
        match self {
            HeaderParser::Bare => extract_ip(raw.trim()),
            HeaderParser::FirstInList => client_ip_from_list(raw),
            HeaderParser::Forwarded => client_ip_from_forwarded(raw, constraints),
            HeaderParser::Custom(f) => f(raw, constraints),
        }
    }
}

impl fmt::Debug for HeaderParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderParser::Bare => f.write_str("Bare"),
            HeaderParser::FirstInList => f.write_str("FirstInList"),
            HeaderParser::Forwarded => f.write_str("Forwarded"),
            HeaderParser::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Header name to parser mapping. Names are stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, HeaderParser>,
}

impl ParserRegistry {
    /// An empty registry: every header is parsed as [`HeaderParser::Bare`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsers registered by default: `forwarded-for` as a list, `forwarded` as structured.
    pub fn builtin() -> Self {
        Self::new()
            .with("forwarded-for", HeaderParser::FirstInList)
            .with("forwarded", HeaderParser::Forwarded)
    }

    pub fn with(mut self, header: impl AsRef<str>, parser: HeaderParser) -> Self {
        self.insert(header, parser);
        self
    }

    pub fn insert(&mut self, header: impl AsRef<str>, parser: HeaderParser) {
        self.parsers.insert(header.as_ref().to_lowercase(), parser);
    }

    pub fn get(&self, header: &str) -> Option<&HeaderParser> {
        self.parsers.get(header)
    }

    /// Overlay `other` on top of `self`; entries of `other` win.
    pub fn merge(mut self, other: &ParserRegistry) -> Self {
        for (name, parser) in &other.parsers {
            self.parsers.insert(name.clone(), parser.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}
