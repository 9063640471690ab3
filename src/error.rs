/* src/error.rs */

use thiserror::Error;

/// Result type alias for operations that may fail with `ClientIpError`.
pub type Result<T> = std::result::Result<T, ClientIpError>;

/// Errors surfaced by the strict entry points of the crate.
///
/// Resolution itself never fails: a missing or malformed source only yields `None`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientIpError {
    /// Token is not an IPv4 or IPv6 literal once brackets and port are removed.
    #[error("Invalid IP address format: {0}")]
    InvalidIpFormat(String),

    /// Allow-list entry is neither an address, a CIDR network nor a known preset.
    #[error("Invalid trusted remote entry: {0}")]
    InvalidTrustEntry(String),

    /// No header and no remote address yielded a valid IP.
    #[error("No valid client IP address found")]
    NoClientIp,
}
