/* src/trust.rs */

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

#[cfg(feature = "cidr")]
use ipnet::IpNet;
use tracing::warn;

#[cfg(feature = "cidr")]
use crate::error::{ClientIpError, Result};

/// Caller-supplied trust decision.
pub type RemotePredicate = Arc<dyn Fn(IpAddr) -> bool + Send + Sync>;

/// Which transport peers may have their forwarding headers honored.
#[derive(Clone)]
pub enum AllowedRemotes {
    /// Custom decision function.
    Predicate(RemotePredicate),
    /// Exact address membership.
    Addresses(Vec<IpAddr>),
    /// Network membership, evaluated for the directly connected hop.
    #[cfg(feature = "cidr")]
    Subnets(Vec<IpNet>),
}

impl AllowedRemotes {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(IpAddr) -> bool + Send + Sync + 'static,
    {
        AllowedRemotes::Predicate(Arc::new(f))
    }

    /// Build from a list of addresses, networks or presets.
    ///
    /// With the `cidr` feature the list is compiled into networks. Without it, or when an entry
    /// fails to compile, only exact address matches are trusted.
    pub fn from_list<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.as_ref().trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();

        #[cfg(feature = "cidr")]
        {
            match Self::try_subnets(&entries) {
                Ok(subnets) => return subnets,
                Err(err) => warn!(%err, "falling back to exact address matching"),
            }
        }

        Self::exact(&entries)
    }

    /// Build from a comma separated list, e.g. `"10.0.0.1, 10.0.0.2"`.
    pub fn from_comma_separated(list: &str) -> Self {
        Self::from_list(list.split(','))
    }

    /// Exact membership only, regardless of enabled features.
    pub fn exact<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = entries
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim();
                match entry.parse::<IpAddr>() {
                    Ok(ip) => Some(ip),
                    Err(_) => {
                        warn!(entry, "ignoring allow-list entry that is not an IP address");
                        None
                    }
                }
            })
            .collect();
        AllowedRemotes::Addresses(addresses)
    }

    /// Compile every entry into networks, failing on the first invalid one.
    ///
    /// Entries may be addresses (`10.0.0.1`), networks (`10.0.0.0/8`) or one of the presets
    /// `loopback`, `linklocal` and `uniquelocal`.
    #[cfg(feature = "cidr")]
    pub fn try_subnets<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut networks = Vec::new();
        for entry in entries {
            networks.extend(compile_entry(entry.as_ref().trim())?);
        }
        Ok(AllowedRemotes::Subnets(networks))
    }

    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        match self {
            AllowedRemotes::Predicate(f) => f(ip),
            AllowedRemotes::Addresses(addresses) => addresses.contains(&ip),
            #[cfg(feature = "cidr")]
            AllowedRemotes::Subnets(networks) => {
                let mapped = match ip {
                    IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4),
                    IpAddr::V4(_) => None,
                };
                networks.iter().any(|net| {
                    net.contains(&ip) || mapped.is_some_and(|v4| net.contains(&v4))
                })
            }
        }
    }
}

impl fmt::Debug for AllowedRemotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedRemotes::Predicate(_) => f.write_str("Predicate(..)"),
            AllowedRemotes::Addresses(addresses) => {
                f.debug_tuple("Addresses").field(addresses).finish()
            }
            #[cfg(feature = "cidr")]
            AllowedRemotes::Subnets(networks) => f.debug_tuple("Subnets").field(networks).finish(),
        }
    }
}

impl From<&str> for AllowedRemotes {
    fn from(list: &str) -> Self {
        Self::from_comma_separated(list)
    }
}

impl From<Vec<String>> for AllowedRemotes {
    fn from(list: Vec<String>) -> Self {
        Self::from_list(list)
    }
}

impl From<Vec<&str>> for AllowedRemotes {
    fn from(list: Vec<&str>) -> Self {
        Self::from_list(list)
    }
}

#[cfg(feature = "cidr")]
fn compile_entry(entry: &str) -> Result<Vec<IpNet>> {
    let preset: &[&str] = match entry {
        "loopback" => &["127.0.0.1/8", "::1/128"],
        "linklocal" => &["169.254.0.0/16", "fe80::/10"],
        "uniquelocal" => &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fc00::/7"],
        _ => {
            let net = match entry.parse::<IpAddr>() {
                Ok(ip) => {
                    let host_len = if ip.is_ipv4() { 32 } else { 128 };
                    IpNet::new(ip, host_len)
                        .map_err(|_| ClientIpError::InvalidTrustEntry(entry.to_string()))?
                }
                Err(_) => entry
                    .parse::<IpNet>()
                    .map_err(|_| ClientIpError::InvalidTrustEntry(entry.to_string()))?,
            };
            return Ok(vec![net]);
        }
    };

    preset
        .iter()
        .map(|net| {
            net.parse::<IpNet>()
                .map_err(|_| ClientIpError::InvalidTrustEntry(net.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_predicate() {
        let remotes = AllowedRemotes::predicate(|ip| ip.is_loopback());
        assert!(remotes.is_trusted(ip("127.0.0.1")));
        assert!(!remotes.is_trusted(ip("203.0.113.1")));
    }

    #[test]
    fn test_exact_membership() {
        let remotes = AllowedRemotes::exact(["10.0.0.1", " ::1 ", "not-an-ip"]);
        assert!(remotes.is_trusted(ip("10.0.0.1")));
        assert!(remotes.is_trusted(ip("::1")));
        assert!(!remotes.is_trusted(ip("10.0.0.2")));
    }

    #[test]
    fn test_comma_separated_list() {
        let remotes = AllowedRemotes::from("10.0.0.1, 10.0.0.2");
        assert!(remotes.is_trusted(ip("10.0.0.2")));
        assert!(!remotes.is_trusted(ip("10.0.0.3")));
    }

    #[cfg(not(feature = "cidr"))]
    #[test]
    fn test_networks_degrade_to_exact_match_without_cidr() {
        let remotes = AllowedRemotes::from_list(["10.0.0.0/8", "10.0.0.1"]);
        assert!(matches!(remotes, AllowedRemotes::Addresses(_)));
        assert!(remotes.is_trusted(ip("10.0.0.1")));
        assert!(!remotes.is_trusted(ip("10.1.2.3")));
    }

    #[cfg(feature = "cidr")]
    #[test]
    fn test_subnets() {
        let remotes = AllowedRemotes::from_list(["10.0.0.0/8", "2001:db8::/32", "192.0.2.7"]);
        assert!(matches!(remotes, AllowedRemotes::Subnets(_)));
        assert!(remotes.is_trusted(ip("10.1.2.3")));
        assert!(remotes.is_trusted(ip("2001:db8::1")));
        assert!(remotes.is_trusted(ip("192.0.2.7")));
        assert!(!remotes.is_trusted(ip("192.0.2.8")));
    }

    #[cfg(feature = "cidr")]
    #[test]
    fn test_presets_and_mapped_addresses() {
        let remotes = AllowedRemotes::from("loopback, uniquelocal");
        assert!(remotes.is_trusted(ip("127.0.0.5")));
        assert!(remotes.is_trusted(ip("::ffff:192.168.1.10")));
        assert!(remotes.is_trusted(ip("fd00::1")));
        assert!(!remotes.is_trusted(ip("169.254.1.1")));
    }

    #[cfg(feature = "cidr")]
    #[test]
    fn test_invalid_entry_degrades_to_exact_match() {
        assert_eq!(
            AllowedRemotes::try_subnets(["10.0.0.0/8", "proxy.internal"]).err(),
            Some(ClientIpError::InvalidTrustEntry("proxy.internal".to_string()))
        );

        let remotes = AllowedRemotes::from_list(["10.0.0.0/8", "proxy.internal", "10.0.0.1"]);
        assert!(matches!(remotes, AllowedRemotes::Addresses(_)));
        assert!(remotes.is_trusted(ip("10.0.0.1")));
        assert!(!remotes.is_trusted(ip("10.0.0.2")));
    }
}
