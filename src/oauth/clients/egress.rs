//! Outbound address policy for URIs the provider will later contact on a
//! client's behalf (`jwks_uri`, `backchannel_logout_uri`, `request_uris`).

use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use url::{Host, Url};

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Networks that are never publicly routable.
const RESERVED_NETWORKS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "255.255.255.255/32",
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
];

/// Decides whether a URI may be dereferenced by the provider.
#[derive(Clone)]
pub struct EgressPolicy {
    disallow_private: bool,
    reserved: Vec<IpNetwork>,
}

impl EgressPolicy {
    pub fn new(disallow_private_ip_ranges: bool) -> Self {
        let reserved = RESERVED_NETWORKS
            .iter()
            .filter_map(|cidr| IpNetwork::from_str(cidr).ok())
            .collect();
        Self {
            disallow_private: disallow_private_ip_ranges,
            reserved,
        }
    }

    /// Whether URIs are checked at all.
    pub fn is_restricted(&self) -> bool {
        self.disallow_private
    }

    pub fn is_public_address(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        !self.reserved.iter().any(|network| network.contains(ip))
    }

    /// Resolve the URI's host and require every address to be public.
    ///
    /// Returns a caller-facing reason on rejection. Resolution failures are
    /// rejections.
    pub async fn check_uri(&self, uri: &str) -> Result<(), String> {
        if !self.disallow_private {
            return Ok(());
        }

        let url = Url::parse(uri).map_err(|e| format!("{} is not a valid URI: {}", uri, e))?;
        let port = url.port_or_known_default().unwrap_or(443);

        let addresses: Vec<IpAddr> = match url.host() {
            Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
            Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
            Some(Host::Domain(domain)) => {
                let lookup = tokio::net::lookup_host((domain, port));
                match tokio::time::timeout(RESOLVE_TIMEOUT, lookup).await {
                    Ok(Ok(resolved)) => resolved.map(|addr| addr.ip()).collect(),
                    Ok(Err(e)) => {
                        tracing::debug!(host = %domain, error = %e, "host resolution failed");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::debug!(host = %domain, "host resolution timed out");
                        Vec::new()
                    }
                }
            }
            None => return Err(format!("{} has no host", uri)),
        };

        if addresses.is_empty() {
            return Err(format!("{} could not be resolved", uri));
        }

        if let Some(blocked) = addresses.iter().find(|ip| !self.is_public_address(**ip)) {
            tracing::warn!(uri = %uri, address = %blocked, "rejected URI resolving to a private address");
            return Err(format!("{} resolves to a non-public address", uri));
        }

        Ok(())
    }
}
