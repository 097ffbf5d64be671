//! Host discovery: who is alive on the local network.
//!
//! Discovery is a collaborator of the blocking core. The core only depends
//! on the [`HostDiscovery`] trait; the production implementation is an ARP
//! sweep ([`ArpScanner`]) whose raw `(ip, mac)` answers are enriched with a
//! vendor name and a hostname.

mod arp_scan;
pub mod hostname;
pub mod vendor;

use std::fmt;
use std::future::Future;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::util::MacAddr;

use crate::error::{NetworkError, Result};
use crate::network::prefix_to_mask;

pub use arp_scan::{ArpScanner, WIDEST_SWEEP_PREFIX};
pub use hostname::{HostnameLookup, PtrResolver};
pub use vendor::{MacVendors, VendorLookup};

/// Placeholder for a vendor or hostname that could not be found.
pub const NOT_AVAILABLE: &str = "N/A";

/// A live host on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub vendor: String,
    pub hostname: String,
}

impl Host {
    /// A host with placeholder vendor and hostname.
    pub fn bare(ip: Ipv4Addr, mac: MacAddr) -> Self {
        Self {
            ip,
            mac,
            vendor: NOT_AVAILABLE.into(),
            hostname: NOT_AVAILABLE.into(),
        }
    }
}

/// What a probe is aimed at: one address or a whole network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTarget {
    Address(Ipv4Addr),
    Network { ip: Ipv4Addr, prefix: u8 },
}

impl ProbeTarget {
    /// An address that belongs to the probed range.
    pub const fn anchor(&self) -> Ipv4Addr {
        match *self {
            Self::Address(ip) | Self::Network { ip, .. } => ip,
        }
    }

    /// The same probe, cut down to the `/max_prefix` around `around` when
    /// it covers a wider network.
    #[must_use]
    pub fn narrowed(&self, around: Ipv4Addr, max_prefix: u8) -> Self {
        match *self {
            Self::Network { prefix, .. } if prefix < max_prefix => Self::Network {
                ip: Ipv4Addr::from(u32::from(around) & prefix_to_mask(max_prefix)),
                prefix: max_prefix,
            },
            other => other,
        }
    }

    /// Every address to ask for.
    ///
    /// Network and broadcast addresses are left out unless the prefix is
    /// /31 or /32, where every address is a host.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        match *self {
            Self::Address(ip) => vec![ip],
            Self::Network { ip, prefix } => {
                let mask = prefix_to_mask(prefix);
                let first = u32::from(ip) & mask;
                let last = first | !mask;
                let range = if prefix >= 31 {
                    first..=last
                } else {
                    (first + 1)..=(last - 1)
                };
                range.map(Ipv4Addr::from).collect()
            }
        }
    }
}

impl FromStr for ProbeTarget {
    type Err = NetworkError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || NetworkError::InvalidProbeTarget(s.to_string());

        match s.split_once('/') {
            None => s.parse().map(Self::Address).map_err(|_| invalid()),
            Some((ip, prefix)) => {
                let ip: Ipv4Addr = ip.parse().map_err(|_| invalid())?;
                let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
                if prefix > 32 {
                    return Err(invalid());
                }
                let ip = Ipv4Addr::from(u32::from(ip) & prefix_to_mask(prefix));
                Ok(Self::Network { ip, prefix })
            }
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(ip) => write!(f, "{ip}"),
            Self::Network { ip, prefix } => write!(f, "{ip}/{prefix}"),
        }
    }
}

impl From<Ipv4Addr> for ProbeTarget {
    fn from(ip: Ipv4Addr) -> Self {
        Self::Address(ip)
    }
}

/// Trait for host discovery.
///
/// An empty result means nothing answered; it is not an error.
pub trait HostDiscovery: Send + Sync {
    /// Find the live hosts in `target`, ordered by IP.
    fn probe(&self, target: &ProbeTarget) -> impl Future<Output = Result<Vec<Host>>> + Send;
}

/// Attach vendor and hostname to raw sweep answers.
pub async fn enrich<V, H>(
    raw: Vec<(Ipv4Addr, MacAddr)>,
    vendors: Option<&V>,
    hostnames: Option<&H>,
) -> Vec<Host>
where
    V: VendorLookup,
    H: HostnameLookup,
{
    let mut hosts = Vec::with_capacity(raw.len());
    for (ip, mac) in raw {
        let mut host = Host::bare(ip, mac);
        if let Some(vendors) = vendors {
            host.vendor = vendors.vendor(mac).await;
        }
        if let Some(hostnames) = hostnames
            && let Some(name) = hostnames.hostname(ip).await
        {
            host.hostname = name;
        }
        hosts.push(host);
    }
    hosts
}
