//! Local network topology: which interface we talk through, where the
//! gateway is, and which subnet we are on.
//!
//! The three records are always derived together by [`TopologyResolver`]
//! and published as one immutable [`Topology`]. Re-resolution swaps the
//! whole value at once through [`TopologyHandle`], so readers never see a
//! gateway from one resolution next to a network from another.

mod resolver;
pub mod routes;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::RwLock;
use pnet::util::MacAddr;

pub use resolver::{InterfacePrompt, NoPrompt, TopologyResolver};
pub use routes::{GatewayEntry, RouteEntry, RouteSource, SystemRoutes, select_network_route};

/// The interface packets are sent from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub mac: MacAddr,
}

/// The default gateway of [`Interface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gateway {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// The subnet reached through [`Interface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub cidr: String,
}

impl Network {
    /// Build a network from a destination and mask, in `ip/prefixlen` form.
    pub fn new(destination: Ipv4Addr, mask: Ipv4Addr) -> Self {
        let ip = Ipv4Addr::from(u32::from(destination) & u32::from(mask));
        let cidr = format!("{ip}/{}", u32::from(mask).count_ones());
        Self { ip, mask, cidr }
    }

    /// Number of leading one bits in the mask.
    pub fn prefix_len(&self) -> u32 {
        u32::from(self.mask).count_ones()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cidr)
    }
}

/// A complete resolution result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub interface: Interface,
    pub gateway: Gateway,
    pub network: Network,
}

/// Shared, atomically replaceable topology.
#[derive(Debug, Clone)]
pub struct TopologyHandle {
    current: Arc<RwLock<Arc<Topology>>>,
}

impl TopologyHandle {
    pub fn new(topology: Topology) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(topology))),
        }
    }

    /// Snapshot of the latest topology.
    pub fn current(&self) -> Arc<Topology> {
        Arc::clone(&self.current.read())
    }

    /// Publish a freshly resolved topology and return the published snapshot.
    pub fn publish(&self, topology: Topology) -> Arc<Topology> {
        let published = Arc::new(topology);
        *self.current.write() = Arc::clone(&published);
        published
    }
}
