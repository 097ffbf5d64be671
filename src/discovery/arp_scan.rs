//! ARP sweep host discovery.
//!
//! 1. Find the interface attached to the probed network
//! 2. Broadcast one ARP request per address
//! 3. Collect replies until every address answered or the timeout expires
//!
//! An address outside every attached network yields no host. Networks wider
//! than a /16 are swept only around our own address.
//!
//! The sweep itself is blocking raw-socket I/O and runs on the blocking pool.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use pnet::packet::arp::ArpOperations;
use pnet::util::MacAddr;
use tracing::{debug, info, warn};

use super::{HostDiscovery, Host, HostnameLookup, MacVendors, ProbeTarget, PtrResolver, VendorLookup, enrich};
use crate::error::Result;
use crate::metrics::HOSTS_DISCOVERED_TOTAL;
use crate::network::{PacketCapture, PacketSender, PnetCapture, arp, find_interface_for, get_interface_info};

/// Read timeout of the capture channel, bounds how late the deadline is noticed.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Widest network a single sweep covers.
pub const WIDEST_SWEEP_PREFIX: u8 = 16;

/// Discovers hosts by broadcasting ARP requests.
pub struct ArpScanner<V = MacVendors, H = PtrResolver> {
    timeout: Duration,
    interface: Option<String>,
    vendors: Option<V>,
    hostnames: Option<H>,
}

impl ArpScanner {
    /// A scanner that reports bare hosts, waiting `timeout` for replies.
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interface: None,
            vendors: None,
            hostnames: None,
        }
    }
}

impl<V, H> ArpScanner<V, H> {
    /// Only sweep through the named interface.
    #[must_use]
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    /// Look up the vendor of every discovered host.
    pub fn with_vendors<V2: VendorLookup>(self, vendors: V2) -> ArpScanner<V2, H> {
        ArpScanner {
            timeout: self.timeout,
            interface: self.interface,
            vendors: Some(vendors),
            hostnames: self.hostnames,
        }
    }

    /// Resolve the hostname of every discovered host.
    pub fn with_hostnames<H2: HostnameLookup>(self, hostnames: H2) -> ArpScanner<V, H2> {
        ArpScanner {
            timeout: self.timeout,
            interface: self.interface,
            vendors: self.vendors,
            hostnames: Some(hostnames),
        }
    }
}

impl<V: VendorLookup, H: HostnameLookup> HostDiscovery for ArpScanner<V, H> {
    async fn probe(&self, target: &ProbeTarget) -> Result<Vec<Host>> {
        let target = *target;
        let timeout = self.timeout;
        let interface = self.interface.clone();
        let raw =
            tokio::task::spawn_blocking(move || sweep(&target, timeout, interface.as_deref())).await??;

        info!(%target, hosts = raw.len(), "sweep finished");
        metrics::counter!(HOSTS_DISCOVERED_TOTAL).increment(raw.len() as u64);

        Ok(enrich(raw, self.vendors.as_ref(), self.hostnames.as_ref()).await)
    }
}

fn sweep(
    target: &ProbeTarget,
    timeout: Duration,
    preferred: Option<&str>,
) -> Result<Vec<(Ipv4Addr, MacAddr)>> {
    let Some(interface) = find_interface_for(target.anchor(), preferred) else {
        debug!(%target, ?preferred, "no attached network contains the target");
        return Ok(Vec::new());
    };
    let (our_ip, our_mac) = get_interface_info(&interface)?;

    let target = {
        let narrowed = target.narrowed(our_ip, WIDEST_SWEEP_PREFIX);
        if narrowed != *target {
            warn!(%target, sweep = %narrowed, "network too wide, sweeping around our address only");
        }
        narrowed
    };
    debug!(interface = %interface.name, %our_ip, %target, "starting ARP sweep");

    let (mut capture, mut sender) = PnetCapture::new(&interface, Some(READ_TIMEOUT))?;

    let wanted: BTreeSet<Ipv4Addr> = target
        .addresses()
        .into_iter()
        .filter(|ip| *ip != our_ip)
        .collect();

    for ip in &wanted {
        sender.send(&arp::build_arp_request(our_ip, our_mac, *ip)?)?;
    }

    Ok(collect_replies(
        &mut capture,
        &wanted,
        our_mac,
        Instant::now() + timeout,
    ))
}

/// Gather ARP replies from `wanted` addresses until `deadline`.
///
/// The first answer per address wins. Frames claiming our own MAC are
/// ignored. The result is ordered by IP.
fn collect_replies<C: PacketCapture + ?Sized>(
    capture: &mut C,
    wanted: &BTreeSet<Ipv4Addr>,
    our_mac: MacAddr,
    deadline: Instant,
) -> Vec<(Ipv4Addr, MacAddr)> {
    let mut found = BTreeMap::new();

    while found.len() < wanted.len() && Instant::now() < deadline {
        let Some(frame) = capture.next_packet() else {
            continue;
        };
        let Some(reply) = arp::parse_arp_packet(&frame) else {
            continue;
        };

        if reply.operation != ArpOperations::Reply
            || reply.sender_mac == our_mac
            || !wanted.contains(&reply.sender_ip)
        {
            continue;
        }

        found.entry(reply.sender_ip).or_insert(reply.sender_mac);
    }

    found.into_iter().collect()
}
