//! Datalink channel abstraction.
//!
//! Provides a trait-based abstraction over raw frame I/O to enable:
//! - Testing the spoof and restore engines without real network interfaces
//! - Different capture backends

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::util::MacAddr;

use crate::error::{NetworkError, Result};

/// Trait for frame capture implementations.
pub trait PacketCapture: Send {
    /// Receive the next frame.
    /// Returns None on timeout or once the capture has ended.
    fn next_packet(&mut self) -> Option<Vec<u8>>;
}

/// Trait for frame sending implementations.
pub trait PacketSender: Send {
    /// Send a frame.
    fn send(&mut self, packet: &[u8]) -> Result<()>;
}

impl<S: PacketSender + ?Sized> PacketSender for &mut S {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        (**self).send(packet)
    }
}

/// Find an interface by name.
pub fn find_interface(name: &str) -> Result<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| NetworkError::InterfaceNotFound(name.to_string()).into())
}

/// Find the up, non-loopback interface attached to a network containing `target`.
///
/// With a `preferred` name only that interface is considered. `None` when no
/// attached network contains the target.
pub fn find_interface_for(target: Ipv4Addr, preferred: Option<&str>) -> Option<NetworkInterface> {
    select_interface(datalink::interfaces(), target, preferred)
}

fn select_interface(
    interfaces: impl IntoIterator<Item = NetworkInterface>,
    target: Ipv4Addr,
    preferred: Option<&str>,
) -> Option<NetworkInterface> {
    interfaces
        .into_iter()
        .filter(|iface| preferred.is_none_or(|name| iface.name == name))
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .find(|iface| {
            iface.ips.iter().any(|net| match net.ip() {
                IpAddr::V4(ip) => same_network(ip, target, net.prefix()),
                IpAddr::V6(_) => false,
            })
        })
}

/// Whether `a` and `b` share the first `prefix` bits.
pub fn same_network(a: Ipv4Addr, b: Ipv4Addr, prefix: u8) -> bool {
    let mask = prefix_to_mask(prefix);
    u32::from(a) & mask == u32::from(b) & mask
}

/// Netmask with the `prefix` high bits set.
pub const fn prefix_to_mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p),
    }
}

/// Extract the interface's first IPv4 address and its MAC.
pub fn get_interface_info(interface: &NetworkInterface) -> Result<(Ipv4Addr, MacAddr)> {
    let mac = interface
        .mac
        .ok_or_else(|| NetworkError::NoHardwareAddress(interface.name.clone()))?;

    let ip = interface
        .ips
        .iter()
        .find_map(|ip| match ip.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| NetworkError::NoIpv4Address(interface.name.clone()))?;

    Ok((ip, mac))
}

/// Production frame capture using pnet.
pub struct PnetCapture {
    rx: Box<dyn DataLinkReceiver>,
}

impl PnetCapture {
    /// Open a channel on the given interface.
    ///
    /// With a `read_timeout`, [`PacketCapture::next_packet`] returns `None`
    /// when nothing arrives in time instead of blocking forever.
    pub fn new(
        interface: &NetworkInterface,
        read_timeout: Option<Duration>,
    ) -> Result<(Self, PnetSender)> {
        let config = datalink::Config {
            read_timeout,
            ..datalink::Config::default()
        };
        let (tx, rx) = match datalink::channel(interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => return Err(NetworkError::UnsupportedChannel.into()),
            Err(e) => return Err(NetworkError::ChannelOpen(e.to_string()).into()),
        };

        Ok((Self { rx }, PnetSender { tx }))
    }
}

impl PacketCapture for PnetCapture {
    fn next_packet(&mut self) -> Option<Vec<u8>> {
        self.rx.next().ok().map(<[u8]>::to_vec)
    }
}

/// Production frame sender using pnet.
pub struct PnetSender {
    tx: Box<dyn DataLinkSender>,
}

impl PnetSender {
    /// Open a send-only channel on the named interface.
    pub fn open(interface_name: &str) -> Result<Self> {
        let interface = find_interface(interface_name)?;
        let (_, sender) = PnetCapture::new(&interface, None)?;
        Ok(sender)
    }
}

impl PacketSender for PnetSender {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.tx
            .send_to(packet, None)
            .ok_or_else(|| NetworkError::SendFailed("send returned None".into()))?
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
