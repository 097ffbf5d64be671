//! Terminal output.

mod spinner;

use std::fmt::Write as _;

use crate::discovery::Host;
use crate::target::Target;
use crate::topology::Topology;

pub use spinner::{Spinner, with_spinner};

/// The interface packets leave from.
pub fn interface_line(topology: &Topology) -> String {
    format!(
        "Using interface {} with MAC address {}",
        topology.interface.name, topology.interface.mac
    )
}

/// Interface, gateway and how many hosts answered.
pub fn network_summary(topology: &Topology, active_hosts: usize) -> String {
    format!(
        "{}\nGateway: {} ({}) --> {active_hosts} active hosts on {}",
        interface_line(topology),
        topology.gateway.ip,
        topology.gateway.mac,
        topology.network,
    )
}

/// Numbered host table, indexes as accepted by the block menu.
pub fn host_table(hosts: &[Host]) -> String {
    let mut table = String::from("Connected hosts:\n");
    for (index, host) in hosts.iter().enumerate() {
        let _ = writeln!(
            table,
            "  [{index}] {:<15}  {}  {} ({})",
            host.ip,
            host.mac,
            host.vendor,
            host.hostname
        );
    }
    table
}

/// Comma-separated target addresses.
pub fn target_list(targets: &[Target]) -> String {
    targets
        .iter()
        .map(|target| target.ip().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
