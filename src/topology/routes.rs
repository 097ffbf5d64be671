//! Read-only access to the system's IPv4 routing state.
//!
//! On Linux the routing table comes from `/proc/net/route`; on macOS from
//! `netstat -rn -f inet`. Both parsers are plain functions so they can be
//! exercised on any platform.

use std::cmp::Reverse;
use std::net::Ipv4Addr;

use pnet::datalink;
use pnet::util::MacAddr;

use crate::error::{NetworkError, Result};

/// `RTF_UP` flag of `/proc/net/route`.
const RTF_UP: u32 = 0x0001;
/// `RTF_GATEWAY` flag of `/proc/net/route`.
const RTF_GATEWAY: u32 = 0x0002;

/// One row of the IPv4 routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub destination: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub interface: String,
    pub metric: u32,
}

impl RouteEntry {
    /// A catch-all `0.0.0.0/0` route.
    pub fn is_default(&self) -> bool {
        self.destination.is_unspecified() && self.mask.is_unspecified()
    }
}

/// A gateway reachable through an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEntry {
    pub ip: Ipv4Addr,
    pub interface: String,
    pub is_default: bool,
}

/// Route and interface query facility.
///
/// Only [`RouteSource::routes`] and [`RouteSource::interface_mac`] must be
/// provided; the gateway views are derived from the routing table.
pub trait RouteSource: Send + Sync {
    /// The full IPv4 routing table, in table order.
    fn routes(&self) -> Result<Vec<RouteEntry>>;

    /// Link-layer address of the named interface, if it exists.
    fn interface_mac(&self, interface: &str) -> Result<Option<MacAddr>>;

    /// Every IPv4 gateway with the interface it is reached through.
    fn gateways(&self) -> Result<Vec<GatewayEntry>> {
        Ok(self
            .routes()?
            .into_iter()
            .filter_map(|route| {
                let ip = route.gateway?;
                Some(GatewayEntry {
                    ip,
                    is_default: route.is_default(),
                    interface: route.interface,
                })
            })
            .collect())
    }

    /// The IPv4 default route's gateway and interface.
    ///
    /// With several default routes the lowest metric wins.
    fn default_gateway(&self) -> Result<Option<GatewayEntry>> {
        let routes = self.routes()?;
        Ok(routes
            .iter()
            .filter(|route| route.is_default())
            .filter_map(|route| Some((route.gateway?, route)))
            .min_by_key(|(_, route)| route.metric)
            .map(|(ip, route)| GatewayEntry {
                ip,
                interface: route.interface.clone(),
                is_default: true,
            }))
    }
}

/// Pick the network route of `interface` by longest prefix match.
///
/// Host routes (`255.255.255.255` masks) are ignored. Among the remaining
/// routes of the interface the numerically largest mask wins; ties go to the
/// lowest metric, then to the route listed first.
pub fn select_network_route<'a>(routes: &'a [RouteEntry], interface: &str) -> Option<&'a RouteEntry> {
    routes
        .iter()
        .filter(|route| route.interface == interface && route.mask != Ipv4Addr::BROADCAST)
        .fold(None, |best: Option<&RouteEntry>, route| match best {
            Some(best) if rank(best) >= rank(route) => Some(best),
            _ => Some(route),
        })
}

fn rank(route: &RouteEntry) -> (u32, Reverse<u32>) {
    (u32::from(route.mask), Reverse(route.metric))
}

/// Routing state of the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRoutes;

impl RouteSource for SystemRoutes {
    #[cfg(target_os = "linux")]
    fn routes(&self) -> Result<Vec<RouteEntry>> {
        let table = std::fs::read_to_string("/proc/net/route")
            .map_err(|e| NetworkError::RouteTable(format!("failed to read /proc/net/route: {e}")))?;
        parse_proc_net_route(&table)
    }

    #[cfg(target_os = "macos")]
    fn routes(&self) -> Result<Vec<RouteEntry>> {
        use std::process::Command;

        let output = Command::new("netstat")
            .args(["-rn", "-f", "inet"])
            .output()
            .map_err(|e| NetworkError::RouteTable(format!("failed to run netstat: {e}")))?;

        if !output.status.success() {
            return Err(NetworkError::RouteTable(format!("netstat exited with {}", output.status)).into());
        }

        Ok(parse_netstat_routes(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn routes(&self) -> Result<Vec<RouteEntry>> {
        Err(NetworkError::RouteTable("routing table access is not supported on this platform".into()).into())
    }

    fn interface_mac(&self, interface: &str) -> Result<Option<MacAddr>> {
        Ok(datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == interface)
            .and_then(|iface| iface.mac))
    }
}

/// Parse the content of `/proc/net/route`.
///
/// Addresses are printed as hexadecimal in network byte order read as a
/// host integer, hence the `to_be` conversion.
pub fn parse_proc_net_route(content: &str) -> Result<Vec<RouteEntry>> {
    let mut routes = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            continue;
        }

        let flags = parse_hex(fields[3])?;
        if flags & RTF_UP == 0 {
            continue;
        }

        let gateway = Ipv4Addr::from(parse_hex(fields[2])?.to_be());
        routes.push(RouteEntry {
            interface: fields[0].to_string(),
            destination: Ipv4Addr::from(parse_hex(fields[1])?.to_be()),
            gateway: (flags & RTF_GATEWAY != 0 && !gateway.is_unspecified()).then_some(gateway),
            metric: fields[6]
                .parse()
                .map_err(|e| NetworkError::RouteTable(format!("invalid metric {:?}: {e}", fields[6])))?,
            mask: Ipv4Addr::from(parse_hex(fields[7])?.to_be()),
        });
    }

    Ok(routes)
}

fn parse_hex(field: &str) -> Result<u32> {
    u32::from_str_radix(field, 16)
        .map_err(|e| NetworkError::RouteTable(format!("invalid field {field:?}: {e}")).into())
}

/// Parse the output of `netstat -rn -f inet`.
///
/// Destinations use the BSD shorthand: `default`, `127`, `192.168.1`,
/// `192.168.1/24` or a full host address flagged `H`. Rows that cannot be
/// understood are skipped. netstat does not print metrics, so every route
/// gets metric 0.
pub fn parse_netstat_routes(content: &str) -> Vec<RouteEntry> {
    content
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Destination"))
        .skip(1)
        .filter_map(parse_netstat_line)
        .collect()
}

fn parse_netstat_line(line: &str) -> Option<RouteEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }

    let flags = fields[2];
    let (destination, prefix) = parse_bsd_destination(fields[0], flags.contains('H'))?;

    Some(RouteEntry {
        destination,
        mask: Ipv4Addr::from(crate::network::prefix_to_mask(prefix)),
        gateway: fields[1].parse().ok(),
        interface: fields[3].to_string(),
        metric: 0,
    })
}

fn parse_bsd_destination(destination: &str, host: bool) -> Option<(Ipv4Addr, u8)> {
    if destination == "default" {
        return Some((Ipv4Addr::UNSPECIFIED, 0));
    }

    let (address, explicit_prefix) = match destination.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix.parse::<u8>().ok().filter(|p| *p <= 32)?)),
        None => (destination, None),
    };

    let mut octets = [0u8; 4];
    let mut count = 0;
    for (slot, part) in octets.iter_mut().zip(address.split('.')) {
        *slot = part.parse().ok()?;
        count += 1;
    }
    if count == 0 || address.split('.').count() > 4 {
        return None;
    }

    let prefix = match explicit_prefix {
        Some(prefix) => prefix,
        None if host => 32,
        None => count * 8,
    };

    Some((Ipv4Addr::from(octets), prefix))
}
