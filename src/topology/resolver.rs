//! Topology resolution.
//!
//! 1. Interface and gateway IP, from the explicit interface or the default route
//! 2. Gateway MAC, from a discovery probe against the gateway alone
//! 3. Interface MAC, from the OS interface table
//! 4. Network, from the most specific route owned by the interface

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::routes::{RouteSource, select_network_route};
use super::{Gateway, Interface, Network, Topology, TopologyHandle};
use crate::discovery::{HostDiscovery, ProbeTarget};
use crate::error::{Result, TopologyError};

/// Asks the operator for an interface name when no default route exists.
///
/// Closures returning `Option<String>` are prompts too.
pub trait InterfacePrompt {
    /// `None` when the operator cannot or will not answer.
    fn ask_interface(&mut self) -> Option<String>;
}

impl<F: FnMut() -> Option<String>> InterfacePrompt for F {
    fn ask_interface(&mut self) -> Option<String> {
        self()
    }
}

/// Prompt for non-interactive runs: never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl InterfacePrompt for NoPrompt {
    fn ask_interface(&mut self) -> Option<String> {
        None
    }
}

/// Derives the [`Topology`] from the routing state and a discovery probe.
pub struct TopologyResolver<R, D> {
    routes: R,
    discovery: D,
}

impl<R: RouteSource, D: HostDiscovery> TopologyResolver<R, D> {
    pub const fn new(routes: R, discovery: D) -> Self {
        Self { routes, discovery }
    }

    /// Resolve interface, gateway and network together.
    ///
    /// `explicit` skips the default route lookup. `prompt` is consulted at
    /// most once, only when there is no default route.
    ///
    /// # Errors
    ///
    /// Every failure is a [`TopologyError`] or a failure to read the
    /// routing state. No partial topology is ever returned.
    pub async fn resolve<P: InterfacePrompt + ?Sized>(
        &self,
        explicit: Option<&str>,
        prompt: &mut P,
    ) -> Result<Topology> {
        let (interface, gateway_ip) = self.gateway_ip(explicit, prompt)?;
        debug!(%interface, %gateway_ip, "gateway found");

        let gateway_mac = self
            .discovery
            .probe(&ProbeTarget::Address(gateway_ip))
            .await?
            .first()
            .map(|host| host.mac)
            .ok_or(TopologyError::GatewayUnreachable(gateway_ip))?;

        let interface_mac = self
            .routes
            .interface_mac(&interface)?
            .ok_or_else(|| TopologyError::InterfaceNotFound(interface.clone()))?;

        let routes = self.routes.routes()?;
        let route = select_network_route(&routes, &interface)
            .ok_or_else(|| TopologyError::NoEligibleRoute(interface.clone()))?;
        let network = Network::new(route.destination, route.mask);

        info!(
            %interface,
            gateway = %gateway_ip,
            %gateway_mac,
            %network,
            "topology resolved"
        );

        Ok(Topology {
            interface: Interface {
                name: interface,
                mac: interface_mac,
            },
            gateway: Gateway {
                ip: gateway_ip,
                mac: gateway_mac,
            },
            network,
        })
    }

    /// Re-run the full resolution and publish it through `handle`.
    ///
    /// On failure the handle keeps its previous topology.
    pub async fn sync<P: InterfacePrompt + ?Sized>(
        &self,
        handle: &TopologyHandle,
        explicit: Option<&str>,
        prompt: &mut P,
    ) -> Result<Arc<Topology>> {
        let topology = self.resolve(explicit, prompt).await?;
        Ok(handle.publish(topology))
    }

    fn gateway_ip<P: InterfacePrompt + ?Sized>(
        &self,
        explicit: Option<&str>,
        prompt: &mut P,
    ) -> Result<(String, Ipv4Addr)> {
        if let Some(interface) = explicit {
            return self.gateway_of(interface);
        }

        if let Some(entry) = self.routes.default_gateway()? {
            return Ok((entry.interface, entry.ip));
        }

        warn!("no IPv4 default route, asking for an interface");
        match prompt.ask_interface() {
            Some(interface) if !interface.trim().is_empty() => self.gateway_of(interface.trim()),
            _ => Err(TopologyError::NoDefaultRoute.into()),
        }
    }

    fn gateway_of(&self, interface: &str) -> Result<(String, Ipv4Addr)> {
        let entry = self
            .routes
            .gateways()?
            .into_iter()
            .find(|entry| entry.interface == interface)
            .ok_or_else(|| TopologyError::GatewayNotFound(interface.to_string()))?;
        Ok((entry.interface, entry.ip))
    }
}
