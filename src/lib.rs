//! Diamond - block devices on your local network.
//!
//! Diamond finds the interface, gateway and subnet of the machine it runs
//! on, lists the live hosts of that subnet and cuts chosen hosts off the
//! gateway by poisoning their ARP caches. Every blocking session ends by
//! restoring the real gateway address in the targets' caches.
//!
//! Only use it on networks you own or manage.
//!
//! # Architecture
//!
//! - [`topology`]: Interface, gateway and network resolution
//! - [`discovery`]: Live host discovery, vendor and hostname lookups
//! - [`target`]: Target selection and the gateway safety rule
//! - [`session`]: The spoof and restore engines
//! - [`network`]: ARP frames and datalink I/O
//! - [`config`]: Configuration loading and validation
//! - [`preflight`]: Privilege and connectivity checks
//! - [`cli`] and [`ui`]: Command line and terminal output
//! - [`error`]: Error types
//!
//! # Testing
//!
//! The engines are written against traits so they can be driven without a
//! network:
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use diamond::topology::select_network_route;
//! use diamond::topology::routes::parse_proc_net_route;
//!
//! let table = "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\tMTU\tWindow\tIRTT\n\
//!              eth0\t0001A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0\n";
//! let routes = parse_proc_net_route(table).unwrap();
//! let route = select_network_route(&routes, "eth0").unwrap();
//! assert_eq!(route.destination, Ipv4Addr::new(192, 168, 1, 0));
//! ```

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod network;
pub mod preflight;
pub mod session;
pub mod target;
pub mod topology;
pub mod ui;

pub use config::Config;
pub use error::{Error, Result};
