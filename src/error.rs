//! Error types for diamond.

use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Main error type for diamond operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("target selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("DNS protocol error: {0}")]
    Protocol(#[from] hickory_proto::ProtoError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("a blocking session needs at least one target")]
    EmptyTargets,
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("packets_per_minute must be between {min} and {max}, got {value}")]
    PacketsOutOfRange { value: u32, min: u32, max: u32 },

    #[error("restore.window_secs must be greater than 0")]
    ZeroRestoreWindow,

    #[error("restore.delay_ms must be greater than 0")]
    ZeroRestoreDelay,

    #[error("restore.delay_ms ({delay_ms}) cannot exceed the restore window ({window_ms} ms)")]
    RestoreDelayTooLong { delay_ms: u64, window_ms: u64 },

    #[error("discovery.timeout_ms must be greater than 0")]
    ZeroDiscoveryTimeout,

    #[error("connectivity_url must use the https scheme: {url:?}")]
    InsecureConnectivityUrl { url: String },

    #[error("discovery.vendor_api must start with http:// or https://: {url:?}")]
    InvalidVendorApi { url: String },

    #[error("interface name cannot be empty")]
    EmptyInterface,
}

/// Network-related errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("interface {0:?} not found")]
    InterfaceNotFound(String),

    #[error("interface {0:?} has no hardware address")]
    NoHardwareAddress(String),

    #[error("interface {0:?} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("failed to open datalink channel: {0}")]
    ChannelOpen(String),

    #[error("unsupported channel type")]
    UnsupportedChannel,

    #[error("failed to send packet: {0}")]
    SendFailed(String),

    #[error("packet construction failed: {0}")]
    PacketConstruction(String),

    #[error("failed to read routing table: {0}")]
    RouteTable(String),

    #[error("invalid probe target {0:?}")]
    InvalidProbeTarget(String),
}

/// Failures while deriving the interface, gateway and network.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("no IPv4 default route found")]
    NoDefaultRoute,

    #[error("could not find a gateway for interface {0:?}")]
    GatewayNotFound(String),

    #[error("gateway {0} did not answer the discovery probe")]
    GatewayUnreachable(Ipv4Addr),

    #[error("interface {0:?} not found")]
    InterfaceNotFound(String),

    #[error("no eligible route found for interface {0:?}")]
    NoEligibleRoute(String),
}

/// Fatal outcomes of target selection.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("{0:?} is not a valid IPv4 address")]
    InvalidAddress(String),

    #[error("there are no active hosts on the network")]
    NoActiveHosts,

    #[error("the only active host is the gateway, there is nobody to block")]
    OnlyGateway,

    #[error("none of the targets are active")]
    NoActiveTargets,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
