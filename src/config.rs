//! Configuration loading and validation.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Lowest accepted blocking rate, in packets per minute.
pub const MIN_PACKETS_PER_MINUTE: u32 = 1;

/// Highest accepted blocking rate, in packets per minute.
pub const MAX_PACKETS_PER_MINUTE: u32 = 120;

/// Main configuration for diamond.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Network interface to send packets from. If None, use the default route's interface.
    pub interface: Option<String>,

    /// Spoofed ARP replies sent to each target per minute.
    #[serde(default = "default_packets_per_minute")]
    pub packets_per_minute: u32,

    /// Refuse to start when the connectivity check fails.
    #[serde(default = "default_check_connectivity")]
    pub check_connectivity: bool,

    /// URL fetched by the connectivity check.
    #[serde(default = "default_connectivity_url")]
    pub connectivity_url: String,

    /// How the poisoned ARP caches are repaired once blocking stops.
    #[serde(default)]
    pub restore: RestoreSettings,

    /// Host discovery tuning.
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Prometheus exporter.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Restoration window settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreSettings {
    /// Total time spent sending legitimate ARP replies.
    #[serde(default = "default_restore_window")]
    pub window_secs: u64,

    /// Delay between two restoration rounds.
    #[serde(default = "default_restore_delay")]
    pub delay_ms: u64,
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            window_secs: default_restore_window(),
            delay_ms: default_restore_delay(),
        }
    }
}

impl RestoreSettings {
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Host discovery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoverySettings {
    /// How long an ARP sweep waits for replies.
    #[serde(default = "default_discovery_timeout")]
    pub timeout_ms: u64,

    /// Look up the vendor name of every discovered MAC address.
    #[serde(default = "default_true")]
    pub resolve_vendors: bool,

    /// Base URL of the MAC vendor API; the MAC address is appended to it.
    #[serde(default = "default_vendor_api")]
    pub vendor_api: String,

    /// Minimum spacing between two vendor API requests.
    #[serde(default = "default_vendor_min_interval")]
    pub vendor_min_interval_ms: u64,

    /// Resolve hostnames with reverse DNS.
    #[serde(default = "default_true")]
    pub resolve_hostnames: bool,

    /// DNS server used for reverse lookups. If None, the gateway on port 53.
    #[serde(default, deserialize_with = "deserialize_optional_socket_addr")]
    pub dns_server: Option<SocketAddr>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_discovery_timeout(),
            resolve_vendors: true,
            vendor_api: default_vendor_api(),
            vendor_min_interval_ms: default_vendor_min_interval(),
            resolve_hostnames: true,
            dns_server: None,
        }
    }
}

impl DiscoverySettings {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub const fn vendor_min_interval(&self) -> Duration {
        Duration::from_millis(self.vendor_min_interval_ms)
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            packets_per_minute: default_packets_per_minute(),
            check_connectivity: default_check_connectivity(),
            connectivity_url: default_connectivity_url(),
            restore: RestoreSettings::default(),
            discovery: DiscoverySettings::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

const fn default_packets_per_minute() -> u32 {
    30
}

const fn default_check_connectivity() -> bool {
    true
}

fn default_connectivity_url() -> String {
    "https://github.com".into()
}

const fn default_restore_window() -> u64 {
    10
}

const fn default_restore_delay() -> u64 {
    500
}

const fn default_discovery_timeout() -> u64 {
    2000
}

const fn default_true() -> bool {
    true
}

fn default_vendor_api() -> String {
    "https://api.macvendors.com/".into()
}

const fn default_vendor_min_interval() -> u64 {
    1000
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn deserialize_optional_socket_addr<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SocketAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    s.parse().map(Some).map_err(serde::de::Error::custom)
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Load configuration from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_packets_per_minute(self.packets_per_minute).map_err(ConfigError::from)?;

        if self.interface.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::from(ValidationError::EmptyInterface).into());
        }

        if self.restore.window_secs == 0 {
            return Err(ConfigError::from(ValidationError::ZeroRestoreWindow).into());
        }

        if self.restore.delay_ms == 0 {
            return Err(ConfigError::from(ValidationError::ZeroRestoreDelay).into());
        }

        let window_ms = self.restore.window_secs.saturating_mul(1000);
        if self.restore.delay_ms > window_ms {
            return Err(ConfigError::from(ValidationError::RestoreDelayTooLong {
                delay_ms: self.restore.delay_ms,
                window_ms,
            })
            .into());
        }

        if self.discovery.timeout_ms == 0 {
            return Err(ConfigError::from(ValidationError::ZeroDiscoveryTimeout).into());
        }

        if !self.connectivity_url.starts_with("https://") {
            return Err(ConfigError::from(ValidationError::InsecureConnectivityUrl {
                url: self.connectivity_url.clone(),
            })
            .into());
        }

        let api = &self.discovery.vendor_api;
        if !api.starts_with("http://") && !api.starts_with("https://") {
            return Err(
                ConfigError::from(ValidationError::InvalidVendorApi { url: api.clone() }).into(),
            );
        }

        Ok(())
    }
}

/// Check a blocking rate against the accepted range.
pub const fn validate_packets_per_minute(value: u32) -> std::result::Result<u32, ValidationError> {
    if value < MIN_PACKETS_PER_MINUTE || value > MAX_PACKETS_PER_MINUTE {
        return Err(ValidationError::PacketsOutOfRange {
            value,
            min: MIN_PACKETS_PER_MINUTE,
            max: MAX_PACKETS_PER_MINUTE,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.interface.is_none());
        assert_eq!(config.packets_per_minute, 30);
        assert!(config.check_connectivity);
        assert_eq!(config.connectivity_url, "https://github.com");
        assert_eq!(config.restore.window(), Duration::from_secs(10));
        assert_eq!(config.restore.delay(), Duration::from_millis(500));
        assert_eq!(config.discovery.timeout(), Duration::from_secs(2));
        assert!(config.discovery.resolve_vendors);
        assert!(config.discovery.resolve_hostnames);
        assert!(config.discovery.dns_server.is_none());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            interface = "wlan0"
            packets_per_minute = 60
            check_connectivity = false

            [restore]
            window_secs = 5
            delay_ms = 250

            [discovery]
            timeout_ms = 1500
            resolve_vendors = false
            resolve_hostnames = true
            dns_server = "192.168.1.1:53"

            [metrics]
            enabled = true
            listen = "0.0.0.0:9100"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.interface.as_deref(), Some("wlan0"));
        assert_eq!(config.packets_per_minute, 60);
        assert!(!config.check_connectivity);
        assert_eq!(config.restore.window_secs, 5);
        assert_eq!(config.restore.delay_ms, 250);
        assert!(!config.discovery.resolve_vendors);
        assert_eq!(
            config.discovery.dns_server,
            Some("192.168.1.1:53".parse().unwrap())
        );
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen.port(), 9100);
    }

    #[test]
    fn test_packets_out_of_range_rejected() {
        assert!(Config::parse("packets_per_minute = 0").is_err());
        assert!(Config::parse("packets_per_minute = 121").is_err());
        assert!(Config::parse("packets_per_minute = 120").is_ok());
    }

    #[test]
    fn test_restore_delay_longer_than_window_rejected() {
        let toml = r"
            [restore]
            window_secs = 1
            delay_ms = 1500
        ";

        let err = Config::parse(toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Validation(
                ValidationError::RestoreDelayTooLong { .. }
            ))
        ));
    }

    #[test]
    fn test_zero_restore_delay_rejected() {
        let toml = r"
            [restore]
            delay_ms = 0
        ";

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_http_connectivity_url_rejected() {
        assert!(Config::parse(r#"connectivity_url = "http://github.com""#).is_err());
    }

    #[test]
    fn test_invalid_dns_server_rejected() {
        let toml = r#"
            [discovery]
            dns_server = "not-an-address"
        "#;

        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_empty_interface_rejected() {
        assert!(Config::parse(r#"interface = """#).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::parse(r#"unknown_field = "value""#).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.packets_per_minute, 30);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "packets_per_minute = 12").unwrap();

        let config = Config::load_or_default(file.path()).unwrap();
        assert_eq!(config.packets_per_minute, 12);
    }
}
