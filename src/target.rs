//! Target selection.
//!
//! Turns operator selectors into blockable targets. Whatever the selector
//! kind, a host carrying the gateway's IP never becomes a [`Target`].

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use tracing::debug;

use crate::discovery::{Host, HostDiscovery, ProbeTarget};
use crate::error::{Result, SelectionError};
use crate::topology::Gateway;

/// A host accepted for blocking. Its IP is never the gateway's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: Host,
}

impl Target {
    /// Accept `host` unless it is the gateway.
    pub fn new(host: Host, gateway: &Gateway) -> std::result::Result<Self, Rejection> {
        if host.ip == gateway.ip {
            return Err(Rejection::Gateway(host.ip));
        }
        Ok(Self { host })
    }

    pub const fn ip(&self) -> Ipv4Addr {
        self.host.ip
    }

    pub const fn mac(&self) -> MacAddr {
        self.host.mac
    }
}

/// Why a selector was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotANumber(String),
    OutOfRange { index: usize, len: usize },
    Gateway(Ipv4Addr),
    Inactive(Ipv4Addr),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber(raw) => write!(f, "{raw:?} is not a valid host number"),
            Self::OutOfRange { index, len } => {
                write!(f, "host number {index} is out of range, there are {len} hosts")
            }
            Self::Gateway(ip) => write!(f, "{ip} is the gateway and cannot be blocked"),
            Self::Inactive(ip) => write!(f, "{ip} is not an active host"),
        }
    }
}

/// Outcome of a selection: accepted targets plus skipped selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub targets: Vec<Target>,
    pub rejected: Vec<Rejection>,
}

impl Selection {
    fn accept(&mut self, host: Host, gateway: &Gateway) {
        if self.targets.iter().any(|target| target.ip() == host.ip) {
            debug!(ip = %host.ip, "host selected twice");
            return;
        }
        match Target::new(host, gateway) {
            Ok(target) => self.targets.push(target),
            Err(rejection) => self.reject(rejection),
        }
    }

    fn reject(&mut self, rejection: Rejection) {
        debug!(%rejection, "selector skipped");
        self.rejected.push(rejection);
    }

    /// The accepted targets, or an error when there are none.
    ///
    /// Used where an empty selection leaves nothing to act on.
    pub fn into_required(self) -> std::result::Result<Vec<Target>, SelectionError> {
        if self.targets.is_empty() {
            return Err(SelectionError::NoActiveTargets);
        }
        Ok(self.targets)
    }
}

/// Split a comma-separated selector line.
pub fn parse_selectors(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|selector| !selector.is_empty())
        .map(str::to_string)
        .collect()
}

/// Make sure a scan found somebody to block.
pub fn check_candidates(hosts: &[Host], gateway: &Gateway) -> std::result::Result<(), SelectionError> {
    match hosts {
        [] => Err(SelectionError::NoActiveHosts),
        [only] if only.ip == gateway.ip => Err(SelectionError::OnlyGateway),
        _ => Ok(()),
    }
}

/// Select candidates by their 0-based position in the displayed list.
///
/// Non-numeric and out-of-range selectors are skipped.
pub fn select_by_index<S: AsRef<str>>(candidates: &[Host], gateway: &Gateway, selectors: &[S]) -> Selection {
    let mut selection = Selection::default();

    for raw in selectors {
        let raw = raw.as_ref().trim();
        let Ok(index) = raw.parse::<usize>() else {
            selection.reject(Rejection::NotANumber(raw.to_string()));
            continue;
        };
        let Some(host) = candidates.get(index) else {
            selection.reject(Rejection::OutOfRange {
                index,
                len: candidates.len(),
            });
            continue;
        };
        selection.accept(host.clone(), gateway);
    }

    selection
}

/// Check every selector is a dotted-quad IPv4 address.
///
/// The first malformed entry fails the whole list.
pub fn validate_ips<S: AsRef<str>>(ips: &[S]) -> std::result::Result<Vec<Ipv4Addr>, SelectionError> {
    ips.iter()
        .map(|raw| {
            let raw = raw.as_ref().trim();
            raw.parse()
                .map_err(|_| SelectionError::InvalidAddress(raw.to_string()))
        })
        .collect()
}

/// Select hosts by IP, probing each one individually.
///
/// All selectors are validated before the first probe. The gateway is
/// rejected without being probed, and silent addresses are skipped.
///
/// # Errors
///
/// Returns [`SelectionError::InvalidAddress`] for a malformed selector, or
/// the discovery error of a failed probe.
pub async fn select_by_ip<D, S>(discovery: &D, gateway: &Gateway, ips: &[S]) -> Result<Selection>
where
    D: HostDiscovery + ?Sized,
    S: AsRef<str>,
{
    let ips = validate_ips(ips)?;
    let mut selection = Selection::default();
    let mut seen = HashSet::new();

    for ip in ips {
        if !seen.insert(ip) {
            continue;
        }
        if ip == gateway.ip {
            selection.reject(Rejection::Gateway(ip));
            continue;
        }

        let hosts = discovery.probe(&ProbeTarget::Address(ip)).await?;
        match hosts.into_iter().find(|host| host.ip == ip) {
            Some(host) => selection.accept(host, gateway),
            None => selection.reject(Rejection::Inactive(ip)),
        }
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::tests::MockDiscovery;
    use crate::error::Error;

    const GATEWAY: Gateway = Gateway {
        ip: Ipv4Addr::new(192, 168, 1, 1),
        mac: MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
    };

    fn host(last_octet: u8) -> Host {
        Host::bare(
            Ipv4Addr::new(192, 168, 1, last_octet),
            MacAddr::new(0x02, 0, 0, 0, 0, last_octet),
        )
    }

    fn candidates() -> Vec<Host> {
        vec![host(10), host(1), host(20)]
    }

    fn ips(selection: &Selection) -> Vec<Ipv4Addr> {
        selection.targets.iter().map(Target::ip).collect()
    }

    #[test]
    fn should_split_selector_line() {
        assert_eq!(parse_selectors(" 0, 2,,3 ,"), vec!["0", "2", "3"]);
        assert!(parse_selectors("  ").is_empty());
    }

    #[test]
    fn should_skip_bad_selectors_individually() {
        let selection = select_by_index(&candidates(), &GATEWAY, &["0", "abc", "7"]);

        assert_eq!(ips(&selection), vec![Ipv4Addr::new(192, 168, 1, 10)]);
        assert_eq!(
            selection.rejected,
            vec![
                Rejection::NotANumber("abc".into()),
                Rejection::OutOfRange { index: 7, len: 3 },
            ]
        );
    }

    #[test]
    fn should_never_select_gateway_by_index() {
        let selection = select_by_index(&candidates(), &GATEWAY, &["0", "1", "2"]);

        assert_eq!(
            ips(&selection),
            vec![Ipv4Addr::new(192, 168, 1, 10), Ipv4Addr::new(192, 168, 1, 20)]
        );
        assert_eq!(selection.rejected, vec![Rejection::Gateway(GATEWAY.ip)]);
    }

    #[test]
    fn should_never_select_gateway_whatever_the_selectors() {
        let candidates = candidates();
        for selectors in [vec!["1"], vec!["1", "1"], vec!["2", "1", "0"], vec!["-1", "1"]] {
            let selection = select_by_index(&candidates, &GATEWAY, selectors.as_slice());
            assert!(selection.targets.iter().all(|target| target.ip() != GATEWAY.ip));
        }
    }

    #[test]
    fn should_select_same_host_once() {
        let selection = select_by_index(&candidates(), &GATEWAY, &["2", "2"]);
        assert_eq!(selection.targets.len(), 1);
        assert!(selection.rejected.is_empty());
    }

    #[test]
    fn should_refuse_gateway_as_target() {
        assert_eq!(Target::new(host(1), &GATEWAY), Err(Rejection::Gateway(GATEWAY.ip)));
        assert!(Target::new(host(2), &GATEWAY).is_ok());
    }

    #[test]
    fn should_check_scan_results() {
        assert!(matches!(check_candidates(&[], &GATEWAY), Err(SelectionError::NoActiveHosts)));
        assert!(matches!(
            check_candidates(&[host(1)], &GATEWAY),
            Err(SelectionError::OnlyGateway)
        ));
        assert!(check_candidates(&[host(10)], &GATEWAY).is_ok());
        assert!(check_candidates(&[host(1), host(10)], &GATEWAY).is_ok());
    }

    #[test]
    fn should_validate_dotted_quads() {
        assert_eq!(
            validate_ips(&["192.168.1.10", " 10.0.0.1 "]).unwrap(),
            vec![Ipv4Addr::new(192, 168, 1, 10), Ipv4Addr::new(10, 0, 0, 1)]
        );
        for bad in ["999.1.1.1", "192.168.1", "192.168.01.1", "host.lan", ""] {
            assert!(
                matches!(validate_ips(&[bad]), Err(SelectionError::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn should_reject_malformed_ip_before_probing() {
        let discovery = MockDiscovery::new().with("192.168.1.10", vec![host(10)]);

        let err = select_by_ip(&discovery, &GATEWAY, &["192.168.1.10", "999.1.1.1"])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Selection(SelectionError::InvalidAddress(raw)) if raw == "999.1.1.1"
        ));
        assert_eq!(discovery.probe_count(), 0);
    }

    #[tokio::test]
    async fn should_skip_silent_addresses_and_gateway() {
        let discovery = MockDiscovery::new()
            .with("192.168.1.10", vec![host(10)])
            .with("192.168.1.1", vec![host(1)]);

        let selection = select_by_ip(&discovery, &GATEWAY, &["192.168.1.1", "192.168.1.10", "192.168.1.30"])
            .await
            .unwrap();

        assert_eq!(ips(&selection), vec![Ipv4Addr::new(192, 168, 1, 10)]);
        assert_eq!(
            selection.rejected,
            vec![
                Rejection::Gateway(GATEWAY.ip),
                Rejection::Inactive(Ipv4Addr::new(192, 168, 1, 30)),
            ]
        );
        assert_eq!(discovery.probe_count(), 2);
    }

    #[tokio::test]
    async fn should_require_targets_when_nothing_answers() {
        let discovery = MockDiscovery::new();

        let selection = select_by_ip(&discovery, &GATEWAY, &["192.168.1.30"]).await.unwrap();

        assert!(matches!(
            selection.into_required(),
            Err(SelectionError::NoActiveTargets)
        ));
    }
}
