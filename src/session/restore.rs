//! Restore engine: tells every target the gateway's real hardware address.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::{ARP_FRAMES_TOTAL, RESTORE_ROUNDS_TOTAL};
use crate::network::{PacketSender, arp};
use crate::target::Target;
use crate::topology::Gateway;

/// Send `rounds` rounds of legitimate replies, pausing `delay` after each.
///
/// There is no cancellation: once started, every round is sent.
///
/// # Errors
///
/// Returns the first send failure.
pub async fn restore<S: PacketSender + ?Sized>(
    sender: &mut S,
    targets: &[Target],
    gateway: Gateway,
    rounds: u64,
    delay: Duration,
) -> Result<u64> {
    let frames = targets
        .iter()
        .map(|target| arp::build_restore_reply(gateway.mac, gateway.ip, target.ip(), target.mac()))
        .collect::<Result<Vec<_>>>()?;

    info!(rounds, targets = targets.len(), "restoring ARP caches");
    for round in 1..=rounds {
        for frame in &frames {
            sender.send(frame)?;
        }
        metrics::counter!(ARP_FRAMES_TOTAL, "kind" => "restore").increment(frames.len() as u64);
        metrics::counter!(RESTORE_ROUNDS_TOTAL).increment(1);
        debug!(round, "restore round sent");

        tokio::time::sleep(delay).await;
    }

    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Host;
    use crate::network::MockSender;
    use pnet::util::MacAddr;
    use std::net::Ipv4Addr;
    use tokio::time::Instant;

    const GATEWAY: Gateway = Gateway {
        ip: Ipv4Addr::new(192, 168, 1, 1),
        mac: MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
    };

    fn target(last_octet: u8) -> Target {
        let host = Host::bare(
            Ipv4Addr::new(192, 168, 1, last_octet),
            MacAddr::new(0x02, 0, 0, 0, 0, last_octet),
        );
        Target::new(host, &GATEWAY).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn should_send_every_round_with_real_gateway_mac() {
        let mut sender = MockSender::new();
        let started = Instant::now();

        let rounds = restore(
            &mut sender,
            &[target(10), target(20)],
            GATEWAY,
            20,
            Duration::from_millis(500),
        )
        .await
        .unwrap();

        assert_eq!(rounds, 20);
        assert_eq!(sender.sent_count(), 40);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        for frame in sender.sent() {
            let frame = arp::parse_arp_packet(&frame).unwrap();
            assert_eq!(frame.sender_ip, GATEWAY.ip);
            assert_eq!(frame.sender_mac, GATEWAY.mac);
        }
    }

    #[tokio::test]
    async fn should_do_nothing_without_rounds() {
        let mut sender = MockSender::new();

        let rounds = restore(&mut sender, &[target(10)], GATEWAY, 0, Duration::from_millis(500))
            .await
            .unwrap();

        assert_eq!(rounds, 0);
        assert_eq!(sender.sent_count(), 0);
    }
}
