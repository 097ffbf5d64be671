//! Blocking sessions.
//!
//! A session poisons the ARP caches of its targets until it is canceled,
//! then always repairs them before returning:
//!
//! ```text
//! IDLE -> RESOLVING -> VALIDATING -> SPOOFING (loops) -> RESTORING -> IDLE
//! ```
//!
//! Cancellation is only honoured while spoofing. Restoration runs to
//! completion whatever happens to the token.

mod restore;
mod spoof;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pnet::util::MacAddr;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::network::PacketSender;
use crate::target::Target;
use crate::topology::Gateway;

pub use restore::restore;
pub use spoof::spoof;

/// Where the program is in the blocking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Resolving,
    Validating,
    Spoofing,
    Restoring,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Validating => "validating",
            Self::Spoofing => "spoofing",
            Self::Restoring => "restoring",
        })
    }
}

/// Publishes the current [`Phase`] to any number of observers.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    tx: Arc<watch::Sender<Phase>>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn enter(&self, phase: Phase) {
        let previous = self.tx.send_replace(phase);
        debug!(from = %previous, to = %phase, "phase change");
    }

    pub fn current(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }
}

/// What an operator interrupt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The running session stops spoofing and starts restoring.
    Cancelled,
    /// Restoration is in progress and keeps going.
    Deferred,
    /// No target is poisoned, the process may exit.
    Exit,
}

/// Routes operator interrupts to the session that is spoofing, if any.
#[derive(Debug, Clone)]
pub struct Interrupts {
    phases: PhaseTracker,
    armed: Arc<Mutex<CancellationToken>>,
}

impl Interrupts {
    pub fn new(phases: PhaseTracker) -> Self {
        Self {
            phases,
            armed: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// A fresh token for the next session.
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.armed.lock() = token.clone();
        token
    }

    /// Handle one interrupt according to the current phase.
    pub fn interrupt(&self) -> Interrupt {
        match self.phases.current() {
            Phase::Spoofing => {
                self.armed.lock().cancel();
                Interrupt::Cancelled
            }
            Phase::Restoring => Interrupt::Deferred,
            Phase::Idle | Phase::Resolving | Phase::Validating => Interrupt::Exit,
        }
    }
}

/// Timing of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Spoof rounds per minute.
    pub packets_per_minute: u32,
    pub restore_window: Duration,
    pub restore_delay: Duration,
}

impl SessionConfig {
    /// Pause between two spoof rounds, `60 / rate` seconds.
    pub fn spoof_interval(&self) -> Duration {
        Duration::from_secs(60) / self.packets_per_minute.max(1)
    }

    /// Number of restoration rounds, `floor(window / delay)`.
    pub fn restore_rounds(&self) -> u64 {
        if self.restore_delay.is_zero() {
            return 0;
        }
        let rounds = self.restore_window.as_nanos() / self.restore_delay.as_nanos();
        u64::try_from(rounds).unwrap_or(u64::MAX)
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            packets_per_minute: config.packets_per_minute,
            restore_window: config.restore.window(),
            restore_delay: config.restore.delay(),
        }
    }
}

/// Rounds sent by a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub spoof_rounds: u64,
    pub restore_rounds: u64,
}

/// One blocking invocation against a fixed gateway.
pub struct Session<S> {
    sender: S,
    attacker_mac: MacAddr,
    gateway: Gateway,
    config: SessionConfig,
    phases: PhaseTracker,
}

impl<S: PacketSender> Session<S> {
    pub fn new(sender: S, attacker_mac: MacAddr, gateway: Gateway, config: SessionConfig) -> Self {
        Self {
            sender,
            attacker_mac,
            gateway,
            config,
            phases: PhaseTracker::new(),
        }
    }

    /// Report phase changes through `phases` instead of a private tracker.
    #[must_use]
    pub fn with_phases(mut self, phases: PhaseTracker) -> Self {
        self.phases = phases;
        self
    }

    /// Spoof `targets` until `cancel` fires, then restore them.
    ///
    /// Returns only once restoration is over. A failed spoof send still
    /// goes through restoration before the error is returned.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyTargets`] without targets, or the first send failure.
    pub async fn run(&mut self, targets: &[Target], cancel: &CancellationToken) -> Result<SessionReport> {
        if targets.is_empty() {
            return Err(Error::EmptyTargets);
        }

        info!(
            targets = targets.len(),
            gateway = %self.gateway.ip,
            rate = self.config.packets_per_minute,
            "blocking started"
        );

        self.phases.enter(Phase::Spoofing);
        let spoofed = spoof(
            &mut self.sender,
            targets,
            self.attacker_mac,
            self.gateway.ip,
            self.config.spoof_interval(),
            cancel,
        )
        .await;
        if let Err(err) = &spoofed {
            warn!("spoofing failed, restoring anyway: {err}");
        }

        self.phases.enter(Phase::Restoring);
        let restored = restore(
            &mut self.sender,
            targets,
            self.gateway,
            self.config.restore_rounds(),
            self.config.restore_delay,
        )
        .await;
        self.phases.enter(Phase::Idle);

        let report = SessionReport {
            spoof_rounds: spoofed?,
            restore_rounds: restored?,
        };
        info!(
            spoof_rounds = report.spoof_rounds,
            restore_rounds = report.restore_rounds,
            "blocking finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Host;
    use crate::network::{FailingSender, MockSender};
    use std::net::Ipv4Addr;

    const GATEWAY: Gateway = Gateway {
        ip: Ipv4Addr::new(192, 168, 1, 1),
        mac: MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
    };
    const ATTACKER: MacAddr = MacAddr(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);

    fn config(packets_per_minute: u32) -> SessionConfig {
        SessionConfig {
            packets_per_minute,
            restore_window: Duration::from_secs(10),
            restore_delay: Duration::from_millis(500),
        }
    }

    fn target(last_octet: u8) -> Target {
        let host = Host::bare(
            Ipv4Addr::new(192, 168, 1, last_octet),
            MacAddr::new(0x02, 0, 0, 0, 0, last_octet),
        );
        Target::new(host, &GATEWAY).unwrap()
    }

    #[test]
    fn should_derive_interval_and_rounds() {
        assert_eq!(config(60).spoof_interval(), Duration::from_secs(1));
        assert_eq!(config(30).spoof_interval(), Duration::from_secs(2));
        assert_eq!(config(120).spoof_interval(), Duration::from_millis(500));
        assert_eq!(config(60).restore_rounds(), 20);

        let uneven = SessionConfig {
            restore_window: Duration::from_secs(1),
            restore_delay: Duration::from_millis(300),
            ..config(60)
        };
        assert_eq!(uneven.restore_rounds(), 3);
    }

    #[test]
    fn should_build_from_config_file_values() {
        let config = Config::default();
        let session = SessionConfig::from(&config);
        assert_eq!(session.packets_per_minute, 30);
        assert_eq!(session.restore_rounds(), 20);
    }

    #[test]
    fn should_route_interrupts_by_phase() {
        let phases = PhaseTracker::new();
        let interrupts = Interrupts::new(phases.clone());
        let token = interrupts.arm();

        phases.enter(Phase::Validating);
        assert_eq!(interrupts.interrupt(), Interrupt::Exit);
        assert!(!token.is_cancelled());

        phases.enter(Phase::Spoofing);
        assert_eq!(interrupts.interrupt(), Interrupt::Cancelled);
        assert!(token.is_cancelled());

        phases.enter(Phase::Restoring);
        assert_eq!(interrupts.interrupt(), Interrupt::Deferred);

        let next = interrupts.arm();
        assert!(!next.is_cancelled());
    }

    #[tokio::test]
    async fn should_refuse_empty_targets() {
        let mut session = Session::new(MockSender::new(), ATTACKER, GATEWAY, config(60));
        let cancel = CancellationToken::new();

        let err = session.run(&[], &cancel).await.unwrap_err();

        assert!(matches!(err, Error::EmptyTargets));
    }

    #[tokio::test(start_paused = true)]
    async fn should_restore_even_when_canceled_before_start() {
        let sender = MockSender::new();
        let mut session = Session::new(sender.clone(), ATTACKER, GATEWAY, config(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = session.run(&[target(10)], &cancel).await.unwrap();

        assert_eq!(report.spoof_rounds, 0);
        assert_eq!(report.restore_rounds, 20);
        assert_eq!(sender.sent_count(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn should_end_idle_after_run() {
        let phases = PhaseTracker::new();
        let mut observer = phases.subscribe();
        let mut session =
            Session::new(MockSender::new(), ATTACKER, GATEWAY, config(60)).with_phases(phases.clone());
        let cancel = CancellationToken::new();

        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut seen = Vec::new();
                while observer.changed().await.is_ok() {
                    let phase = *observer.borrow_and_update();
                    if phase == Phase::Spoofing {
                        cancel.cancel();
                    }
                    seen.push(phase);
                    if phase == Phase::Idle {
                        break;
                    }
                }
                seen
            }
        });

        session.run(&[target(10)], &cancel).await.unwrap();

        assert_eq!(phases.current(), Phase::Idle);
        assert_eq!(
            watcher.await.unwrap(),
            vec![Phase::Spoofing, Phase::Restoring, Phase::Idle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_send_failure_after_trying_restore() {
        let mut session = Session::new(FailingSender, ATTACKER, GATEWAY, config(60));
        let cancel = CancellationToken::new();

        let err = session.run(&[target(10)], &cancel).await.unwrap_err();

        assert!(matches!(err, Error::Network(_)));
    }
}
