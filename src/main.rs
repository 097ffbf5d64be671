//! Diamond - Entry point.
//!
//! Three modes share the same start: privilege and connectivity checks,
//! then topology resolution.
//!
//! - `--scan` lists the live hosts and exits
//! - `--target IP...` blocks the given addresses without prompting
//! - otherwise an interactive menu lets the operator pick hosts to block
//!
//! Every blocking session is stopped with ^C and always restores the
//! targets' ARP caches before returning.

use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use diamond::cli::{Args, MenuOption};
use diamond::config::Config;
use diamond::discovery::{ArpScanner, Host, HostDiscovery, MacVendors, ProbeTarget, PtrResolver};
use diamond::network::PnetSender;
use diamond::preflight::{self, CONNECTIVITY_TIMEOUT};
use diamond::session::{Interrupt, Interrupts, Phase, PhaseTracker, Session, SessionConfig};
use diamond::target::{self, Target};
use diamond::topology::{InterfacePrompt, NoPrompt, SystemRoutes, Topology, TopologyHandle, TopologyResolver};
use diamond::ui::{self, with_spinner};

/// ANSI sequence clearing the terminal.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Port of the DNS server used for reverse lookups.
const DNS_PORT: u16 = 53;

type Resolver = TopologyResolver<SystemRoutes, ArpScanner>;

/// Whether the menu keeps going after an action.
enum Flow {
    Continue,
    Exit,
}

/// Everything a mode needs once the topology is known.
struct App {
    interface: Option<String>,
    session: SessionConfig,
    resolver: Resolver,
    scanner: ArpScanner,
    topology: TopologyHandle,
    phases: PhaseTracker,
    interrupts: Interrupts,
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(args.config_path()).context("failed to load configuration")?,
    };
    Ok(config)
}

/// Print `prompt` and read one line. `None` on end of input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn ask_interface_on_stdin() -> Option<String> {
    println!("Could not find the default interface.");
    read_line("Enter the name of your network interface (e.g. en0, ens33, eth0)\n> ")
}

fn goodbye() {
    println!("\nSee you!");
}

/// Route ^C to the running session for the whole process lifetime.
fn spawn_interrupt_handler(interrupts: Interrupts) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match interrupts.interrupt() {
                Interrupt::Cancelled => println!("\nRestoring the connection of the targets, please wait..."),
                Interrupt::Deferred => println!("\nStill restoring, please wait..."),
                Interrupt::Exit => {
                    goodbye();
                    std::process::exit(0);
                }
            }
        }
    });
}

fn build_scanner(config: &Config, topology: &Topology) -> Result<ArpScanner> {
    let discovery = &config.discovery;
    let mut scanner = ArpScanner::new(discovery.timeout()).with_interface(topology.interface.name.clone());

    if discovery.resolve_vendors {
        let vendors = MacVendors::new(discovery.vendor_api.clone(), discovery.vendor_min_interval())
            .context("failed to create vendor lookup client")?;
        scanner = scanner.with_vendors(vendors);
    }

    if discovery.resolve_hostnames {
        let server = discovery
            .dns_server
            .unwrap_or_else(|| (topology.gateway.ip, DNS_PORT).into());
        debug!(%server, "reverse lookups enabled");
        scanner = scanner.with_hostnames(PtrResolver::new(server, discovery.timeout()));
    }

    Ok(scanner)
}

/// Sweep the resolved network and make sure there is somebody to block.
async fn scan_network<D: HostDiscovery>(discovery: &D, topology: &Topology) -> Result<Vec<Host>> {
    let target: ProbeTarget = topology
        .network
        .cidr
        .parse()
        .with_context(|| format!("cannot scan {}", topology.network))?;

    let hosts = with_spinner("Scanning your network, please wait...", discovery.probe(&target))
        .await
        .context("network scan failed")?;

    target::check_candidates(&hosts, &topology.gateway)?;
    Ok(hosts)
}

impl App {
    async fn block(&self, topology: &Topology, targets: &[Target]) -> Result<()> {
        println!("\nTargets: {}", ui::target_list(targets));
        println!(
            "Blocking started ({} packets/minute)",
            self.session.packets_per_minute
        );
        println!("\nTo stop blocking, press ^C");

        let sender = PnetSender::open(&topology.interface.name)
            .with_context(|| format!("failed to open interface {}", topology.interface.name))?;
        let mut session = Session::new(sender, topology.interface.mac, topology.gateway, self.session)
            .with_phases(self.phases.clone());

        let cancel = self.interrupts.arm();
        let report = session.run(targets, &cancel).await.context("blocking failed")?;

        info!(
            spoof_rounds = report.spoof_rounds,
            restore_rounds = report.restore_rounds,
            "session finished"
        );
        println!("Connection restored successfully");
        Ok(())
    }

    async fn scan_mode(&self) -> Result<()> {
        let topology = self.topology.current();
        let hosts = scan_network(&self.scanner, &topology).await?;

        println!("{}", ui::network_summary(&topology, hosts.len()));
        println!("\n{}", ui::host_table(&hosts));
        Ok(())
    }

    async fn target_mode(&self, ips: &[String]) -> Result<()> {
        let topology = self.topology.current();
        println!("{}", ui::interface_line(&topology));
        println!("Gateway: {} --> Targets: {}", topology.gateway.ip, ips.join(", "));
        println!("\nBlocking devices (non-interactive mode)...");

        self.phases.enter(Phase::Validating);
        let selection = with_spinner(
            "Checking the status of the targets, please wait...",
            target::select_by_ip(&self.scanner, &topology.gateway, ips),
        )
        .await?;
        for rejection in &selection.rejected {
            println!("Skipping: {rejection}");
        }
        let targets = selection.into_required()?;

        self.block(&topology, &targets).await
    }

    async fn interactive_mode(&self) -> Result<()> {
        let topology = self.topology.current();
        self.phases.enter(Phase::Validating);
        let hosts = scan_network(&self.scanner, &topology).await?;
        println!("{}", ui::network_summary(&topology, hosts.len()));
        self.phases.enter(Phase::Idle);

        loop {
            println!("\nChoose an option");
            for option in MenuOption::ALL {
                let (keys, description) = option.usage();
                println!("   [{keys}]\t{description}");
            }

            let Some(line) = read_line("\n> ") else {
                goodbye();
                return Ok(());
            };

            match MenuOption::parse(&line) {
                Some(MenuOption::Block) => {
                    if let Flow::Exit = self.choose_targets().await? {
                        goodbye();
                        return Ok(());
                    }
                }
                Some(MenuOption::Clear) => print!("{CLEAR_SCREEN}"),
                Some(MenuOption::Exit) => {
                    goodbye();
                    return Ok(());
                }
                None => println!("Enter a valid option."),
            }
        }
    }

    async fn choose_targets(&self) -> Result<Flow> {
        print!("{CLEAR_SCREEN}");
        println!("Blocking devices (interactive mode)...");

        self.phases.enter(Phase::Resolving);
        let topology = self
            .resolver
            .sync(&self.topology, self.interface.as_deref(), &mut ask_interface_on_stdin)
            .await
            .context("failed to resolve the network topology")?;

        self.phases.enter(Phase::Validating);
        let hosts = scan_network(&self.scanner, &topology).await?;
        println!("\n{}", ui::host_table(&hosts));

        let Some(line) = read_line("\nChoose the devices to block (comma separated)\n> ") else {
            self.phases.enter(Phase::Idle);
            return Ok(Flow::Exit);
        };
        let selection = target::select_by_index(&hosts, &topology.gateway, &target::parse_selectors(&line));
        for rejection in &selection.rejected {
            println!("Skipping: {rejection}");
        }

        if selection.targets.is_empty() {
            println!("You did not select any device from the list");
            self.phases.enter(Phase::Idle);
            return Ok(Flow::Continue);
        }

        self.block(&topology, &selection.targets).await?;
        Ok(Flow::Continue)
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    diamond::metrics::init(&config.metrics).context("failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    if !preflight::is_root() {
        bail!("diamond needs root privileges to send ARP frames, run it again with sudo");
    }
    if config.check_connectivity {
        preflight::check_connectivity(&config.connectivity_url, CONNECTIVITY_TIMEOUT)
            .await
            .context("you do not seem to be online, check your internet connection")?;
    }

    println!("diamond {}\n", env!("CARGO_PKG_VERSION"));

    // Malformed addresses are fatal before anything is sent.
    if !args.target.is_empty() {
        target::validate_ips(&args.target)?;
    }

    let phases = PhaseTracker::new();
    let interrupts = Interrupts::new(phases.clone());
    spawn_interrupt_handler(interrupts.clone());

    let interface = args.interface.clone().or_else(|| config.interface.clone());
    let mut probe = ArpScanner::new(config.discovery.timeout());
    if let Some(name) = &interface {
        probe = probe.with_interface(name.clone());
    }
    let resolver = TopologyResolver::new(SystemRoutes, probe);

    phases.enter(Phase::Resolving);
    let mut prompt: Box<dyn InterfacePrompt> = if args.target.is_empty() {
        Box::new(ask_interface_on_stdin)
    } else {
        Box::new(NoPrompt)
    };
    let topology = resolver
        .resolve(interface.as_deref(), prompt.as_mut())
        .await
        .context("failed to resolve the network topology")?;
    drop(prompt);

    debug!(?config, "configuration loaded");
    let scanner = build_scanner(&config, &topology)?;
    let mut session = SessionConfig::from(&config);
    if let Some(packets) = args.packets {
        session.packets_per_minute = packets;
    }

    let app = App {
        interface,
        session,
        resolver,
        scanner,
        topology: TopologyHandle::new(topology),
        phases,
        interrupts,
    };

    let result = if args.scan {
        app.scan_mode().await
    } else if args.target.is_empty() {
        app.interactive_mode().await
    } else {
        app.target_mode(&args.target).await
    };
    app.phases.enter(Phase::Idle);
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    run(Args::parse()).await
}
