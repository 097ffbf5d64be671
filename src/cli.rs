//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{MAX_PACKETS_PER_MINUTE, MIN_PACKETS_PER_MINUTE, validate_packets_per_minute};

/// Configuration file read when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "diamond.toml";

#[derive(Parser, Debug)]
#[command(name = "diamond")]
#[command(
    version,
    about = "Scan your local network and cut selected devices off the gateway",
    long_about = None,
    after_help = "Examples:\n  sudo diamond\n  sudo diamond --interface eth0 --packets 60\n  sudo diamond --scan\n  sudo diamond --target 192.168.1.114 192.168.1.237"
)]
pub struct Args {
    /// Interface to send packets from
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Packets to send per minute to each target [default: 30]
    #[arg(short, long, value_name = "1-120", value_parser = parse_packets)]
    pub packets: Option<u32>,

    /// Scan your network and exit
    #[arg(short, long, conflicts_with = "target")]
    pub scan: bool,

    /// IP address(es) to block without prompting
    #[arg(short, long, num_args = 1.., value_name = "IP")]
    pub target: Vec<String>,

    /// Configuration file
    #[arg(short, long, env = "CONFIG_PATH", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

fn parse_packets(raw: &str) -> Result<u32, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("invalid number {raw:?}"))?;
    validate_packets_per_minute(value)
        .map_err(|_| format!("choose from [{MIN_PACKETS_PER_MINUTE}-{MAX_PACKETS_PER_MINUTE}]"))
}

/// Options of the interactive menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    Block,
    Clear,
    Exit,
}

impl MenuOption {
    /// Match `b`/`block`, `cl`/`clear` or `e`/`exit`, case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "b" | "block" => Some(Self::Block),
            "cl" | "clear" => Some(Self::Clear),
            "e" | "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    pub const ALL: [Self; 3] = [Self::Block, Self::Clear, Self::Exit];

    pub const fn usage(self) -> (&'static str, &'static str) {
        match self {
            Self::Block => ("b/block", "Block devices"),
            Self::Clear => ("cl/clear", "Clear the screen"),
            Self::Exit => ("e/exit", "Exit"),
        }
    }
}
