//! Raw frame construction and datalink I/O.

pub mod arp;
mod capture;

pub use capture::{
    PacketCapture, PacketSender, PnetCapture, PnetSender, find_interface, find_interface_for,
    get_interface_info, prefix_to_mask, same_network,
};

#[cfg(test)]
pub(crate) use capture::tests::{FailingSender, MockCapture, MockSender};
