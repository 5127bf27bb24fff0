//! Polled, copy-free, single-threaded packet forwarding over a shared
//! descriptor ring.
//!
//! This crate is hardware-agnostic: it knows the legacy 82599 descriptor
//! layout and the receive/transmit protocol built on top of it, but it talks
//! to a concrete NIC only through the narrow [`Device`] and [`DmaAllocator`]
//! contracts. `ixgbe-device` provides the PCI-backed implementation of
//! `Device`; `ixgbe-mem` provides a `DmaAllocator`.
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
extern crate std;

mod agent;
mod classifier;
mod descriptor;
mod device;
mod error;

pub use agent::{Agent, DefaultAgent, PACKET_BUFFER_SIZE};
pub use classifier::Classifier;
pub use descriptor::{
    rx_metadata_length, tx_metadata, Descriptor, RX_METADATA_DD, RX_METADATA_EOP,
    TX_METADATA_EOP, TX_METADATA_IFCS, TX_METADATA_RS,
};
pub use device::{Device, DeviceError, TailRegister};
pub use error::AgentInitError;

pub use ixgbe_hal::{AllocError, DmaAllocator, PhysAddr};
