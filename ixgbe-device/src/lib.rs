//! PCI discovery and 82599 bring-up: the concrete `Device` that binds
//! `ixgbe-core`'s rings to real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

mod device;
#[cfg(feature = "std")]
mod mmio_map;
mod pci;
mod regs;

pub use device::{BringUpError, Ixgbe82599};
#[cfg(feature = "std")]
pub use mmio_map::{map_bar0, MapError};
pub use pci::{
    enable_device, find_82599, probe, Ixgbe82599Info, PciAddr, INTEL_VENDOR_ID,
    IXGBE_82599_DEVICE_IDS,
};
