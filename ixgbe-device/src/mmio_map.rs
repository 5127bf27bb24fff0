//! Mapping a discovered BAR0 into this process's address space.
//!
//! Only built with the `std` feature: a bare-metal or UIO-driver embedding
//! maps BAR0 itself (it already owns the page tables) and constructs
//! [`crate::Ixgbe82599`] directly from that mapping. This module exists for
//! the Linux user-space case, where BAR0 has to be reached through the
//! kernel's `resourceN` sysfs file the way `ixy`-style drivers do it.

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::ptr::NonNull;

use crate::pci::PciAddr;

#[derive(Debug)]
pub enum MapError {
    Open(std::io::Error),
    Mmap(std::io::Error),
}

impl core::fmt::Display for MapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MapError::Open(e) => write!(f, "failed to open PCI resource file: {e}"),
            MapError::Mmap(e) => write!(f, "mmap of BAR0 failed: {e}"),
        }
    }
}

impl std::error::Error for MapError {}

/// Map `addr`'s BAR0 (`size` bytes) from
/// `/sys/bus/pci/devices/<bdf>/resource0` and leak the mapping for the
/// program's lifetime.
///
/// The caller is expected to hold the resulting pointer for as long as the
/// process runs; a forwarding agent never unmaps its NIC mid-flight.
pub fn map_bar0(addr: PciAddr, size: u32) -> Result<NonNull<u8>, MapError> {
    let path = format!(
        "/sys/bus/pci/devices/0000:{:02x}:{:02x}.{}/resource0",
        addr.bus, addr.device, addr.function
    );

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(MapError::Open)?;

    let len = size.max(4096) as usize;
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(MapError::Mmap(std::io::Error::last_os_error()));
    }

    // Safety: mmap succeeded, so `ptr` is a valid, page-aligned mapping of
    // at least `len` bytes, non-null by construction.
    Ok(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
}
