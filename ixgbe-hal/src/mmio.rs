//! Volatile memory-mapped I/O access.
//!
//! # Safety
//! Callers must ensure the address is a valid, mapped MMIO register and
//! correctly aligned for the access width. These functions never cache,
//! fuse, or reorder the access relative to other volatile accesses; that
//! guarantee is exactly what distinguishes them from a plain pointer load.

/// Read a 32-bit register.
///
/// # Safety
/// `addr` must point at a live, 4-byte-aligned MMIO register.
#[inline]
pub unsafe fn read32(addr: *const u32) -> u32 {
    core::ptr::read_volatile(addr)
}

/// Write a 32-bit register.
///
/// # Safety
/// `addr` must point at a live, 4-byte-aligned MMIO register.
#[inline]
pub unsafe fn write32(addr: *mut u32, value: u32) {
    core::ptr::write_volatile(addr, value)
}
