//! Explicit little-endian conversions.
//!
//! Descriptors and mailbox words are little-endian on the wire regardless of
//! host byte order. These wrappers exist so every conversion site in the
//! core is a named, greppable call rather than a bare `.to_le()` that's easy
//! to mistake for a no-op on little-endian hosts.

/// Host value to wire (little-endian) `u64`.
#[inline]
pub fn cpu_to_le64(value: u64) -> u64 {
    value.to_le()
}

/// Wire (little-endian) `u64` to host value.
#[inline]
pub fn le_to_cpu64(value: u64) -> u64 {
    u64::from_le(value)
}

/// Wire (little-endian) `u32` to host value.
#[inline]
pub fn le_to_cpu32(value: u32) -> u32 {
    u32::from_le(value)
}
